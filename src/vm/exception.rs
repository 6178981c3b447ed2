//! 虚拟机错误类型

use thiserror::Error;

use super::memory::MemoryError;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("内存错误: {0}")]
    Memory(#[from] MemoryError),

    #[error("非法指令: {opcode:#04x} at {addr:#x}")]
    IllegalInstruction { opcode: u8, addr: u32 },

    #[error("程序格式错误: {0}")]
    BadApp(String),

    #[error("没有已加载的程序")]
    NotLoaded,
}

impl VmError {
    /// 是否为越界访问引起的错误
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, VmError::Memory(e) if e.is_out_of_range())
    }
}

//! 内存区域 trait 定义
//!
//! 虚拟机的统一地址空间由若干块独立的内存区域拼接而成,
//! 每块区域都通过 [`MemoryRegion`] 提供按字节、带边界检查的访问.

use std::fmt;

use thiserror::Error;

/// 区域访问错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("区域访问越界: 地址 {addr:#x}, 区域 [{base:#x}, {base:#x}+{size:#x})")]
    OutOfRange { addr: u32, base: u32, size: usize },
}

/// 内存区域类型, 数值与 Lav 程序约定的类型码一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RegionKind {
    /// 运行时内存 (调用栈/局部变量)
    Runtime = 0x01,
    /// 显存
    Graph = 0x02,
    /// 屏幕缓存
    Buffer = 0x04,
    /// 文本缓冲区
    Text = 0x08,
    /// 字符堆
    String = 0x10,
}

impl RegionKind {
    pub const ALL: [RegionKind; 5] = [
        RegionKind::Runtime,
        RegionKind::Graph,
        RegionKind::Buffer,
        RegionKind::Text,
        RegionKind::String,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            RegionKind::Runtime => "runtime",
            RegionKind::Graph => "graph",
            RegionKind::Buffer => "buffer",
            RegionKind::Text => "text",
            RegionKind::String => "string",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 当前函数帧使用的内存窗口 `[start, end)`
///
/// 只是薄访问器, 不做任何校验; 维持 `base <= start <= end <= base + size`
/// 是解释器的责任. [`FrameWindow::is_consistent`] 供测试和调试断言使用.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameWindow {
    start: u32,
    end: u32,
}

impl FrameWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.end
    }

    #[inline]
    pub fn set_start(&mut self, addr: u32) {
        self.start = addr;
    }

    #[inline]
    pub fn set_end(&mut self, addr: u32) {
        self.end = addr;
    }

    /// 窗口字节数, 窗口倒置时为 0
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 检查窗口是否落在 `[base, base + size)` 区域内且未倒置
    pub fn is_consistent(&self, base: u32, size: usize) -> bool {
        let limit = base as u64 + size as u64;
        self.start >= base && self.start <= self.end && self.end as u64 <= limit
    }
}

/// 将全局地址转换为区域内偏移
#[inline]
pub fn local_offset(addr: u32, base: u32, size: usize) -> Result<usize, RegionError> {
    match addr.checked_sub(base) {
        Some(offset) if (offset as usize) < size => Ok(offset as usize),
        _ => Err(RegionError::OutOfRange { addr, base, size }),
    }
}

/// 内存区域 trait
/// 所有可安装到地址空间中的内存都必须实现此 trait
pub trait MemoryRegion: Send {
    /// 区域大小, 以字节计
    fn size(&self) -> usize;

    /// 区域类型
    fn kind(&self) -> RegionKind;

    /// 区域起始地址
    fn base(&self) -> u32;

    /// 设置起始地址, 仅由地址空间在安装/重排时调用
    fn set_base(&mut self, addr: u32);

    /// 读取一个字节
    ///
    /// # 参数
    /// - addr: 全局地址, 实现需自行换算为 `addr - base` 并做边界检查
    fn read_byte(&self, addr: u32) -> Result<u8, RegionError>;

    /// 写入一个字节
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), RegionError>;

    /// 全部清零
    fn clear(&mut self);

    /// 区域结束地址 (不包括)
    fn end(&self) -> u64 {
        self.base() as u64 + self.size() as u64
    }

    /// 地址是否落在本区域内
    fn contains(&self, addr: u32) -> bool {
        addr >= self.base() && (addr as u64) < self.end()
    }

    /// 函数帧窗口 (仅运行时内存提供)
    fn frame(&self) -> Option<&FrameWindow> {
        None
    }

    fn frame_mut(&mut self) -> Option<&mut FrameWindow> {
        None
    }

    /// 获取区域名称（用于调试）
    fn name(&self) -> &str {
        self.kind().name()
    }
}

//! 解释器接口
//!
//! 指令解码与执行不属于运行时核心, 由实现 [`Interpreter`] 的类型提供.
//! 解释器通过 [`VmContext`] 访问地址空间和文本控制台.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use text_console::TextConsole;

use super::exception::VmError;
use super::memory::AddressSpace;

/// 已读入内存的 Lav 程序, 内容格式由解释器解释
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LavApp {
    name: String,
    bytes: Vec<u8>,
}

impl LavApp {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// 从文件读取程序
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("无法读取程序文件 '{}'", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<unknown>".to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// 解释器执行时可以访问的虚拟机资源
pub struct VmContext<'a> {
    pub memory: &'a mut AddressSpace,
    pub console: &'a mut TextConsole,
}

/// 解释器
pub trait Interpreter: Send {
    /// 安装程序, 此时所有区域已清零
    fn load(&mut self, app: &LavApp, cx: &mut VmContext<'_>) -> Result<(), VmError>;

    /// 执行一步
    fn step(&mut self, cx: &mut VmContext<'_>) -> Result<(), VmError>;

    /// 程序是否已经结束
    fn is_finished(&self) -> bool;

    /// 释放当前程序占用的资源
    fn dispose(&mut self);

    /// 获取解释器名称（用于调试）
    fn name(&self) -> &str {
        "interpreter"
    }
}

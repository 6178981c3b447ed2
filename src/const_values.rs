use anyhow::{self, Context};
use serde::Deserialize;
use std::path::Path;

/// 每批执行步数的默认值
pub const DEFAULT_YIELD_INTERVAL: u64 = 100;
/// 默认事件列表长度
pub const DEFAULT_EVENT_LIST_SIZE: usize = 16;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: lcd::LCD_WIDTH,
            height: lcd::LCD_HEIGHT,
        }
    }
}

impl ScreenConfig {
    /// 显存/屏幕缓存大小: 每像素 1 位
    pub fn graph_size(&self) -> usize {
        (self.width as usize * self.height as usize).div_ceil(8)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    pub runtime_size: usize,
    pub string_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            runtime_size: 0x6000,
            string_size: 0x400,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DriverConfig {
    pub yield_interval: u64,
    pub yield_micros: u64,
    pub idle_millis: u64,
    pub exit_on_finish: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            yield_interval: DEFAULT_YIELD_INTERVAL,
            yield_micros: 0,
            idle_millis: 10,
            exit_on_finish: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct DebugConfig {
    pub event_list_size: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            event_list_size: DEFAULT_EVENT_LIST_SIZE,
        }
    }
}

/// 虚拟机配置（来自 profile/config.toml）
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VmConfig {
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl VmConfig {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<VmConfig> {
        let toml_str = std::fs::read_to_string(&path)
            .with_context(|| format!("无法读取配置文件: {:?}", &path.as_ref().as_os_str()))?;
        Self::parse(&toml_str)
            .with_context(|| format!("无法解析配置文件: {:?}", &path.as_ref().as_os_str()))
    }

    pub fn parse(toml_str: &str) -> anyhow::Result<VmConfig> {
        let config: VmConfig = toml::from_str(toml_str)?;
        anyhow::Ok(config)
    }
}

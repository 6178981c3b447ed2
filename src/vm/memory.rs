//! 地址空间管理模块
//!
//! 把若干块独立的内存区域拼接成一个线性地址空间.
//! 区域按安装顺序依次排列, 基址等于此前所有区域大小之和.

use std::fmt;

use region_trait::{FrameWindow, MemoryRegion, RegionError, RegionKind};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

/// 32 位地址空间上限 (不包括)
const ADDRESS_LIMIT: u64 = 1 << 32;

/// 内存错误类型
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("区域配置错误: {kind} 区域大小为 0")]
    ZeroSize { kind: RegionKind },
    #[error("区域配置错误: {kind} 区域 [{base:#x}, {base:#x}+{size:#x}) 超出 32 位地址空间")]
    AddressOverflow { kind: RegionKind, base: u64, size: usize },
    #[error("内存访问越界: 地址 {addr:#x} 不属于任何区域")]
    OutOfRange { addr: u32 },
    #[error("区域错误: {0}")]
    Region(#[from] RegionError),
    #[error("未安装 {0} 区域")]
    MissingRegion(RegionKind),
}

impl MemoryError {
    /// 安装阶段的配置错误
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MemoryError::ZeroSize { .. } | MemoryError::AddressOverflow { .. } | MemoryError::MissingRegion(_)
        )
    }

    /// 运行阶段的越界访问
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, MemoryError::OutOfRange { .. } | MemoryError::Region(RegionError::OutOfRange { .. }))
    }
}

/// 地址空间
#[derive(Default)]
pub struct AddressSpace {
    /// 按基址升序排列的区域
    regions: Vec<Box<dyn MemoryRegion>>,
    /// 每种类型第一块区域的下标
    kinds: FxHashMap<RegionKind, usize>,
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for region in &self.regions {
            list.entry(&format_args!(
                "{}@{:#x}+{:#x}",
                region.name(),
                region.base(),
                region.size()
            ));
        }
        list.finish()
    }
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装一块区域, 返回分配到的基址
    pub fn install(&mut self, mut region: Box<dyn MemoryRegion>) -> Result<u32, MemoryError> {
        let base = self.next_base();
        Self::check_fits(region.as_ref(), base)?;
        region.set_base(base as u32);
        debug!(
            kind = %region.kind(),
            base = format_args!("{:#x}", base),
            size = format_args!("{:#x}", region.size()),
            "安装内存区域"
        );
        self.kinds.entry(region.kind()).or_insert(self.regions.len());
        self.regions.push(region);
        Ok(base as u32)
    }

    fn check_fits(region: &dyn MemoryRegion, base: u64) -> Result<(), MemoryError> {
        let (kind, size) = (region.kind(), region.size());
        if size == 0 {
            return Err(MemoryError::ZeroSize { kind });
        }
        if base + size as u64 > ADDRESS_LIMIT {
            return Err(MemoryError::AddressOverflow { kind, base, size });
        }
        Ok(())
    }

    /// 当前占用的最高地址之后的第一个地址
    #[inline]
    fn next_base(&self) -> u64 {
        self.regions.last().map_or(0, |region| region.end())
    }

    /// 用同类型的新区域替换旧区域, 并重新排布所有区域
    ///
    /// 文本缓冲区随显示目标重新分配时使用, 返回被替换的区域.
    pub fn replace(&mut self, region: Box<dyn MemoryRegion>) -> Result<Box<dyn MemoryRegion>, MemoryError> {
        let kind = region.kind();
        let index = *self.kinds.get(&kind).ok_or(MemoryError::MissingRegion(kind))?;
        let old = std::mem::replace(&mut self.regions[index], region);
        if let Err(e) = self.relayout() {
            // 恢复原布局
            self.regions[index] = old;
            self.relayout()?;
            return Err(e);
        }
        Ok(old)
    }

    /// 按安装顺序重新分配基址
    pub fn relayout(&mut self) -> Result<(), MemoryError> {
        let mut base = 0u64;
        for region in &self.regions {
            Self::check_fits(region.as_ref(), base)?;
            base += region.size() as u64;
        }
        let mut base = 0u64;
        for region in &mut self.regions {
            region.set_base(base as u32);
            base += region.size() as u64;
        }
        debug!(layout = ?self, "重新排布地址空间");
        Ok(())
    }

    /// 查找覆盖指定地址的区域
    #[inline(always)]
    fn find_region(&self, addr: u32) -> Option<usize> {
        let addr = addr as u64;
        self.regions
            .binary_search_by(|region| {
                let start = region.base() as u64;
                if addr < start {
                    std::cmp::Ordering::Greater
                } else if addr >= region.end() {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .ok()
    }

    /// 读取字节
    #[inline(always)]
    pub fn read_byte(&self, addr: u32) -> Result<u8, MemoryError> {
        let index = self.find_region(addr).ok_or(MemoryError::OutOfRange { addr })?;
        Ok(self.regions[index].read_byte(addr)?)
    }

    /// 写入字节
    #[inline(always)]
    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), MemoryError> {
        let index = self.find_region(addr).ok_or(MemoryError::OutOfRange { addr })?;
        Ok(self.regions[index].write_byte(addr, value)?)
    }

    /// 读取连续字节, 可以跨越相邻区域
    pub fn read(&self, addr: u32, size: usize) -> Result<Vec<u8>, MemoryError> {
        (0..size)
            .map(|i| {
                let at = addr.checked_add(i as u32).ok_or(MemoryError::OutOfRange { addr })?;
                self.read_byte(at)
            })
            .collect()
    }

    /// 写入连续字节
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        for (i, &byte) in data.iter().enumerate() {
            let at = addr.checked_add(i as u32).ok_or(MemoryError::OutOfRange { addr })?;
            self.write_byte(at, byte)?;
        }
        Ok(())
    }

    /// 读取半字 (小端)
    pub fn read_halfword(&self, addr: u32) -> Result<u16, MemoryError> {
        let bytes = self.read(addr, 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// 读取字 (小端)
    pub fn read_word(&self, addr: u32) -> Result<u32, MemoryError> {
        let bytes = self.read(addr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_halfword(&mut self, addr: u32, value: u16) -> Result<(), MemoryError> {
        self.write(addr, &value.to_le_bytes())
    }

    pub fn write_word(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        self.write(addr, &value.to_le_bytes())
    }

    /// 所有区域清零, 加载程序时调用
    pub fn clear_all(&mut self) {
        for region in &mut self.regions {
            region.clear();
        }
    }

    pub fn region(&self, kind: RegionKind) -> Option<&dyn MemoryRegion> {
        let index = *self.kinds.get(&kind)?;
        Some(self.regions[index].as_ref())
    }

    pub fn region_mut(&mut self, kind: RegionKind) -> Option<&mut dyn MemoryRegion> {
        let index = *self.kinds.get(&kind)?;
        Some(self.regions[index].as_mut())
    }

    /// 运行时内存的函数帧窗口
    pub fn frame(&self) -> Option<&FrameWindow> {
        self.region(RegionKind::Runtime)?.frame()
    }

    pub fn frame_mut(&mut self) -> Option<&mut FrameWindow> {
        self.region_mut(RegionKind::Runtime)?.frame_mut()
    }

    pub fn regions(&self) -> impl Iterator<Item = &dyn MemoryRegion> {
        self.regions.iter().map(|region| region.as_ref())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// 已占用的地址总数
    pub fn total_size(&self) -> u64 {
        self.next_base()
    }
}

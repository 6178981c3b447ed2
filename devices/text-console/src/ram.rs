//! 文本缓冲区存储与关联内存
//!
//! [`SharedBuffer`] 是唯一的一份字节存储, 控制台直接操作它,
//! [`TextRam`] 则把同一份存储以 [`MemoryRegion`] 的形式暴露给地址空间.
//! 任何一方的写入对另一方立即可见.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use region_trait::{MemoryRegion, RegionError, RegionKind, local_offset};

/// 共享的文本缓冲区
#[derive(Debug, Clone)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
    len: usize,
}

impl SharedBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(vec![0; len])),
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.lock().get(index).copied()
    }

    /// 写入一个字节, 越界时返回 false
    pub fn set(&self, index: usize, value: u8) -> bool {
        match self.lock().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn fill(&self, value: u8) {
        self.lock().fill(value);
    }

    /// 在持锁期间访问整块存储
    pub fn with<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// 是否为同一份存储
    pub fn ptr_eq(&self, other: &SharedBuffer) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

/// 以文本缓冲区为存储的内存区域
///
/// 容量等于当前分配的缓冲区长度 (按小字体网格计算), 与当前字体下
/// 实际使用的 `max_row * max_col` 无关.
#[derive(Debug, Clone)]
pub struct TextRam {
    buffer: SharedBuffer,
    base: u32,
}

impl TextRam {
    pub fn new(buffer: SharedBuffer) -> Self {
        Self { buffer, base: 0 }
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }
}

impl MemoryRegion for TextRam {
    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn kind(&self) -> RegionKind {
        RegionKind::Text
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn set_base(&mut self, addr: u32) {
        self.base = addr;
    }

    fn read_byte(&self, addr: u32) -> Result<u8, RegionError> {
        let offset = local_offset(addr, self.base, self.size())?;
        self.buffer.get(offset).ok_or(RegionError::OutOfRange {
            addr,
            base: self.base,
            size: self.size(),
        })
    }

    fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), RegionError> {
        let offset = local_offset(addr, self.base, self.size())?;
        if self.buffer.set(offset, value) {
            Ok(())
        } else {
            Err(RegionError::OutOfRange {
                addr,
                base: self.base,
                size: self.size(),
            })
        }
    }

    fn clear(&mut self) {
        self.buffer.fill(0);
    }
}

//! 通用内存区域
//!
//! 所有由虚拟机自己持有的内存 (运行时内存, 显存, 屏幕缓存, 字符堆)
//! 都是同一个 [`Region`] 类型, 以类型标签区分. 运行时内存额外带一个函数帧窗口.

use region_trait::{FrameWindow, MemoryRegion, RegionError, RegionKind, local_offset};

#[derive(Debug, Clone)]
pub struct Region {
    kind: RegionKind,
    base: u32,
    data: Vec<u8>,
    frame: Option<FrameWindow>,
}

impl Region {
    pub fn new(kind: RegionKind, size: usize) -> Self {
        let frame = (kind == RegionKind::Runtime).then(FrameWindow::default);
        Self {
            kind,
            base: 0,
            data: vec![0; size],
            frame,
        }
    }

    /// 运行时内存
    pub fn runtime(size: usize) -> Self {
        Self::new(RegionKind::Runtime, size)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl MemoryRegion for Region {
    fn size(&self) -> usize {
        self.data.len()
    }

    fn kind(&self) -> RegionKind {
        self.kind
    }

    fn base(&self) -> u32 {
        self.base
    }

    fn set_base(&mut self, addr: u32) {
        self.base = addr;
    }

    #[inline]
    fn read_byte(&self, addr: u32) -> Result<u8, RegionError> {
        let offset = local_offset(addr, self.base, self.data.len())?;
        Ok(self.data[offset])
    }

    #[inline]
    fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), RegionError> {
        let offset = local_offset(addr, self.base, self.data.len())?;
        self.data[offset] = value;
        Ok(())
    }

    fn clear(&mut self) {
        self.data.fill(0);
    }

    fn frame(&self) -> Option<&FrameWindow> {
        self.frame.as_ref()
    }

    fn frame_mut(&mut self) -> Option<&mut FrameWindow> {
        self.frame.as_mut()
    }
}

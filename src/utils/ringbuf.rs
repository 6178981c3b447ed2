//! 固定容量环形缓冲区, 写满后覆盖最旧的元素

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    read: usize,
    write: usize,
    full: bool,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// 容量至少为 1
    pub fn new(size: usize) -> Self {
        RingBuffer {
            buf: vec![T::default(); size.max(1)],
            read: 0,
            write: 0,
            full: false,
        }
    }

    pub fn push_overwrite(&mut self, item: T) {
        self.buf[self.write] = item;
        self.write = (self.write + 1) % self.buf.len();
        if self.full {
            self.read = self.write;
        } else if self.write == self.read {
            self.full = true;
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.buf[self.read];
        self.read = (self.read + 1) % self.buf.len();
        self.full = false;
        Some(item)
    }

    /// 按写入顺序取出全部元素
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        while let Some(item) = self.pop() {
            items.push(item);
        }
        items
    }

    /// 最近写入的元素
    pub fn last(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let index = (self.write + self.buf.len() - 1) % self.buf.len();
        Some(self.buf[index])
    }

    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.full = false;
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        if self.full {
            self.buf.len()
        } else {
            (self.write + self.buf.len() - self.read) % self.buf.len()
        }
    }
}

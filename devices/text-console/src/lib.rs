//! 文本控制台
//!
//! 负责维持文本缓冲区的内容与输出光标, 内容的绘制交给显示目标.
//! 文本缓冲区同时以 [`TextRam`] 的形式安装到地址空间中,
//! 使 Lav 程序能直接读写屏幕上的文字.

mod ram;
mod render;

use tracing::{debug, trace};

pub use ram::{SharedBuffer, TextRam};
pub use render::{Canvas, DrawMode, Renderer, Screen, ScreenError};

/// 大字体字符格 (宽, 高)
pub const BIG_CELL: (u32, u32) = (8, 16);
/// 小字体字符格 (宽, 高)
pub const SMALL_CELL: (u32, u32) = (6, 13);

/// 不需要刷新的掩码
pub const REFRESH_NONE: u8 = 0xff;
/// 全部刷新的掩码
pub const REFRESH_ALL: u8 = 0x00;

/// 字体模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMode {
    #[default]
    Big,
    Small,
}

impl TextMode {
    /// SetScreen 约定: 0 为大字体, 其他为小字体
    pub fn from_code(code: i32) -> Self {
        if code == 0 { TextMode::Big } else { TextMode::Small }
    }

    #[inline]
    pub fn cell(self) -> (u32, u32) {
        match self {
            TextMode::Big => BIG_CELL,
            TextMode::Small => SMALL_CELL,
        }
    }

    /// 每行绘制时的像素偏移, 小字体向右下各偏 1 像素对齐
    #[inline]
    fn origin(self) -> (i32, i32) {
        match self {
            TextMode::Big => (0, 0),
            TextMode::Small => (1, 1),
        }
    }
}

/// 文本控制台
#[derive(Debug)]
pub struct TextConsole {
    width: u32,
    height: u32,
    buffer: SharedBuffer,
    mode: TextMode,
    max_row: usize,
    max_col: usize,
    cur_row: usize,
    cur_col: usize,
    /// 尚未绘制的刷新请求, 0 位表示该行需要重绘
    pending: u8,
    /// 累计滚屏次数
    scrolls: u64,
}

impl TextConsole {
    /// 为给定像素尺寸的显示目标创建控制台
    pub fn new(width: u32, height: u32) -> Self {
        let mut console = Self {
            width,
            height,
            buffer: SharedBuffer::new(Self::buffer_len(width, height)),
            mode: TextMode::Big,
            max_row: 0,
            max_col: 0,
            cur_row: 0,
            cur_col: 0,
            pending: REFRESH_NONE,
            scrolls: 0,
        };
        console.reset_cursor(TextMode::Big);
        console
    }

    /// 缓冲区按最密集的小字体网格分配
    fn buffer_len(width: u32, height: u32) -> usize {
        (width / SMALL_CELL.0) as usize * (height / SMALL_CELL.1) as usize
    }

    /// 设置显示目标并作适当的初始化
    ///
    /// 尺寸变化时重新分配缓冲区 (原先取得的 [`TextRam`] 随之失效),
    /// 否则仅清空. 返回是否重新分配.
    pub fn set_screen(&mut self, width: u32, height: u32) -> bool {
        let reallocated = (width, height) != (self.width, self.height);
        if reallocated {
            self.width = width;
            self.height = height;
            self.buffer = SharedBuffer::new(Self::buffer_len(width, height));
            debug!(width, height, len = self.buffer.len(), "重新分配文本缓冲区");
        } else {
            self.buffer.fill(0);
        }
        self.reset_cursor(TextMode::Big);
        self.pending = REFRESH_NONE;
        reallocated
    }

    /// 得到与文本缓冲区关联的内存, 可将其安装到地址空间中
    pub fn text_ram(&self) -> TextRam {
        TextRam::new(self.buffer.clone())
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    /// 往文本缓冲区添加一个 gb2312 编码的字符, 不刷新到屏幕
    pub fn add_char(&mut self, c: u16) {
        let buffer = self.buffer.clone();
        buffer.with(|buf| self.add_char_in(buf, c));
    }

    /// 依次添加字符串中的每个字节, 高位字节与其后一字节组成双字节字符
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        let mut iter = bytes.iter().copied();
        while let Some(b) = iter.next() {
            if b >= 0x80 {
                let hi = iter.next().unwrap_or(0x20);
                self.add_char(u16::from_le_bytes([b, hi]));
            } else {
                self.add_char(b as u16);
            }
        }
    }

    fn add_char_in(&mut self, buf: &mut [u8], c: u16) {
        if self.cur_row >= self.max_row {
            // 已经超出屏幕, 整体上移一行
            self.move_up_in(buf);
        }
        if c > 0xff {
            if self.cur_col + 1 >= self.max_col {
                // 空位不足, 补空格后转下一行
                self.put(buf, 0x20);
                self.cur_col = 0;
                self.cur_row += 1;
                if self.cur_row >= self.max_row {
                    self.move_up_in(buf);
                }
            }
            let [lo, hi] = c.to_le_bytes();
            self.put(buf, lo);
            self.cur_col += 1;
            self.put(buf, hi);
            self.cur_col += 1;
            if self.cur_col >= self.max_col {
                self.cur_col = 0;
                self.cur_row += 1;
            }
            return;
        }
        match c as u8 {
            b'\n' => {
                self.cur_col = 0;
                self.cur_row += 1;
                if self.cur_row >= self.max_row {
                    self.move_up_in(buf);
                }
            }
            b'\r' => {}
            byte => {
                self.put(buf, byte);
                self.cur_col += 1;
                if self.cur_col >= self.max_col {
                    self.cur_col = 0;
                    self.cur_row += 1;
                }
            }
        }
    }

    #[inline]
    fn put(&self, buf: &mut [u8], value: u8) {
        if let Some(slot) = buf.get_mut(self.max_col * self.cur_row + self.cur_col) {
            *slot = value;
        }
    }

    /// 将文本缓冲区内容整体上移一行, 光标行减一
    pub fn scroll_up(&mut self) {
        let buffer = self.buffer.clone();
        buffer.with(|buf| self.move_up_in(buf));
    }

    fn move_up_in(&mut self, buf: &mut [u8]) {
        if self.cur_row == 0 {
            return;
        }
        let cols = self.max_col;
        let total = (cols * self.max_row).min(buf.len());
        let tail = total.saturating_sub(cols);
        buf.copy_within(total - tail..total, 0);
        buf[tail..total].fill(0);
        self.cur_row -= 1;
        self.scrolls += 1;
    }

    /// 设置光标位置, 越界的坐标分量保持不变
    pub fn set_location(&mut self, row: i32, col: i32) {
        if row >= 0 && (row as usize) < self.max_row {
            self.cur_row = row as usize;
        }
        if col >= 0 && (col as usize) < self.max_col {
            self.cur_col = col as usize;
        }
    }

    /// 清除文本缓冲区并设置字体
    pub fn set_text_mode(&mut self, mode: TextMode) {
        self.buffer.fill(0);
        self.reset_cursor(mode);
        debug!(?mode, rows = self.max_row, cols = self.max_col, "切换字体模式");
    }

    fn reset_cursor(&mut self, mode: TextMode) {
        let (cell_w, cell_h) = mode.cell();
        self.mode = mode;
        self.cur_row = 0;
        self.cur_col = 0;
        self.max_col = (self.width / cell_w) as usize;
        self.max_row = (self.height / cell_h) as usize;
    }

    /// 记录一次刷新请求, 与尚未处理的请求合并
    pub fn request_refresh(&mut self, mask: u8) {
        self.pending &= mask;
    }

    /// 是否有尚未绘制的刷新请求
    pub fn is_dirty(&self) -> bool {
        self.pending != REFRESH_NONE
    }

    /// 取出并清空尚未绘制的刷新请求
    pub fn take_pending_mask(&mut self) -> u8 {
        std::mem::replace(&mut self.pending, REFRESH_NONE)
    }

    /// 刷新屏幕, 即 UpdateLCD
    ///
    /// 掩码从高到低对应屏幕的每一行, 0 表示该行更新, 1 表示不更新;
    /// 每处理一行掩码左移一位, 因此第 8 行以后总会被重绘.
    /// `0xff` 不刷新, `0` 先清屏再刷新全部行.
    pub fn refresh(&self, mask: u8, canvas: &mut Canvas<'_>) {
        if mask == REFRESH_NONE {
            return;
        }
        let (ox, oy) = self.mode.origin();
        let dy = self.mode.cell().1 as i32;
        let mut draw_mode = DrawMode::DRAW_COPY | DrawMode::RENDER_GRAPH;
        if self.mode == TextMode::Big {
            draw_mode |= DrawMode::TEXT_BIG;
        }
        let (width, height) = (self.width, self.height);
        let cols = self.max_col;
        let rows = self.max_row;

        self.buffer.with(|buf| {
            let render = canvas.renderer();
            let draw_row = |render: &mut dyn Renderer, row: usize| {
                let start = (row * cols).min(buf.len());
                let end = (start + cols).min(buf.len());
                render.draw_string(ox, oy + row as i32 * dy, &buf[start..end]);
            };
            if mask == REFRESH_ALL {
                render.set_draw_mode(DrawMode::DRAW_CLEAR | DrawMode::RENDER_GRAPH | DrawMode::RENDER_FILL);
                render.draw_rect(0, 0, width, height);
                render.set_draw_mode(draw_mode);
                for row in 0..rows {
                    draw_row(&mut *render, row);
                }
            } else {
                render.set_draw_mode(draw_mode);
                let mut m = mask as u32;
                for row in 0..rows {
                    if m & 0x80 == 0 {
                        draw_row(&mut *render, row);
                    }
                    m <<= 1;
                }
            }
        });
        trace!(mask = format_args!("{:#04x}", mask), "刷新文本");
        canvas.screen_changed();
    }

    /// 累计滚屏次数, 调用方据此判断是否需要整屏重绘
    #[inline]
    pub fn scroll_count(&self) -> u64 {
        self.scrolls
    }

    #[inline]
    pub fn cursor(&self) -> (usize, usize) {
        (self.cur_row, self.cur_col)
    }

    #[inline]
    pub fn max_row(&self) -> usize {
        self.max_row
    }

    #[inline]
    pub fn max_col(&self) -> usize {
        self.max_col
    }

    #[inline]
    pub fn mode(&self) -> TextMode {
        self.mode
    }

    #[inline]
    pub fn is_big_mode(&self) -> bool {
        self.mode == TextMode::Big
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 当前字体下某一行的内容
    pub fn row_bytes(&self, row: usize) -> Vec<u8> {
        let cols = self.max_col;
        self.buffer.with(|buf| {
            let start = (row * cols).min(buf.len());
            let end = (start + cols).min(buf.len());
            buf[start..end].to_vec()
        })
    }
}

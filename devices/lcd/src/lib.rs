//! 无头 LCD 显示目标
//!
//! 不做像素绘制, 只把字符串绘制调用按行记录成一帧文本,
//! 供命令行宿主输出和测试检查.

use text_console::{BIG_CELL, DrawMode, Renderer, SMALL_CELL, Screen, ScreenError};
use tracing::trace;

/// 默认屏幕尺寸 (像素)
pub const LCD_WIDTH: u32 = 160;
pub const LCD_HEIGHT: u32 = 80;

/// 无头 LCD
#[derive(Debug)]
pub struct Lcd {
    name: String,
    width: u32,
    height: u32,
    mode: DrawMode,
    /// 按小字体行数预留的文本帧
    frame: Vec<Vec<u8>>,
    locked: bool,
    changed: bool,
    posted: u64,
}

impl Lcd {
    pub fn new(name: String, width: u32, height: u32) -> Self {
        Self {
            name,
            width,
            height,
            mode: DrawMode::default(),
            frame: Self::blank_frame(height),
            locked: false,
            changed: false,
            posted: 0,
        }
    }

    fn blank_frame(height: u32) -> Vec<Vec<u8>> {
        vec![Vec::new(); (height / SMALL_CELL.1) as usize]
    }

    /// 已提交的帧数
    pub fn frames_posted(&self) -> u64 {
        self.posted
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// 某一文本行的原始字节
    pub fn line(&self, row: usize) -> Option<&[u8]> {
        self.frame.get(row).map(Vec::as_slice)
    }

    /// 当前帧的可打印形式, 非 ASCII 字节显示为 `?`
    pub fn snapshot(&self) -> String {
        let mut out = String::new();
        for line in &self.frame {
            let text: String = line
                .iter()
                .map(|&b| match b {
                    0 => ' ',
                    0x20..=0x7e => b as char,
                    _ => '?',
                })
                .collect();
            out.push_str(text.trim_end());
            out.push('\n');
        }
        out
    }

    fn row_of(&self, y: i32) -> Option<usize> {
        let (dy, oy) = if self.mode.contains(DrawMode::TEXT_BIG) {
            (BIG_CELL.1 as i32, 0)
        } else {
            (SMALL_CELL.1 as i32, 1)
        };
        let row = (y - oy).checked_div(dy)?;
        usize::try_from(row).ok()
    }
}

impl Default for Lcd {
    fn default() -> Self {
        Self::new("lcd".to_string(), LCD_WIDTH, LCD_HEIGHT)
    }
}

impl Renderer for Lcd {
    fn set_draw_mode(&mut self, mode: DrawMode) {
        self.mode = mode;
    }

    fn draw_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        // 只关心覆盖整屏的清除填充
        let full = x <= 0 && y <= 0 && width >= self.width && height >= self.height;
        if full && self.mode.contains(DrawMode::DRAW_CLEAR | DrawMode::RENDER_FILL) {
            self.frame.iter_mut().for_each(Vec::clear);
        }
    }

    fn draw_string(&mut self, _x: i32, y: i32, text: &[u8]) {
        let Some(row) = self.row_of(y) else {
            return;
        };
        if let Some(line) = self.frame.get_mut(row) {
            line.clear();
            line.extend_from_slice(text);
        }
    }
}

impl Screen for Lcd {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.frame = Self::blank_frame(height);
    }

    fn begin_draw(&mut self) -> Result<(), ScreenError> {
        if self.locked {
            return Err(ScreenError::Lock(format!("{} 的画布未释放", self.name)));
        }
        self.locked = true;
        Ok(())
    }

    fn renderer(&mut self) -> &mut dyn Renderer {
        self
    }

    fn end_draw(&mut self) {
        self.locked = false;
        if std::mem::take(&mut self.changed) {
            self.posted += 1;
            trace!(frame = self.posted, "提交 LCD 帧");
        }
    }

    fn fire_screen_changed(&mut self) {
        self.changed = true;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

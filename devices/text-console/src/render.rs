//! 显示目标与绘图原语接口
//!
//! 文本控制台只负责组合这些调用, 像素级绘制由宿主实现.

use std::ops::{BitOr, BitOrAssign};

use thiserror::Error;

/// 显示目标错误类型
#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("无法锁定画布: {0}")]
    Lock(String),
}

/// 绘图模式标志位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DrawMode(u8);

impl DrawMode {
    /// 复制绘制
    pub const DRAW_COPY: DrawMode = DrawMode(0x01);
    /// 清除绘制
    pub const DRAW_CLEAR: DrawMode = DrawMode(0x02);
    /// 绘制到图形层
    pub const RENDER_GRAPH: DrawMode = DrawMode(0x04);
    /// 填充图形
    pub const RENDER_FILL: DrawMode = DrawMode(0x10);
    /// 大字体 (8x16)
    pub const TEXT_BIG: DrawMode = DrawMode(0x20);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: DrawMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for DrawMode {
    type Output = DrawMode;

    fn bitor(self, rhs: DrawMode) -> DrawMode {
        DrawMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for DrawMode {
    fn bitor_assign(&mut self, rhs: DrawMode) {
        self.0 |= rhs.0;
    }
}

/// 绘图原语
pub trait Renderer {
    fn set_draw_mode(&mut self, mode: DrawMode);

    /// 画矩形, 模式含 [`DrawMode::RENDER_FILL`] 时为填充矩形
    fn draw_rect(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// 在 (x, y) 处绘制一行 gb2312 字节串, 双字节字符低字节在前
    fn draw_string(&mut self, x: i32, y: i32, text: &[u8]);
}

/// 显示目标
pub trait Screen: Send {
    /// 像素宽度
    fn width(&self) -> u32;

    /// 像素高度
    fn height(&self) -> u32;

    /// 宿主表面尺寸变化
    fn set_size(&mut self, width: u32, height: u32);

    /// 开始绘制, 必须与 [`Screen::end_draw`] 成对出现; 请通过 [`Canvas`] 使用
    fn begin_draw(&mut self) -> Result<(), ScreenError>;

    /// 当前绘制上下文的绘图原语
    fn renderer(&mut self) -> &mut dyn Renderer;

    /// 结束绘制并提交
    fn end_draw(&mut self);

    /// 内容已改变
    fn fire_screen_changed(&mut self);

    /// 获取显示目标名称（用于调试）
    fn name(&self) -> &str {
        "screen"
    }
}

/// 绘制上下文
///
/// 构造时锁定显示目标, 析构时释放; 任何退出路径都会调用 `end_draw`.
pub struct Canvas<'a> {
    screen: &'a mut dyn Screen,
}

impl<'a> Canvas<'a> {
    pub fn lock(screen: &'a mut dyn Screen) -> Result<Self, ScreenError> {
        screen.begin_draw()?;
        Ok(Self { screen })
    }

    pub fn width(&self) -> u32 {
        self.screen.width()
    }

    pub fn height(&self) -> u32 {
        self.screen.height()
    }

    pub fn renderer(&mut self) -> &mut dyn Renderer {
        self.screen.renderer()
    }

    pub fn screen_changed(&mut self) {
        self.screen.fire_screen_changed();
    }
}

impl Drop for Canvas<'_> {
    fn drop(&mut self) {
        self.screen.end_draw();
    }
}

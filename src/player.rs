//! 文本播放器
//!
//! 一个只会输出文字的最小解释器, 用来驱动虚拟机和命令行宿主.
//! 程序是一段 gb2312 文本, 其中的控制字节:
//!
//! | 字节 | 含义 |
//! |------|------|
//! | `0x00` | 结束 |
//! | `0x01 row col` | 设置光标位置 |
//! | `0x02 mode` | 清屏并切换字体, 0 为大字体 |
//! | `0x03` | 文本上移一行 |
//! | `0x0c` | 清屏 |
//! | `\n` `\r` | 换行, 忽略 |
//!
//! 其他小于 `0x20` 的字节为非法指令. 运行时内存的函数帧窗口中
//! 保存程序计数器和已输出的字符数 (各 4 字节, 小端).

use text_console::{REFRESH_ALL, TextMode};
use tracing::debug;

use crate::vm::{Interpreter, LavApp, VmContext, VmError};

const OP_END: u8 = 0x00;
const OP_LOCATE: u8 = 0x01;
const OP_MODE: u8 = 0x02;
const OP_SCROLL: u8 = 0x03;
const OP_CLEAR: u8 = 0x0c;

/// 帧窗口大小: 程序计数器 + 字符计数
const FRAME_SIZE: u32 = 8;

#[derive(Debug, Default)]
pub struct TextPlayer {
    text: Vec<u8>,
    pc: usize,
    printed: u32,
    finished: bool,
}

impl TextPlayer {
    pub fn new() -> Self {
        Self {
            finished: true,
            ..Default::default()
        }
    }

    fn fetch(&mut self) -> Result<u8, VmError> {
        let byte = self.text.get(self.pc).copied().ok_or_else(|| {
            VmError::BadApp(format!("程序在 {:#x} 处意外结束", self.pc))
        })?;
        self.pc += 1;
        Ok(byte)
    }

    /// 把计数写回帧窗口
    fn sync_frame(&self, cx: &mut VmContext<'_>) -> Result<(), VmError> {
        let start = match cx.memory.frame() {
            Some(frame) => frame.start(),
            None => return Ok(()),
        };
        cx.memory.write_word(start, self.pc as u32)?;
        cx.memory.write_word(start + 4, self.printed)?;
        Ok(())
    }

    fn print(&mut self, cx: &mut VmContext<'_>, lead: u8) -> Result<(), VmError> {
        let c = if lead >= 0x80 {
            let hi = self.fetch()?;
            u16::from_le_bytes([lead, hi])
        } else {
            lead as u16
        };
        let (row, _) = cx.console.cursor();
        let scrolls = cx.console.scroll_count();
        cx.console.add_char(c);
        self.printed += 1;

        let (new_row, _) = cx.console.cursor();
        let scrolled = cx.console.scroll_count() != scrolls;
        let mask = if !scrolled && new_row == row && row < 8 {
            !(0x80u8 >> row)
        } else {
            // 换行或滚屏, 全部重绘
            REFRESH_ALL
        };
        cx.console.request_refresh(mask);
        Ok(())
    }
}

impl Interpreter for TextPlayer {
    fn load(&mut self, app: &LavApp, cx: &mut VmContext<'_>) -> Result<(), VmError> {
        self.text = app.bytes().to_vec();
        self.pc = 0;
        self.printed = 0;
        self.finished = self.text.is_empty();

        if let Some(frame) = cx.memory.frame_mut() {
            let start = frame.start();
            frame.set_end(start + FRAME_SIZE);
        }
        self.sync_frame(cx)?;
        debug!(app = app.name(), len = self.text.len(), "文本程序已安装");
        Ok(())
    }

    fn step(&mut self, cx: &mut VmContext<'_>) -> Result<(), VmError> {
        if self.finished {
            return Ok(());
        }
        let addr = self.pc as u32;
        let op = self.fetch()?;
        match op {
            OP_END => self.finished = true,
            OP_LOCATE => {
                let row = self.fetch()?;
                let col = self.fetch()?;
                cx.console.set_location(row as i32, col as i32);
            }
            OP_MODE => {
                let mode = self.fetch()?;
                cx.console.set_text_mode(TextMode::from_code(mode as i32));
                cx.console.request_refresh(REFRESH_ALL);
            }
            OP_SCROLL => {
                cx.console.scroll_up();
                cx.console.request_refresh(REFRESH_ALL);
            }
            OP_CLEAR => {
                let mode = cx.console.mode();
                cx.console.set_text_mode(mode);
                cx.console.request_refresh(REFRESH_ALL);
            }
            b'\n' | b'\r' => self.print(cx, op)?,
            0x00..=0x1f => return Err(VmError::IllegalInstruction { opcode: op, addr }),
            _ => self.print(cx, op)?,
        }
        if self.pc >= self.text.len() {
            self.finished = true;
        }
        self.sync_frame(cx)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn dispose(&mut self) {
        self.text = Vec::new();
        self.pc = 0;
        self.finished = true;
    }

    fn name(&self) -> &str {
        "text-player"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::const_values::VmConfig;
    use crate::vm::LavVm;
    use lcd::Lcd;
    use region_trait::RegionKind;
    use text_console::Canvas;

    fn create_vm() -> LavVm {
        LavVm::new(&VmConfig::default(), Box::new(TextPlayer::new())).unwrap()
    }

    fn run(vm: &mut LavVm, limit: usize) -> usize {
        let mut steps = 0;
        while !vm.is_end() && steps < limit {
            vm.step().unwrap();
            steps += 1;
        }
        steps
    }

    fn runtime_frame_consistent(vm: &LavVm) -> bool {
        let runtime = vm.memory().region(RegionKind::Runtime).unwrap();
        let frame = vm.memory().frame().unwrap();
        frame.is_consistent(runtime.base(), runtime.size())
    }

    #[test]
    fn test_prints_text() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("hello", b"hello\nworld".to_vec())).unwrap();
        assert_eq!(run(&mut vm, 100), 11);
        assert!(vm.is_end());
        assert_eq!(&vm.console().row_bytes(0)[..5], b"hello");
        assert_eq!(&vm.console().row_bytes(1)[..5], b"world");
        assert_eq!(vm.console().cursor(), (1, 5));
    }

    #[test]
    fn test_frame_tracks_progress() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("abc", b"ab\x01\x02\x03c\x00zz".to_vec())).unwrap();
        assert!(runtime_frame_consistent(&vm));
        assert_eq!(vm.memory().frame().unwrap().len(), 8);

        run(&mut vm, 100);
        let start = vm.memory().frame().unwrap().start();
        // 遇到结束指令后停止, 之后的字节不执行
        assert_eq!(vm.memory().read_word(start).unwrap(), 7);
        assert_eq!(vm.memory().read_word(start + 4).unwrap(), 3);
        assert!(runtime_frame_consistent(&vm));
        assert_eq!(vm.console().row_bytes(2)[3], b'c');
    }

    #[test]
    fn test_double_byte_char() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("gb", vec![0xb0, 0xa1, b'x'])).unwrap();
        assert_eq!(run(&mut vm, 10), 2);
        assert_eq!(&vm.console().row_bytes(0)[..3], &[0xb0, 0xa1, b'x']);
    }

    #[test]
    fn test_refresh_mask_per_row() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("rows", b"a\nb".to_vec())).unwrap();
        vm.console_mut().take_pending_mask();

        vm.step().unwrap();
        assert_eq!(vm.console_mut().take_pending_mask(), 0x7f);
        vm.step().unwrap();
        assert_eq!(vm.console_mut().take_pending_mask(), REFRESH_ALL);
        vm.step().unwrap();
        assert_eq!(vm.console_mut().take_pending_mask(), 0xbf);
    }

    /// 每步之后把刷新请求画到 LCD 上
    fn run_on_lcd(vm: &mut LavVm, lcd: &mut Lcd) {
        while !vm.is_end() {
            vm.step().unwrap();
            let mask = vm.console_mut().take_pending_mask();
            let mut canvas = Canvas::lock(lcd).unwrap();
            vm.console().refresh(mask, &mut canvas);
        }
    }

    #[test]
    fn test_scroll_repaints_whole_screen() {
        let mut vm = create_vm();
        let mut lcd = Lcd::default();
        vm.load_app(&LavApp::new("lines", b"1\n2\n3\n4\n5\n6".to_vec())).unwrap();
        run_on_lcd(&mut vm, &mut lcd);

        // 大字体下只有 5 行, 第 6 行把内容整体上移
        assert_eq!(vm.console().scroll_count(), 1);
        assert_eq!(lcd.snapshot(), "2\n3\n4\n5\n6\n\n");
    }

    #[test]
    fn test_scroll_on_last_row_requests_full_refresh() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("tail", b"1\n2\n3\n4\n5\n".to_vec())).unwrap();
        for _ in 0..8 {
            vm.step().unwrap();
        }
        assert_eq!(vm.console().cursor(), (4, 0));
        vm.step().unwrap();
        vm.console_mut().take_pending_mask();

        // 光标停在最后一行, 换行滚屏后行号不变
        vm.step().unwrap();
        assert_eq!(vm.console().cursor(), (4, 0));
        assert_eq!(vm.console_mut().take_pending_mask(), REFRESH_ALL);
    }

    #[test]
    fn test_mode_switch_clears() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("mode", b"ab\x02\x01c".to_vec())).unwrap();
        run(&mut vm, 10);
        assert_eq!(vm.console().mode(), TextMode::Small);
        assert_eq!(&vm.console().row_bytes(0)[..2], b"c\0");
    }

    #[test]
    fn test_illegal_instruction() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("bad", b"a\x07".to_vec())).unwrap();
        vm.step().unwrap();
        let err = vm.step().unwrap_err();
        assert!(matches!(err, VmError::IllegalInstruction { opcode: 0x07, addr: 1 }));
        assert!(vm.is_end());
    }

    #[test]
    fn test_truncated_locate() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("cut", vec![OP_LOCATE, 1])).unwrap();
        assert!(matches!(vm.step(), Err(VmError::BadApp(_))));
    }

    #[test]
    fn test_empty_app_is_finished() {
        let mut vm = create_vm();
        vm.load_app(&LavApp::new("empty", Vec::new())).unwrap();
        assert!(vm.is_end());
    }
}

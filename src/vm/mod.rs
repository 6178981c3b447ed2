//! 虚拟机核心模块

mod exception;
mod interpreter;
pub mod memory;
pub mod region;
pub mod state;

use region_trait::RegionKind;
use text_console::TextConsole;
use tracing::{debug, info};

use crate::const_values::VmConfig;

pub use exception::VmError;
pub use interpreter::{Interpreter, LavApp, VmContext};
pub use memory::{AddressSpace, MemoryError};
pub use region::Region;
pub use state::{DriverEvent, ExecState, RunState};

/// 虚拟机
///
/// 持有全部内存区域与文本控制台, 把指令执行委托给解释器.
/// 区域按 RUNTIME, GRAPH, BUFFER, TEXT, STRING 的顺序安装.
pub struct LavVm {
    memory: AddressSpace,
    console: TextConsole,
    interpreter: Box<dyn Interpreter>,
    exec_state: ExecState,
    app: Option<String>,
}

impl LavVm {
    /// 创建新的虚拟机实例
    pub fn new(config: &VmConfig, interpreter: Box<dyn Interpreter>) -> Result<Self, VmError> {
        let screen = config.screen;
        let console = TextConsole::new(screen.width, screen.height);
        let mut memory = AddressSpace::new();
        memory.install(Box::new(Region::runtime(config.memory.runtime_size)))?;
        memory.install(Box::new(Region::new(RegionKind::Graph, screen.graph_size())))?;
        memory.install(Box::new(Region::new(RegionKind::Buffer, screen.graph_size())))?;
        memory.install(Box::new(console.text_ram()))?;
        memory.install(Box::new(Region::new(RegionKind::String, config.memory.string_size)))?;
        info!(
            interpreter = interpreter.name(),
            total = format_args!("{:#x}", memory.total_size()),
            "创建虚拟机"
        );
        debug!(layout = ?memory, "地址空间布局");

        Ok(Self {
            memory,
            console,
            interpreter,
            exec_state: ExecState::End,
            app: None,
        })
    }

    /// 加载程序, 如有正在运行的程序先将其释放
    pub fn load_app(&mut self, app: &LavApp) -> Result<(), VmError> {
        if !self.is_end() {
            self.dispose();
        }
        self.memory.clear_all();
        let (width, height) = (self.console.width(), self.console.height());
        self.console.set_screen(width, height);

        let mut cx = VmContext {
            memory: &mut self.memory,
            console: &mut self.console,
        };
        self.interpreter.load(app, &mut cx)?;
        self.exec_state = if self.interpreter.is_finished() {
            ExecState::End
        } else {
            ExecState::Idle
        };
        self.app = Some(app.name().to_string());
        info!(app = app.name(), size = app.bytes().len(), "加载程序");
        Ok(())
    }

    /// 执行单步
    pub fn step(&mut self) -> Result<(), VmError> {
        if self.exec_state == ExecState::End {
            return Err(VmError::NotLoaded);
        }
        self.exec_state = ExecState::Running;
        let mut cx = VmContext {
            memory: &mut self.memory,
            console: &mut self.console,
        };
        if let Err(e) = self.interpreter.step(&mut cx) {
            self.exec_state = ExecState::End;
            return Err(e);
        }
        self.exec_state = if self.interpreter.is_finished() {
            ExecState::End
        } else {
            ExecState::Idle
        };
        Ok(())
    }

    /// 程序是否已结束 (未加载也视为结束)
    #[inline]
    pub fn is_end(&self) -> bool {
        self.exec_state == ExecState::End
    }

    /// 释放当前程序, 区域内容保留到下一次加载
    pub fn dispose(&mut self) {
        self.interpreter.dispose();
        self.exec_state = ExecState::End;
        if let Some(app) = self.app.take() {
            info!(app = %app, "释放程序");
        }
    }

    /// 显示目标尺寸变化
    ///
    /// 文本缓冲区重新分配时, 文本区与随屏幕尺寸确定的显存/屏幕缓存一起替换,
    /// 所有区域重新排布基址.
    pub fn set_screen(&mut self, width: u32, height: u32) -> Result<(), VmError> {
        if !self.console.set_screen(width, height) {
            return Ok(());
        }
        let graph_size = (width as usize * height as usize).div_ceil(8);
        self.memory.replace(Box::new(self.console.text_ram()))?;
        self.memory.replace(Box::new(Region::new(RegionKind::Graph, graph_size)))?;
        self.memory.replace(Box::new(Region::new(RegionKind::Buffer, graph_size)))?;
        info!(width, height, total = format_args!("{:#x}", self.memory.total_size()), "屏幕尺寸变化");
        Ok(())
    }

    #[inline(always)]
    pub fn get_exec_state(&self) -> ExecState {
        self.exec_state
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app.as_deref()
    }

    #[inline(always)]
    pub fn memory(&self) -> &AddressSpace {
        &self.memory
    }

    #[inline(always)]
    pub fn memory_mut(&mut self) -> &mut AddressSpace {
        &mut self.memory
    }

    #[inline(always)]
    pub fn console(&self) -> &TextConsole {
        &self.console
    }

    #[inline(always)]
    pub fn console_mut(&mut self) -> &mut TextConsole {
        &mut self.console
    }

    /// 文本区的原始字节
    pub fn text_bytes(&self) -> Vec<u8> {
        self.console.buffer().to_vec()
    }

    /// 指定类型区域的基址
    pub fn region_base(&self, kind: RegionKind) -> Option<u32> {
        self.memory.region(kind).map(|region| region.base())
    }
}

//! 执行状态

/// 虚拟机自身的执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ExecState {
    /// 已加载程序, 等待下一步
    #[default]
    Idle,
    /// 正在执行一步
    Running,
    /// 程序结束或未加载
    End,
}

/// 执行驱动器的运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Paused,
    Running,
    /// 终止状态, 不会再离开
    Exited,
}

impl RunState {
    #[inline]
    pub fn is_exited(self) -> bool {
        self == RunState::Exited
    }
}

/// 执行驱动器发给宿主的状态通知
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum DriverEvent {
    #[default]
    None,
    Running,
    Paused,
    /// 已加载新程序
    Loaded,
    /// 程序执行出错, 随后会退出
    Fault,
    Exited,
}

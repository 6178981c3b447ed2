//! 执行驱动器
//!
//! 在独立的工作线程中反复单步执行虚拟机, 宿主线程通过 [`ExecutionDriver`]
//! 暂停, 恢复, 加载程序, 调整屏幕或终止执行. 控制状态放在一把锁里,
//! 暂停时工作线程阻塞在条件变量上而不是忙等.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use text_console::{Canvas, REFRESH_ALL, Screen, ScreenError};
use tracing::{debug, error, info, trace, warn};

use crate::const_values::{DriverConfig, VmConfig};
use crate::utils::ringbuf::RingBuffer;
use crate::vm::{DriverEvent, LavApp, LavVm, RunState};

/// 需要由工作线程执行的请求
#[derive(Debug)]
enum Command {
    Load(LavApp),
    Resize { width: u32, height: u32 },
}

#[derive(Debug)]
struct Control {
    state: RunState,
    /// 取消标志, 置为 false 后工作线程尽快退出
    running: bool,
    commands: VecDeque<Command>,
    events: RingBuffer<DriverEvent>,
    /// 加载完成后是否开始运行, 以宿主最近一次请求为准
    resume_after_load: bool,
}

impl Control {
    /// 切换状态并记录通知, 已退出或状态未变时返回 false
    fn transition(&mut self, state: RunState) -> bool {
        if self.state.is_exited() || self.state == state {
            return false;
        }
        self.state = state;
        self.events.push_overwrite(match state {
            RunState::Running => DriverEvent::Running,
            RunState::Paused => DriverEvent::Paused,
            RunState::Exited => DriverEvent::Exited,
        });
        true
    }
}

#[derive(Debug)]
struct Shared {
    control: Mutex<Control>,
    signal: Condvar,
    steps: AtomicU64,
}

impl Shared {
    fn new(event_list_size: usize) -> Self {
        Self {
            control: Mutex::new(Control {
                state: RunState::Paused,
                running: true,
                commands: VecDeque::new(),
                events: RingBuffer::new(event_list_size),
                resume_after_load: false,
            }),
            signal: Condvar::new(),
            steps: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 修改运行状态, 已退出时忽略
    fn set_state(&self, state: RunState) {
        let mut control = self.lock();
        control.resume_after_load = state == RunState::Running;
        if control.transition(state) {
            drop(control);
            self.signal.notify_all();
        }
    }

    /// 加载完成后, 宿主没有在此期间要求暂停时开始运行
    fn resume_after_load(&self) {
        let mut control = self.lock();
        if control.resume_after_load && control.transition(RunState::Running) {
            drop(control);
            self.signal.notify_all();
        }
    }

    /// 等待进入终止状态, 超时返回 false
    fn wait_exited(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = self.lock();
        while !control.state.is_exited() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            control = self
                .signal
                .wait_timeout(control, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn push_event(&self, event: DriverEvent) {
        self.lock().events.push_overwrite(event);
    }

    fn cancel(&self) {
        self.lock().running = false;
        self.signal.notify_all();
    }

    /// 工作线程的最后一步
    fn finish(&self) {
        let mut control = self.lock();
        control.running = false;
        control.state = RunState::Exited;
        control.commands.clear();
        control.events.push_overwrite(DriverEvent::Exited);
        drop(control);
        self.signal.notify_all();
    }
}

/// 工作线程下一步要做的事
enum Work {
    Commands(Vec<Command>),
    Step,
    Exit,
}

struct Worker<S> {
    vm: LavVm,
    screen: S,
    shared: Arc<Shared>,
    config: DriverConfig,
}

impl<S: Screen> Worker<S> {
    fn run(mut self) -> (LavVm, S) {
        info!(screen = self.screen.name(), "工作线程启动");
        if let Err(e) = self.run_loop() {
            error!("执行出错: {:#}", e);
            self.shared.push_event(DriverEvent::Fault);
        }
        self.vm.dispose();
        self.shared.finish();
        info!(steps = self.shared.steps.load(Ordering::Relaxed), "工作线程退出");
        (self.vm, self.screen)
    }

    fn run_loop(&mut self) -> Result<()> {
        let mut batch = 0u64;
        loop {
            match self.next_work() {
                Work::Exit => return Ok(()),
                Work::Commands(commands) => {
                    for command in commands {
                        self.apply(command)?;
                    }
                    continue;
                }
                Work::Step => {}
            }

            if self.vm.is_end() {
                if self.config.exit_on_finish {
                    info!(app = ?self.vm.app_name(), "程序结束, 退出");
                    return Ok(());
                }
                self.idle();
                continue;
            }

            self.vm.step().context("虚拟机单步执行失败")?;
            self.shared.steps.fetch_add(1, Ordering::Relaxed);
            self.refresh_on_dirty().context("刷新屏幕失败")?;

            batch += 1;
            if batch >= self.config.yield_interval.max(1) {
                batch = 0;
                self.pace();
            }
        }
    }

    /// 暂停时阻塞, 直到有请求, 被恢复或被取消
    fn next_work(&self) -> Work {
        let mut control = self.shared.lock();
        loop {
            if !control.running {
                return Work::Exit;
            }
            if !control.commands.is_empty() {
                return Work::Commands(control.commands.drain(..).collect());
            }
            match control.state {
                RunState::Running => return Work::Step,
                RunState::Exited => return Work::Exit,
                RunState::Paused => {
                    control = self
                        .shared
                        .signal
                        .wait(control)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// 程序已结束但不退出时, 等待新请求或超时
    fn idle(&self) {
        let control = self.shared.lock();
        if !control.running || !control.commands.is_empty() {
            return;
        }
        let timeout = Duration::from_millis(self.config.idle_millis.max(1));
        let _ = self
            .shared
            .signal
            .wait_timeout(control, timeout)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn pace(&self) {
        if self.config.yield_micros == 0 {
            thread::yield_now();
        } else {
            thread::sleep(Duration::from_micros(self.config.yield_micros));
        }
    }

    fn apply(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Load(app) => match self.vm.load_app(&app) {
                Ok(()) => {
                    self.vm.console_mut().request_refresh(REFRESH_ALL);
                    self.refresh_on_dirty().context("刷新屏幕失败")?;
                    self.shared.push_event(DriverEvent::Loaded);
                    self.shared.resume_after_load();
                }
                Err(e) => {
                    warn!(app = app.name(), "加载程序失败: {}", e);
                    self.shared.push_event(DriverEvent::Fault);
                }
            },
            Command::Resize { width, height } => {
                debug!(width, height, "调整屏幕尺寸");
                self.screen.set_size(width, height);
                self.vm
                    .set_screen(width, height)
                    .with_context(|| format!("无法调整屏幕尺寸为 {}x{}", width, height))?;
                self.vm.console_mut().request_refresh(REFRESH_ALL);
                self.refresh_on_dirty().context("刷新屏幕失败")?;
            }
        }
        Ok(())
    }

    /// 文本有变化时锁定屏幕并重绘
    fn refresh_on_dirty(&mut self) -> Result<(), ScreenError> {
        if !self.vm.console().is_dirty() {
            return Ok(());
        }
        // 锁定失败时保留刷新请求
        let mut canvas = Canvas::lock(&mut self.screen)?;
        let mask = self.vm.console_mut().take_pending_mask();
        self.vm.console().refresh(mask, &mut canvas);
        trace!(mask = format_args!("{:#04x}", mask), "屏幕已刷新");
        Ok(())
    }
}

/// 执行驱动器
///
/// 创建时处于暂停状态. 析构时取消并等待工作线程结束.
pub struct ExecutionDriver<S: Screen + 'static> {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<(LavVm, S)>>,
}

impl<S: Screen + 'static> ExecutionDriver<S> {
    /// 启动工作线程
    pub fn spawn(vm: LavVm, screen: S, config: &VmConfig) -> Result<Self> {
        let shared = Arc::new(Shared::new(config.debug.event_list_size));
        let worker = Worker {
            vm,
            screen,
            shared: shared.clone(),
            config: config.driver,
        };
        let handle = thread::Builder::new()
            .name("lav-worker".to_string())
            .spawn(move || worker.run())
            .context("无法创建工作线程")?;
        Ok(Self {
            shared,
            worker: Some(handle),
        })
    }

    /// 打开新程序: 先暂停, 由工作线程释放旧程序, 加载后开始运行
    ///
    /// 加载完成前调用 [`ExecutionDriver::pause`] 时, 程序加载后保持暂停.
    pub fn open(&self, app: LavApp) {
        info!(app = app.name(), "打开程序");
        let mut control = self.shared.lock();
        if control.state.is_exited() {
            debug!(app = app.name(), "工作线程已退出, 忽略请求");
            return;
        }
        control.transition(RunState::Paused);
        control.resume_after_load = true;
        control.commands.push_back(Command::Load(app));
        drop(control);
        self.shared.signal.notify_all();
    }

    pub fn pause(&self) {
        self.shared.set_state(RunState::Paused);
    }

    pub fn resume(&self) {
        self.shared.set_state(RunState::Running);
    }

    /// 宿主表面尺寸变化, 在工作线程中生效
    pub fn resize(&self, width: u32, height: u32) {
        self.push_command(Command::Resize { width, height });
    }

    fn push_command(&self, command: Command) {
        let mut control = self.shared.lock();
        if control.state.is_exited() {
            debug!(?command, "工作线程已退出, 忽略请求");
            return;
        }
        control.commands.push_back(command);
        drop(control);
        self.shared.signal.notify_all();
    }

    pub fn state(&self) -> RunState {
        self.shared.lock().state
    }

    /// 已执行的总步数
    pub fn steps(&self) -> u64 {
        self.shared.steps.load(Ordering::Relaxed)
    }

    /// 取出尚未读取的状态通知
    pub fn events(&self) -> Vec<DriverEvent> {
        self.shared.lock().events.drain()
    }

    /// 等待工作线程自行退出, 超时返回 false
    pub fn wait_for_exit(&self, timeout: Duration) -> bool {
        self.shared.wait_exited(timeout)
    }

    /// 取消执行并等待工作线程结束, 返回虚拟机和显示目标
    ///
    /// 工作线程已被回收或异常退出时返回 `None`.
    pub fn shutdown(&mut self) -> Option<(LavVm, S)> {
        let handle = self.worker.take()?;
        self.shared.cancel();
        match handle.join() {
            Ok(parts) => Some(parts),
            Err(_) => {
                error!("工作线程异常退出");
                let mut control = self.shared.lock();
                control.state = RunState::Exited;
                control.events.push_overwrite(DriverEvent::Fault);
                drop(control);
                self.shared.signal.notify_all();
                None
            }
        }
    }
}

impl<S: Screen + 'static> Drop for ExecutionDriver<S> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{Interpreter, VmContext, VmError};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use text_console::{DrawMode, Renderer};

    #[derive(Default)]
    struct Probe {
        steps: AtomicUsize,
        disposed: AtomicUsize,
        max_col: AtomicUsize,
        begins: AtomicUsize,
        ends: AtomicUsize,
        changes: AtomicUsize,
        rows_drawn: AtomicUsize,
        size: Mutex<(u32, u32)>,
        panic_in_step: AtomicBool,
        fail_lock: AtomicBool,
        load_millis: AtomicU64,
    }

    /// 每步输出一个字符
    struct CountingInterpreter {
        probe: Arc<Probe>,
        remaining: Option<usize>,
        fault_at: Option<usize>,
        count: usize,
    }

    impl CountingInterpreter {
        fn new(probe: Arc<Probe>, remaining: Option<usize>) -> Self {
            Self {
                probe,
                remaining,
                fault_at: None,
                count: 0,
            }
        }
    }

    impl Interpreter for CountingInterpreter {
        fn load(&mut self, _app: &LavApp, cx: &mut VmContext<'_>) -> Result<(), VmError> {
            let delay = self.probe.load_millis.load(Ordering::SeqCst);
            if delay > 0 {
                thread::sleep(Duration::from_millis(delay));
            }
            self.count = 0;
            self.probe.max_col.store(cx.console.max_col(), Ordering::SeqCst);
            Ok(())
        }

        fn step(&mut self, cx: &mut VmContext<'_>) -> Result<(), VmError> {
            if self.probe.panic_in_step.load(Ordering::SeqCst) {
                panic!("解释器崩溃");
            }
            self.count += 1;
            if Some(self.count) == self.fault_at {
                cx.memory.read_byte(u32::MAX)?;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            cx.console.add_char(u16::from(b'a' + (self.count % 26) as u8));
            cx.console.request_refresh(0x7f);
            self.probe.max_col.store(cx.console.max_col(), Ordering::SeqCst);
            self.probe.steps.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_finished(&self) -> bool {
            self.remaining == Some(0)
        }

        fn dispose(&mut self) {
            self.probe.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ProbeScreen {
        probe: Arc<Probe>,
        width: u32,
        height: u32,
    }

    impl Renderer for ProbeScreen {
        fn set_draw_mode(&mut self, _mode: DrawMode) {}

        fn draw_rect(&mut self, _x: i32, _y: i32, _width: u32, _height: u32) {}

        fn draw_string(&mut self, _x: i32, _y: i32, _text: &[u8]) {
            self.probe.rows_drawn.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Screen for ProbeScreen {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn set_size(&mut self, width: u32, height: u32) {
            self.width = width;
            self.height = height;
            *self.probe.size.lock().unwrap() = (width, height);
        }

        fn begin_draw(&mut self) -> Result<(), ScreenError> {
            if self.probe.fail_lock.load(Ordering::SeqCst) {
                return Err(ScreenError::Lock("画布被占用".to_string()));
            }
            self.probe.begins.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn renderer(&mut self) -> &mut dyn Renderer {
            self
        }

        fn end_draw(&mut self) {
            self.probe.ends.fetch_add(1, Ordering::SeqCst);
        }

        fn fire_screen_changed(&mut self) {
            self.probe.changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_config() -> VmConfig {
        let mut config = VmConfig::default();
        config.driver.yield_interval = 10;
        config.driver.idle_millis = 1;
        config
    }

    fn create_driver(
        interpreter: CountingInterpreter,
        config: &VmConfig,
    ) -> ExecutionDriver<ProbeScreen> {
        let probe = interpreter.probe.clone();
        let vm = LavVm::new(config, Box::new(interpreter)).unwrap();
        let screen = ProbeScreen {
            probe,
            width: config.screen.width,
            height: config.screen.height,
        };
        ExecutionDriver::spawn(vm, screen, config).unwrap()
    }

    fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if pred() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        pred()
    }

    fn app() -> LavApp {
        LavApp::new("test", vec![0])
    }

    #[test]
    fn test_starts_paused() {
        let probe = Arc::new(Probe::default());
        let mut driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        assert_eq!(driver.state(), RunState::Paused);

        driver.resume();
        thread::sleep(Duration::from_millis(20));
        // 没有程序时不执行
        assert_eq!(driver.steps(), 0);

        assert!(driver.shutdown().is_some());
        assert_eq!(driver.state(), RunState::Exited);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);
        assert!(driver.shutdown().is_none());
    }

    #[test]
    fn test_pause_halts_stepping() {
        let probe = Arc::new(Probe::default());
        let driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        driver.open(app());
        assert!(wait_until(Duration::from_secs(5), || driver.steps() > 100));
        assert_eq!(driver.state(), RunState::Running);

        driver.pause();
        thread::sleep(Duration::from_millis(20));
        let paused_at = driver.steps();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(driver.steps(), paused_at);
        assert_eq!(driver.state(), RunState::Paused);

        driver.resume();
        assert!(wait_until(Duration::from_secs(5), || driver.steps() > paused_at));

        let events = driver.events();
        assert!(events.contains(&DriverEvent::Loaded));
        assert!(events.contains(&DriverEvent::Paused));
        assert_eq!(events.last(), Some(&DriverEvent::Running));
    }

    #[test]
    fn test_pause_before_load_keeps_paused() {
        let probe = Arc::new(Probe::default());
        // 加载较慢, 暂停请求一定早于加载完成
        probe.load_millis.store(30, Ordering::SeqCst);
        let driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        driver.open(app());
        driver.pause();
        assert!(wait_until(Duration::from_secs(5), || {
            driver.events().contains(&DriverEvent::Loaded)
        }));
        thread::sleep(Duration::from_millis(20));

        // 程序已加载, 但宿主最后的请求是暂停
        assert_eq!(driver.state(), RunState::Paused);
        assert_eq!(driver.steps(), 0);

        driver.resume();
        assert!(wait_until(Duration::from_secs(5), || driver.steps() > 0));
        assert_eq!(driver.state(), RunState::Running);
    }

    #[test]
    fn test_shutdown_disposes_once() {
        let probe = Arc::new(Probe::default());
        let mut driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        driver.open(app());
        assert!(wait_until(Duration::from_secs(5), || driver.steps() > 0));

        let (vm, _screen) = driver.shutdown().unwrap();
        assert!(vm.is_end());
        assert_eq!(driver.state(), RunState::Exited);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);

        // 退出后不再离开终止状态
        driver.resume();
        driver.open(app());
        assert_eq!(driver.state(), RunState::Exited);
        drop(driver);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_cancels_worker() {
        let probe = Arc::new(Probe::default());
        let driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        driver.open(app());
        assert!(wait_until(Duration::from_secs(5), || driver.steps() > 0));
        drop(driver);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fault_exits() {
        let probe = Arc::new(Probe::default());
        let mut interpreter = CountingInterpreter::new(probe.clone(), None);
        interpreter.fault_at = Some(5);
        let mut driver = create_driver(interpreter, &test_config());
        driver.open(app());

        assert!(driver.wait_for_exit(Duration::from_secs(5)));
        assert_eq!(driver.steps(), 4);
        let events = driver.events();
        assert!(events.contains(&DriverEvent::Fault));
        assert_eq!(events.last(), Some(&DriverEvent::Exited));

        driver.shutdown();
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_worker_panic_reported() {
        let probe = Arc::new(Probe::default());
        probe.panic_in_step.store(true, Ordering::SeqCst);
        let mut driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        driver.open(app());
        thread::sleep(Duration::from_millis(20));

        assert!(driver.shutdown().is_none());
        assert_eq!(driver.state(), RunState::Exited);
        assert!(driver.events().contains(&DriverEvent::Fault));
    }

    #[test]
    fn test_worker_panic_wakes_waiters() {
        let probe = Arc::new(Probe::default());
        probe.panic_in_step.store(true, Ordering::SeqCst);
        let mut driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        let shared = driver.shared.clone();
        let waiter = thread::spawn(move || {
            let start = Instant::now();
            let exited = shared.wait_exited(Duration::from_secs(10));
            (exited, start.elapsed())
        });
        driver.open(app());
        thread::sleep(Duration::from_millis(20));
        assert!(driver.shutdown().is_none());

        let (exited, elapsed) = waiter.join().unwrap();
        assert!(exited);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_refresh_kept_when_lock_fails() {
        let probe = Arc::new(Probe::default());
        let config = test_config();
        let interpreter = CountingInterpreter::new(probe.clone(), None);
        let mut worker = Worker {
            vm: LavVm::new(&config, Box::new(interpreter)).unwrap(),
            screen: ProbeScreen {
                probe: probe.clone(),
                width: config.screen.width,
                height: config.screen.height,
            },
            shared: Arc::new(Shared::new(config.debug.event_list_size)),
            config: config.driver,
        };
        worker.vm.console_mut().request_refresh(0x7f);

        probe.fail_lock.store(true, Ordering::SeqCst);
        assert!(matches!(worker.refresh_on_dirty(), Err(ScreenError::Lock(_))));
        assert!(worker.vm.console().is_dirty());

        probe.fail_lock.store(false, Ordering::SeqCst);
        worker.refresh_on_dirty().unwrap();
        assert!(!worker.vm.console().is_dirty());
        assert_eq!(probe.begins.load(Ordering::SeqCst), 1);
        assert_eq!(probe.rows_drawn.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exit_on_finish() {
        let probe = Arc::new(Probe::default());
        let mut config = test_config();
        config.driver.exit_on_finish = true;
        let driver = create_driver(CountingInterpreter::new(probe.clone(), Some(25)), &config);
        driver.open(app());

        assert!(driver.wait_for_exit(Duration::from_secs(5)));
        assert_eq!(driver.steps(), 25);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finished_program_idles() {
        let probe = Arc::new(Probe::default());
        let driver = create_driver(CountingInterpreter::new(probe.clone(), Some(5)), &test_config());
        driver.open(app());
        assert!(wait_until(Duration::from_secs(5), || driver.steps() == 5));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(driver.steps(), 5);
        assert_eq!(driver.state(), RunState::Running);
        assert!(!driver.wait_for_exit(Duration::from_millis(5)));
    }

    #[test]
    fn test_open_replaces_running_program() {
        let probe = Arc::new(Probe::default());
        let driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        driver.open(app());
        assert!(wait_until(Duration::from_secs(5), || driver.steps() > 0));

        driver.open(LavApp::new("second", vec![1]));
        assert!(wait_until(Duration::from_secs(5), || {
            probe.disposed.load(Ordering::SeqCst) == 1 && driver.state() == RunState::Running
        }));
        drop(driver);
        assert_eq!(probe.disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_refresh_balances_draw_context() {
        let probe = Arc::new(Probe::default());
        let mut driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        driver.open(app());
        assert!(wait_until(Duration::from_secs(5), || driver.steps() > 10));
        driver.shutdown();

        let begins = probe.begins.load(Ordering::SeqCst);
        assert!(begins > 0);
        assert_eq!(begins, probe.ends.load(Ordering::SeqCst));
        assert_eq!(begins, probe.changes.load(Ordering::SeqCst));
        assert!(probe.rows_drawn.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_resize_applies_in_worker() {
        let probe = Arc::new(Probe::default());
        let driver = create_driver(CountingInterpreter::new(probe.clone(), None), &test_config());
        driver.open(app());
        assert!(wait_until(Duration::from_secs(5), || driver.steps() > 0));
        assert_eq!(probe.max_col.load(Ordering::SeqCst), 20);

        driver.resize(240, 120);
        assert!(wait_until(Duration::from_secs(5), || {
            probe.max_col.load(Ordering::SeqCst) == 30
        }));
        assert_eq!(*probe.size.lock().unwrap(), (240, 120));
        assert_eq!(driver.state(), RunState::Running);
    }
}

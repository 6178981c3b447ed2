//! Lav 虚拟机运行时库
pub mod const_values;
pub mod driver;
pub mod player;
pub mod utils;
pub mod vm;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use lcd::Lcd;
use tracing::{info, warn};

use crate::const_values::VmConfig;
use crate::driver::ExecutionDriver;
use crate::player::TextPlayer;
use crate::vm::{LavApp, LavVm};

/// Lav 虚拟机
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Lav 程序路径
    #[arg(short, long)]
    pub app: String,

    /// 配置文件地址
    #[arg(short, long, default_value = "profile/config.toml")]
    pub config: String,

    /// 屏幕宽度 (像素), 覆盖配置文件
    #[arg(long)]
    pub width: Option<u32>,

    /// 屏幕高度 (像素), 覆盖配置文件
    #[arg(long)]
    pub height: Option<u32>,

    /// 程序结束后立即退出
    #[arg(short, long)]
    pub exit_on_finish: bool,

    /// 最长运行时间 (毫秒), 超时后终止
    #[arg(short, long, default_value = "5000")]
    pub timeout: u64,

    /// 退出后以十六进制打印文本缓冲区
    #[arg(long)]
    pub dump_text: bool,
}

impl Args {
    /// 读取配置文件并用命令行参数覆盖
    pub fn load_config(&self) -> Result<VmConfig> {
        let prj_base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let arg_cfg_path = PathBuf::from(&self.config);
        let config_path = if arg_cfg_path.is_absolute() {
            arg_cfg_path
        } else {
            prj_base.join(&self.config)
        };
        let mut config = VmConfig::new(config_path)?;
        if let Some(width) = self.width {
            config.screen.width = width;
        }
        if let Some(height) = self.height {
            config.screen.height = height;
        }
        if self.exit_on_finish {
            config.driver.exit_on_finish = true;
        }
        if config.screen.width == 0 || config.screen.height == 0 {
            bail!("屏幕尺寸无效: {}x{}", config.screen.width, config.screen.height);
        }
        Ok(config)
    }
}

pub fn build_vm_run_blocking(args: Args) -> Result<()> {
    let config = args.load_config()?;
    let app = LavApp::from_file(&args.app)?;

    // 创建虚拟机和显示目标
    let vm = LavVm::new(&config, Box::new(TextPlayer::new())).context("无法创建虚拟机")?;
    let lcd = Lcd::new("lcd".to_string(), config.screen.width, config.screen.height);
    let mut driver = ExecutionDriver::spawn(vm, lcd, &config)?;

    info!(path = %args.app, "加载程序");
    driver.open(app);

    if !driver.wait_for_exit(Duration::from_millis(args.timeout)) {
        warn!(timeout_ms = args.timeout, "运行超时, 终止执行");
    }
    for event in driver.events() {
        info!(?event, "驱动器事件");
    }
    let steps = driver.steps();
    let Some((vm, lcd)) = driver.shutdown() else {
        bail!("工作线程异常退出");
    };
    info!(steps, frames = lcd.frames_posted(), "执行结束");

    println!("{}", lcd.snapshot());
    if args.dump_text {
        let text = vm.text_bytes();
        let cols = vm.console().max_col().max(1);
        for (row, chunk) in text.chunks(cols).enumerate() {
            println!("{:04x}: {}", row * cols, hex::encode(chunk));
        }
    }

    Ok(())
}

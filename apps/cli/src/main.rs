//! # Rover CLI
//!
//! Command-line interface for driving a Freenove-style rover over TCP.
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于脚本）
//!
//! ```bash
//! # 配置默认地址
//! rover-cli config set --host 192.168.0.42 --port 5000
//!
//! # 执行操作（内部：连接 -> 发送 -> 断开）
//! rover-cli move w --duration-ms 1500
//! rover-cli send CMD_BUZZER#1
//! rover-cli monitor --duration 10
//! ```
//!
//! ### REPL 模式（推荐用于遥控）
//!
//! ```bash
//! $ rover-cli shell
//! rover> connect
//! rover> w
//! rover> x
//! rover> status
//! rover> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod modes;
mod output;

use commands::{ConfigCommand, MonitorCommand, MoveCommand, SendCommand};
use config::ConnectArgs;
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;

/// Rover CLI - 小车遥控命令行工具
#[derive(Parser, Debug)]
#[command(name = "rover-cli")]
#[command(about = "Command-line interface for driving a Freenove-style rover", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 <config_dir>/rover-link/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 发送原始文本
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// 按方向行驶一段时间
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 打印状态变化和遥测
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 启动交互式 Shell（REPL 模式）
    Shell {
        #[command(flatten)]
        connect: ConnectArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    rover_client::init_logging();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(config_path).await,

        Commands::Send { args } => {
            args.validate()?;
            let config = args.connect.resolve(config_path)?;
            OneShotMode::new(config).send(&args.message()).await
        },

        Commands::Move { args } => {
            args.intent()?;
            let duration = args.duration()?;
            let config = args.connect.resolve(config_path)?;
            OneShotMode::new(config).drive(args.direction, duration).await
        },

        Commands::Monitor { args } => {
            let config = args.connect.resolve(config_path)?;
            OneShotMode::new(config).monitor(args.duration()).await
        },

        Commands::Shell { connect } => {
            let config = connect.resolve(config_path)?;
            run_repl(config).await
        },
    }
}

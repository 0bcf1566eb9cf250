//! 配置管理命令
//!
//! 用于管理 CLI 配置（小车地址、标称速度、轮询开关）

use crate::config::{CliConfig, resolve_config_path};
use anyhow::{Context, Result};
use clap::Subcommand;
use rover_client::SessionConfig;
use std::path::Path;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 小车地址
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// 指令服务器端口
        #[arg(short, long)]
        port: Option<u16>,

        /// 标称速度（cm/s）
        #[arg(long)]
        speed: Option<f64>,

        /// 是否轮询超声波距离
        #[arg(long)]
        sonic: Option<bool>,

        /// 是否轮询温度
        #[arg(long)]
        temperature: Option<bool>,

        /// 是否轮询 CPU 负载
        #[arg(long)]
        cpu_load: Option<bool>,

        /// 是否扫描舵机
        #[arg(long)]
        servo_sweep: Option<bool>,
    },

    /// 显示当前配置
    Show,

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let path = resolve_config_path(config_path)?;

        match self {
            ConfigCommand::Set {
                host,
                port,
                speed,
                sonic,
                temperature,
                cpu_load,
                servo_sweep,
            } => {
                let mut config = CliConfig::load(&path)?;

                let session = SessionConfig::new(
                    host.unwrap_or_else(|| config.session.host().to_string()),
                    port.unwrap_or(config.session.port()),
                )
                .with_nominal_speed(speed.unwrap_or(config.session.nominal_speed_cm_per_sec()));
                session.validate().context("无效的配置值")?;
                config.session = session;

                if let Some(v) = sonic {
                    config.polling.sonic = v;
                }
                if let Some(v) = temperature {
                    config.polling.temperature = v;
                }
                if let Some(v) = cpu_load {
                    config.polling.cpu_load = v;
                }
                if let Some(v) = servo_sweep {
                    config.polling.servo_sweep = v;
                }

                config.save(&path)?;
                println!("✅ 配置已保存: {}", path.display());
                print_config(&config);
                Ok(())
            },

            ConfigCommand::Show => {
                let config = CliConfig::load(&path)?;
                print_config(&config);
                Ok(())
            },

            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }
}

fn print_config(config: &CliConfig) {
    println!("Rover CLI 配置:");
    println!("  地址: {}:{}", config.session.host(), config.session.port());
    println!("  标称速度: {} cm/s", config.session.nominal_speed_cm_per_sec());
    println!("  轮询:");
    println!("    sonic: {}", config.polling.sonic);
    println!("    temperature: {}", config.polling.temperature);
    println!("    cpu_load: {}", config.polling.cpu_load);
    println!("    servo_sweep: {}", config.polling.servo_sweep);
}

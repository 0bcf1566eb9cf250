//! CLI 配置
//!
//! 配置文件默认位于 `<config_dir>/rover-link/config.toml`，可用 `--config` 指定：
//!
//! ```toml
//! [session]
//! host = "192.168.0.42"
//! port = 5000
//! nominal_speed_cm_per_sec = 20.0
//!
//! [polling]
//! sonic = true
//! temperature = true
//! cpu_load = true
//! servo_sweep = true
//! ```
//!
//! 命令行参数优先于配置文件。

use anyhow::{Context, Result};
use clap::Args;
use rover_client::SessionConfig;
use rover_driver::PollingConfig;
use rover_driver::scheduler::{CPU_LOAD_TASK, SERVO_SWEEP_TASK, SONIC_TASK, TEMPERATURE_TASK};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("rover-link");
    path.push("config.toml");
    Ok(path)
}

/// 解析配置文件路径（`--config` 优先）
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// 轮询开关
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingOptions {
    pub sonic: bool,
    pub temperature: bool,
    pub cpu_load: bool,
    pub servo_sweep: bool,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            sonic: true,
            temperature: true,
            cpu_load: true,
            servo_sweep: true,
        }
    }
}

impl PollingOptions {
    /// 全部关闭
    pub fn none() -> Self {
        Self {
            sonic: false,
            temperature: false,
            cpu_load: false,
            servo_sweep: false,
        }
    }

    /// 转换为调度器任务集（从默认任务集中去掉关闭的任务）
    pub fn to_polling_config(&self) -> PollingConfig {
        let mut config = PollingConfig::default();
        for (enabled, name) in [
            (self.sonic, SONIC_TASK),
            (self.temperature, TEMPERATURE_TASK),
            (self.cpu_load, CPU_LOAD_TASK),
            (self.servo_sweep, SERVO_SWEEP_TASK),
        ] {
            if !enabled {
                config = config.without_task(name);
            }
        }
        config
    }
}

/// 配置文件内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub session: SessionConfig,
    pub polling: PollingOptions,
}

impl CliConfig {
    /// 加载配置（文件不存在时返回默认配置）
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        Ok(config)
    }

    /// 保存配置（自动创建目录）
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).context("创建配置目录失败")?;
            }
        }

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, format!("# Rover CLI Configuration\n\n{content}"))
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        Ok(())
    }
}

/// 连接参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// 小车地址
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// 指令服务器端口
    #[arg(short, long)]
    pub port: Option<u16>,

    /// 标称速度（cm/s），用于距离估算
    #[arg(long)]
    pub speed: Option<f64>,

    /// 关闭全部传感器轮询
    #[arg(long)]
    pub no_poll: bool,
}

impl ConnectArgs {
    /// 把命令行参数叠加到配置上
    pub fn apply(&self, mut config: CliConfig) -> CliConfig {
        let host = self
            .host
            .clone()
            .unwrap_or_else(|| config.session.host().to_string());
        let port = self.port.unwrap_or(config.session.port());
        let speed = self.speed.unwrap_or(config.session.nominal_speed_cm_per_sec());
        config.session = SessionConfig::new(host, port).with_nominal_speed(speed);

        if self.no_poll {
            config.polling = PollingOptions::none();
        }
        config
    }

    /// 加载配置文件并应用覆盖
    pub fn resolve(&self, config_path: Option<&Path>) -> Result<CliConfig> {
        let path = resolve_config_path(config_path)?;
        let config = self.apply(CliConfig::load(&path)?);
        config
            .session
            .validate()
            .with_context(|| format!("无效的连接配置: {}", path.display()))?;
        Ok(config)
    }
}

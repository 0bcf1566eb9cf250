//! 监控命令参数

use crate::config::ConnectArgs;
use clap::Args;
use std::time::Duration;

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 监控时长（秒），不指定则直到 Ctrl+C
    #[arg(short, long)]
    pub duration: Option<u64>,
}

impl MonitorCommand {
    pub fn duration(&self) -> Option<Duration> {
        self.duration.map(Duration::from_secs)
    }
}

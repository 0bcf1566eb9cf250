//! 移动命令
//!
//! 按方向行驶一段时间后自动停止，并输出估算的行驶距离。

use crate::config::ConnectArgs;
use anyhow::Result;
use clap::Args;
use rover_client::{MotionIntent, intent_for};
use std::time::Duration;

/// 单次移动的时长上限
const MAX_DURATION_MS: u64 = 60_000;

/// 移动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 方向：w 前进，s 后退，a 左转，d 右转
    pub direction: char,

    /// 持续时间（毫秒）
    #[arg(short, long, default_value_t = 1000)]
    pub duration_ms: u64,
}

impl MoveCommand {
    /// 解析方向（停止符号和未知符号都不接受）
    pub fn intent(&self) -> Result<MotionIntent> {
        match intent_for(self.direction) {
            Some(intent) if intent.is_directional() => Ok(intent),
            Some(_) => anyhow::bail!("'{}' 是停止符号，请使用 w/s/a/d", self.direction),
            None => anyhow::bail!("未知方向 '{}'，请使用 w/s/a/d", self.direction),
        }
    }

    pub fn duration(&self) -> Result<Duration> {
        if self.duration_ms == 0 || self.duration_ms > MAX_DURATION_MS {
            anyhow::bail!(
                "持续时间必须在 1..={} 毫秒之间，得到 {}",
                MAX_DURATION_MS,
                self.duration_ms
            );
        }
        Ok(Duration::from_millis(self.duration_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(direction: char, duration_ms: u64) -> MoveCommand {
        MoveCommand {
            connect: ConnectArgs::default(),
            direction,
            duration_ms,
        }
    }

    #[test]
    fn test_intent_parsing() {
        assert_eq!(command('w', 1000).intent().unwrap(), MotionIntent::Forward);
        assert_eq!(command('D', 1000).intent().unwrap(), MotionIntent::TurnRight);
        assert!(command('x', 1000).intent().is_err());
        assert!(command('q', 1000).intent().is_err());
    }

    #[test]
    fn test_duration_bounds() {
        assert_eq!(command('w', 250).duration().unwrap(), Duration::from_millis(250));
        assert!(command('w', 0).duration().is_err());
        assert!(command('w', MAX_DURATION_MS + 1).duration().is_err());
    }
}

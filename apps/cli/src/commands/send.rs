//! 发送原始文本命令

use crate::config::ConnectArgs;
use clap::Args;

/// 发送命令参数
#[derive(Args, Debug)]
pub struct SendCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 原始文本（多个参数以空格连接，例如 `CMD_BUZZER#1`）
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

impl SendCommand {
    /// 要发送的文本（去掉首尾空白）
    pub fn message(&self) -> String {
        self.text.join(" ").trim().to_string()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.message().is_empty() {
            anyhow::bail!("消息为空");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &[&str]) -> SendCommand {
        SendCommand {
            connect: ConnectArgs::default(),
            text: text.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_message_joins_words() {
        assert_eq!(command(&["CMD_SERVO#0#90"]).message(), "CMD_SERVO#0#90");
        assert_eq!(command(&[" hello", "rover "]).message(), "hello rover");
    }

    #[test]
    fn test_blank_message_rejected() {
        assert!(command(&["  "]).validate().is_err());
        assert!(command(&["CMD_SONIC"]).validate().is_ok());
    }
}

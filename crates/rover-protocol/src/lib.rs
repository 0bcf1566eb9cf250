//! # Rover Protocol
//!
//! 小车指令服务器的文本帧协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `command`: 下行指令帧构建（`CMD_<NAME>#f1#f2...\r\n`）
//! - `telemetry`: 上行遥测帧解析
//! - `motion`: 运动意图与电机向量
//! - `framing`: 字节流按行切分
//!
//! ## 帧格式
//!
//! ```text
//! 下行: CMD_M_MOTOR#0#800#0#0\r\n
//! 上行: CMD_TEMPERATURE#36.7\n
//! ```
//!
//! 字段以 `#` 分隔，帧以换行结束。下行统一追加 `\r\n`，
//! 上行兼容 `\n` 与 `\r\n` 两种结尾。

pub mod command;
pub mod framing;
pub mod motion;
pub mod telemetry;

// 重新导出常用类型
pub use command::{Command, FIELD_SEPARATOR, FRAME_TERMINATOR, OutboundFrame, encode};
pub use framing::LineFramer;
pub use motion::{MAXIMUM_SPEED, MotionIntent, MotorVector, STALL_SPEED};
pub use telemetry::{TelemetryEvent, TelemetryKind, decode, decode_bytes, try_decode};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 帧可识别但内容无法解析（字段缺失或非数字）
    #[error("Malformed frame {frame:?}: {reason}")]
    MalformedFrame { frame: String, reason: String },

    /// 单行长度超过上限
    #[error("Line too long: {len} bytes (limit {limit})")]
    LineTooLong { len: usize, limit: usize },
}

impl ProtocolError {
    pub(crate) fn malformed(frame: &str, reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            frame: frame.to_string(),
            reason: reason.into(),
        }
    }
}

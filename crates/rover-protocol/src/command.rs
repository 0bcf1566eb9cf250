//! 下行指令帧
//!
//! 所有指令都序列化为 `CMD_<NAME>#field1#field2#...\r\n`。
//! 构建后不可变，字段个数由调用方负责。

use crate::motion::MotorVector;
use bytes::Bytes;
use std::fmt;

/// 指令前缀
pub const COMMAND_PREFIX: &str = "CMD_";

/// 字段分隔符
pub const FIELD_SEPARATOR: char = '#';

/// 帧结束符（下行）
pub const FRAME_TERMINATOR: &str = "\r\n";

/// 指令名（不含 `CMD_` 前缀）
pub mod names {
    pub const MOTOR: &str = "M_MOTOR";
    pub const SONIC: &str = "SONIC";
    pub const TEMPERATURE: &str = "TEMPERATURE";
    pub const CPU_LOAD: &str = "CPU_LOAD";
    pub const SERVO: &str = "SERVO";
}

/// 下行指令
///
/// # 示例
///
/// ```rust
/// use rover_protocol::Command;
///
/// let cmd = Command::servo(0, 45);
/// assert_eq!(cmd.to_string(), "CMD_SERVO#0#45");
/// assert_eq!(cmd.to_wire(), "CMD_SERVO#0#45\r\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    name: String,
    fields: Vec<String>,
}

/// 通用编码入口
///
/// 不校验字段数量，总是成功。
pub fn encode<I, F>(name: impl Into<String>, fields: I) -> Command
where
    I: IntoIterator<Item = F>,
    F: ToString,
{
    Command {
        name: name.into(),
        fields: fields.into_iter().map(|f| f.to_string()).collect(),
    }
}

impl Command {
    /// 无字段指令
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// 麦克纳姆轮极坐标指令 `CMD_M_MOTOR#<fa>#<fs>#<ta>#<ts>`
    pub fn motor(vector: MotorVector) -> Self {
        encode(
            names::MOTOR,
            [
                vector.forward_angle,
                vector.forward_speed,
                vector.turn_angle,
                vector.turn_speed,
            ],
        )
    }

    /// 超声波测距请求
    pub fn sonic() -> Self {
        Self::bare(names::SONIC)
    }

    /// 温度请求
    pub fn temperature() -> Self {
        Self::bare(names::TEMPERATURE)
    }

    /// CPU 负载请求
    pub fn cpu_load() -> Self {
        Self::bare(names::CPU_LOAD)
    }

    /// 舵机角度指令 `CMD_SERVO#<channel>#<angle>`
    pub fn servo(channel: u8, angle_deg: i32) -> Self {
        encode(names::SERVO, [channel as i32, angle_deg])
    }

    /// 指令名（不含前缀）
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 字段列表
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// 带结束符的完整帧
    pub fn to_wire(&self) -> String {
        let mut out = self.to_string();
        out.push_str(FRAME_TERMINATOR);
        out
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{COMMAND_PREFIX}{}", self.name)?;
        for field in &self.fields {
            write!(f, "{FIELD_SEPARATOR}{field}")?;
        }
        Ok(())
    }
}

/// 待写入传输层的一帧
///
/// 编码指令和手动原始文本都走同一条发送路径，原始文本不经过编码器，
/// 仅追加帧结束符。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// 编码后的指令
    Command(Command),
    /// 调用方提供的原始文本（诊断/手动消息）
    Raw(String),
}

impl OutboundFrame {
    /// 序列化为线上字节（一次原子写入）
    pub fn to_bytes(&self) -> Bytes {
        match self {
            OutboundFrame::Command(cmd) => Bytes::from(cmd.to_wire()),
            OutboundFrame::Raw(text) => {
                let mut out = String::with_capacity(text.len() + FRAME_TERMINATOR.len());
                out.push_str(text);
                out.push_str(FRAME_TERMINATOR);
                Bytes::from(out)
            },
        }
    }
}

impl From<Command> for OutboundFrame {
    fn from(cmd: Command) -> Self {
        OutboundFrame::Command(cmd)
    }
}

impl fmt::Display for OutboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutboundFrame::Command(cmd) => cmd.fmt(f),
            OutboundFrame::Raw(text) => f.write_str(text),
        }
    }
}

//! 上行遥测帧解析
//!
//! 解码表（按前缀匹配，依次检查）：
//!
//! | 前缀 | 字段 | 事件 |
//! |------|------|------|
//! | `CMD_MODE` | 第 3 个 `#` 字段 | `Distance` |
//! | `CMD_TEMPERATURE` | 第 2 个字段 | `Temperature` |
//! | `CMD_CPU_LOAD` | 第 2 个字段 | `CpuLoad` |
//!
//! 服务器实际发送的是 `CMD_MODED#3#<dist>`，因此按前缀而不是按完整标签匹配。
//! 其他前缀一律视为不可识别，静默丢弃。

use crate::ProtocolError;
use crate::command::FIELD_SEPARATOR;
use tracing::warn;

const DISTANCE_PREFIX: &str = "CMD_MODE";
const TEMPERATURE_PREFIX: &str = "CMD_TEMPERATURE";
const CPU_LOAD_PREFIX: &str = "CMD_CPU_LOAD";

/// 遥测事件
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TelemetryEvent {
    /// 障碍物距离（cm）
    Distance(f64),
    /// 温度（摄氏度）
    Temperature(f64),
    /// CPU 负载（%）
    CpuLoad(f64),
}

/// 遥测通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
    Distance,
    Temperature,
    CpuLoad,
}

impl TelemetryEvent {
    /// 事件所属通道
    pub fn kind(&self) -> TelemetryKind {
        match self {
            TelemetryEvent::Distance(_) => TelemetryKind::Distance,
            TelemetryEvent::Temperature(_) => TelemetryKind::Temperature,
            TelemetryEvent::CpuLoad(_) => TelemetryKind::CpuLoad,
        }
    }

    /// 数值
    pub fn value(&self) -> f64 {
        match *self {
            TelemetryEvent::Distance(v)
            | TelemetryEvent::Temperature(v)
            | TelemetryEvent::CpuLoad(v) => v,
        }
    }
}

/// 解码一帧，返回可区分的错误原因
///
/// - `Ok(Some(_))`: 识别并成功解析
/// - `Ok(None)`: 前缀不可识别（或空帧）
/// - `Err(MalformedFrame)`: 前缀可识别但字段缺失/非数字
pub fn try_decode(raw: &str) -> Result<Option<TelemetryEvent>, ProtocolError> {
    let frame = raw.trim();
    if frame.is_empty() {
        return Ok(None);
    }

    let (field_index, ctor): (usize, fn(f64) -> TelemetryEvent) =
        if frame.starts_with(DISTANCE_PREFIX) {
            (2, TelemetryEvent::Distance)
        } else if frame.starts_with(TEMPERATURE_PREFIX) {
            (1, TelemetryEvent::Temperature)
        } else if frame.starts_with(CPU_LOAD_PREFIX) {
            (1, TelemetryEvent::CpuLoad)
        } else {
            return Ok(None);
        };

    let field = frame
        .split(FIELD_SEPARATOR)
        .nth(field_index)
        .ok_or_else(|| ProtocolError::malformed(frame, format!("missing field {}", field_index + 1)))?;

    let value = parse_float_prefix(field.trim())
        .ok_or_else(|| ProtocolError::malformed(frame, format!("non-numeric field {field:?}")))?;

    Ok(Some(ctor(value)))
}

/// 解码一帧（全函数，永不 panic）
///
/// 格式错误的帧记录 `warn` 日志并返回 `None`。
///
/// ```rust
/// use rover_protocol::{decode, TelemetryEvent};
///
/// assert_eq!(decode("CMD_MODE#x#12.5#y"), Some(TelemetryEvent::Distance(12.5)));
/// assert_eq!(decode("CMD_MODE#bad"), None);
/// ```
pub fn decode(raw: &str) -> Option<TelemetryEvent> {
    match try_decode(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            None
        },
    }
}

/// 解码任意字节（非 UTF-8 字节按替换字符处理）
pub fn decode_bytes(raw: &[u8]) -> Option<TelemetryEvent> {
    decode(&String::from_utf8_lossy(raw))
}

/// 解析字段开头的浮点数
///
/// 与 JavaScript `parseFloat` 一致：取最长的合法数字前缀（`"12.5cm"` → 12.5）。
/// 结果必须是有限值。
fn parse_float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }
    // 指数部分（可选，必须完整才接受）
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

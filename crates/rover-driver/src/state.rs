//! 连接状态与遥测快照
//!
//! - `ConnectionState`：连接状态机，以 `u8` 存放在原子变量中，任意线程无锁读取
//! - `TelemetrySnapshot`：各通道最新值，由 IO 线程通过 `ArcSwap` 发布

use num_enum::{IntoPrimitive, TryFromPrimitive};
use rover_protocol::{TelemetryEvent, TelemetryKind};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// 连接状态
///
/// ```text
/// Disconnected --open--> Connecting --ok--> Connected --EOF--> Disconnected
///                             |                 |
///                             +--err--> Failed <+--read/write err
///                                         |
///                                         +--close--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Failed = 3,
}

impl ConnectionState {
    /// 从 u8 转换
    ///
    /// 无效值视为 Disconnected。
    pub fn from_u8(value: u8) -> Self {
        Self::try_from(value).unwrap_or(Self::Disconnected)
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self.into()
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// 显示用标签
    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 连接状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    /// 获取当前状态
    pub fn get(&self, ordering: Ordering) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(ordering))
    }

    /// 设置新状态，返回旧状态
    pub fn swap(&self, state: ConnectionState, ordering: Ordering) -> ConnectionState {
        ConnectionState::from_u8(self.inner.swap(state.as_u8(), ordering))
    }

    /// 比较并交换
    ///
    /// 当前值等于 `current` 时设置为 `new` 并返回 true。
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
        success: Ordering,
        failure: Ordering,
    ) -> bool {
        self.inner
            .compare_exchange(current.as_u8(), new.as_u8(), success, failure)
            .is_ok()
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

/// 单个通道的读数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    /// 收到该帧的时刻
    pub received_at: Instant,
}

/// 遥测快照（各通道最新值，不保留历史）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    /// 障碍物距离（cm）
    pub distance_cm: Option<Reading>,
    /// 温度（摄氏度）
    pub temperature_c: Option<Reading>,
    /// CPU 负载（%）
    pub cpu_load_pct: Option<Reading>,
}

impl TelemetrySnapshot {
    /// 返回更新了一个通道后的新快照
    pub fn with_event(&self, event: TelemetryEvent, received_at: Instant) -> Self {
        let mut next = self.clone();
        let reading = Some(Reading {
            value: event.value(),
            received_at,
        });
        match event.kind() {
            TelemetryKind::Distance => next.distance_cm = reading,
            TelemetryKind::Temperature => next.temperature_c = reading,
            TelemetryKind::CpuLoad => next.cpu_load_pct = reading,
        }
        next
    }

    /// 指定通道的最新值
    pub fn latest(&self, kind: TelemetryKind) -> Option<f64> {
        let reading = match kind {
            TelemetryKind::Distance => self.distance_cm,
            TelemetryKind::Temperature => self.temperature_c,
            TelemetryKind::CpuLoad => self.cpu_load_pct,
        };
        reading.map(|r| r.value)
    }

    pub fn is_empty(&self) -> bool {
        self.distance_cm.is_none() && self.temperature_c.is_none() && self.cpu_load_pct.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_conversions() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Failed,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ConnectionState::from_u8(200), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_atomic_state() {
        let state = AtomicConnectionState::default();
        assert_eq!(state.get(Ordering::Relaxed), ConnectionState::Disconnected);

        let prev = state.swap(ConnectionState::Connecting, Ordering::AcqRel);
        assert_eq!(prev, ConnectionState::Disconnected);

        assert!(!state.compare_exchange(
            ConnectionState::Connected,
            ConnectionState::Failed,
            Ordering::AcqRel,
            Ordering::Acquire
        ));
        assert!(state.compare_exchange(
            ConnectionState::Connecting,
            ConnectionState::Connected,
            Ordering::AcqRel,
            Ordering::Acquire
        ));
        assert!(state.get(Ordering::Acquire).is_connected());
    }

    #[test]
    fn test_snapshot_keeps_latest_only() {
        let now = Instant::now();
        let snap = TelemetrySnapshot::default();
        assert!(snap.is_empty());

        let snap = snap.with_event(TelemetryEvent::Temperature(36.7), now);
        let snap = snap.with_event(TelemetryEvent::Temperature(37.1), now);
        let snap = snap.with_event(TelemetryEvent::Distance(12.5), now);

        assert_eq!(snap.latest(TelemetryKind::Temperature), Some(37.1));
        assert_eq!(snap.latest(TelemetryKind::Distance), Some(12.5));
        assert_eq!(snap.latest(TelemetryKind::CpuLoad), None);
    }
}

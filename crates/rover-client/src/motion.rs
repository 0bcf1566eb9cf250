//! 运动输入与距离估算
//!
//! - `intent_for` / `intent_for_key_code`: 输入符号到运动意图的纯映射
//! - `command_for`: 运动意图到电机指令
//! - `MotionTracker`: 按下方向键开始计时，停止时以标称速度积分出累计距离
//!
//! 距离模型是粗略的：前进、后退和转向都按同一个标称速度计算。

use crate::clock::Clock;
use parking_lot::Mutex;
use rover_protocol::{Command, MotionIntent};
use std::sync::Arc;
use tracing::debug;

/// 浏览器键码（W/S/A/D）
pub mod key_codes {
    pub const W: u32 = 87;
    pub const S: u32 = 83;
    pub const A: u32 = 65;
    pub const D: u32 = 68;
}

/// 输入符号映射
///
/// | 符号 | 意图 |
/// |------|------|
/// | `w` `W` `↑` | Forward |
/// | `s` `S` `↓` | Backward |
/// | `a` `A` `←` | TurnLeft |
/// | `d` `D` `→` | TurnRight |
/// | `x` `X` 空格 | Stop |
pub fn intent_for(symbol: char) -> Option<MotionIntent> {
    match symbol {
        'w' | 'W' | '↑' => Some(MotionIntent::Forward),
        's' | 'S' | '↓' => Some(MotionIntent::Backward),
        'a' | 'A' | '←' => Some(MotionIntent::TurnLeft),
        'd' | 'D' | '→' => Some(MotionIntent::TurnRight),
        'x' | 'X' | ' ' => Some(MotionIntent::Stop),
        _ => None,
    }
}

/// 键码映射
pub fn intent_for_key_code(code: u32) -> Option<MotionIntent> {
    match code {
        key_codes::W => Some(MotionIntent::Forward),
        key_codes::S => Some(MotionIntent::Backward),
        key_codes::A => Some(MotionIntent::TurnLeft),
        key_codes::D => Some(MotionIntent::TurnRight),
        _ => None,
    }
}

/// 运动意图对应的电机指令
pub fn command_for(intent: MotionIntent) -> Command {
    Command::motor(intent.vector())
}

#[derive(Debug, Default)]
struct MovementTimer {
    active: bool,
    started_at_ms: Option<u64>,
    accumulated_distance_cm: f64,
}

/// 运动计时器
///
/// # 示例
///
/// ```rust
/// use rover_client::clock::ManualClock;
/// use rover_client::MotionTracker;
/// use std::sync::Arc;
///
/// let clock = Arc::new(ManualClock::new(0));
/// let tracker = MotionTracker::new(20.0, clock.clone());
///
/// tracker.begin_movement();
/// clock.advance_ms(2_500);
/// assert_eq!(tracker.end_movement(), 50.0);
/// ```
pub struct MotionTracker {
    nominal_speed_cm_per_sec: f64,
    clock: Arc<dyn Clock>,
    timer: Mutex<MovementTimer>,
}

impl MotionTracker {
    pub fn new(nominal_speed_cm_per_sec: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            nominal_speed_cm_per_sec,
            clock,
            timer: Mutex::new(MovementTimer::default()),
        }
    }

    /// 开始计时（已在计时时无操作）
    ///
    /// 返回是否新开始了一段运动。
    pub fn begin_movement(&self) -> bool {
        let mut timer = self.timer.lock();
        if timer.active {
            return false;
        }
        timer.active = true;
        timer.started_at_ms = Some(self.clock.now_ms());
        true
    }

    /// 结束计时并返回累计距离（cm）
    ///
    /// 未在计时时直接返回当前累计值。
    pub fn end_movement(&self) -> f64 {
        let mut timer = self.timer.lock();
        if !timer.active {
            return timer.accumulated_distance_cm;
        }

        let now = self.clock.now_ms();
        let elapsed_ms = timer
            .started_at_ms
            .map(|start| now.saturating_sub(start))
            .unwrap_or(0);
        let segment = self.nominal_speed_cm_per_sec * (elapsed_ms as f64 / 1000.0);
        timer.accumulated_distance_cm += segment;
        timer.active = false;
        timer.started_at_ms = None;

        debug!(
            "Movement ended after {} ms: +{:.2} cm, total {:.2} cm",
            elapsed_ms, segment, timer.accumulated_distance_cm
        );
        timer.accumulated_distance_cm
    }

    pub fn is_active(&self) -> bool {
        self.timer.lock().active
    }

    /// 累计距离（cm，不含进行中的这一段）
    pub fn total_distance_cm(&self) -> f64 {
        self.timer.lock().accumulated_distance_cm
    }

    pub fn nominal_speed_cm_per_sec(&self) -> f64 {
        self.nominal_speed_cm_per_sec
    }
}

impl std::fmt::Debug for MotionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionTracker")
            .field("nominal_speed_cm_per_sec", &self.nominal_speed_cm_per_sec)
            .field("timer", &*self.timer.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn tracker() -> (MotionTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        (MotionTracker::new(20.0, clock.clone()), clock)
    }

    #[test]
    fn test_intent_for_symbols() {
        assert_eq!(intent_for('w'), Some(MotionIntent::Forward));
        assert_eq!(intent_for('W'), Some(MotionIntent::Forward));
        assert_eq!(intent_for('S'), Some(MotionIntent::Backward));
        assert_eq!(intent_for('a'), Some(MotionIntent::TurnLeft));
        assert_eq!(intent_for('D'), Some(MotionIntent::TurnRight));
        assert_eq!(intent_for(' '), Some(MotionIntent::Stop));
        assert_eq!(intent_for('q'), None);
        assert_eq!(intent_for('1'), None);
    }

    #[test]
    fn test_intent_for_key_codes() {
        assert_eq!(intent_for_key_code(87), Some(MotionIntent::Forward));
        assert_eq!(intent_for_key_code(83), Some(MotionIntent::Backward));
        assert_eq!(intent_for_key_code(65), Some(MotionIntent::TurnLeft));
        assert_eq!(intent_for_key_code(68), Some(MotionIntent::TurnRight));
        assert_eq!(intent_for_key_code(32), None);
    }

    #[test]
    fn test_command_for_each_intent() {
        assert_eq!(command_for(MotionIntent::Forward).to_string(), "CMD_M_MOTOR#0#800#0#0");
        assert_eq!(command_for(MotionIntent::Backward).to_string(), "CMD_M_MOTOR#180#800#0#0");
        assert_eq!(command_for(MotionIntent::TurnLeft).to_string(), "CMD_M_MOTOR#0#0#90#800");
        assert_eq!(command_for(MotionIntent::TurnRight).to_string(), "CMD_M_MOTOR#0#0#-90#800");
        assert_eq!(command_for(MotionIntent::Stop).to_string(), "CMD_M_MOTOR#0#0#0#0");
    }

    #[test]
    fn test_distance_accumulates() {
        let (tracker, clock) = tracker();

        assert!(tracker.begin_movement());
        clock.advance_ms(2_500);
        assert_eq!(tracker.end_movement(), 50.0);

        assert!(tracker.begin_movement());
        clock.advance_ms(1_000);
        assert_eq!(tracker.end_movement(), 70.0);
        assert_eq!(tracker.total_distance_cm(), 70.0);
    }

    #[test]
    fn test_repeated_begin_keeps_first_start() {
        let (tracker, clock) = tracker();
        tracker.begin_movement();
        clock.advance_ms(500);
        assert!(!tracker.begin_movement());
        clock.advance_ms(500);
        assert_eq!(tracker.end_movement(), 20.0);
    }

    #[test]
    fn test_end_without_begin_returns_total() {
        let (tracker, _clock) = tracker();
        assert_eq!(tracker.end_movement(), 0.0);
        assert!(!tracker.is_active());
    }

    #[test]
    fn test_clock_anomaly_contributes_zero() {
        let (tracker, clock) = tracker();
        tracker.begin_movement();
        clock.set_ms(5_000);
        assert_eq!(tracker.end_movement(), 0.0);
    }
}

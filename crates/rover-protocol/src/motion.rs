//! 运动意图与电机向量
//!
//! 服务器端按极坐标解释 `CMD_M_MOTOR`：
//! `[前进方向角, 前进速度, 转向角, 转向速度]`，速度范围 0..=800。

use crate::command::Command;

/// 最大速度
pub const MAXIMUM_SPEED: i32 = 800;

/// 停转速度
pub const STALL_SPEED: i32 = 0;

/// 电机极坐标向量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorVector {
    /// 前进方向角（度）
    pub forward_angle: i32,
    /// 前进速度（0..=800）
    pub forward_speed: i32,
    /// 转向角（度）
    pub turn_angle: i32,
    /// 转向速度（0..=800）
    pub turn_speed: i32,
}

impl MotorVector {
    /// 全零向量（停车）
    pub const STOP: Self = Self {
        forward_angle: 0,
        forward_speed: STALL_SPEED,
        turn_angle: 0,
        turn_speed: STALL_SPEED,
    };

    /// 创建向量，速度会被限制在 `STALL_SPEED..=MAXIMUM_SPEED`
    pub fn new(forward_angle: i32, forward_speed: i32, turn_angle: i32, turn_speed: i32) -> Self {
        Self {
            forward_angle,
            forward_speed: forward_speed.clamp(STALL_SPEED, MAXIMUM_SPEED),
            turn_angle,
            turn_speed: turn_speed.clamp(STALL_SPEED, MAXIMUM_SPEED),
        }
    }

    /// 是否为停车向量
    pub fn is_stop(&self) -> bool {
        self.forward_speed == STALL_SPEED && self.turn_speed == STALL_SPEED
    }
}

/// 运动意图
///
/// 每个意图确定性地映射到一个 [`MotorVector`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MotionIntent {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Stop,
}

impl MotionIntent {
    /// 全部意图（用于穷举测试和帮助信息）
    pub const ALL: [MotionIntent; 5] = [
        MotionIntent::Forward,
        MotionIntent::Backward,
        MotionIntent::TurnLeft,
        MotionIntent::TurnRight,
        MotionIntent::Stop,
    ];

    /// 对应的电机向量
    pub fn vector(self) -> MotorVector {
        match self {
            MotionIntent::Forward => MotorVector::new(0, MAXIMUM_SPEED, 0, STALL_SPEED),
            MotionIntent::Backward => MotorVector::new(180, MAXIMUM_SPEED, 0, STALL_SPEED),
            MotionIntent::TurnLeft => MotorVector::new(0, STALL_SPEED, 90, MAXIMUM_SPEED),
            MotionIntent::TurnRight => MotorVector::new(0, STALL_SPEED, -90, MAXIMUM_SPEED),
            MotionIntent::Stop => MotorVector::STOP,
        }
    }

    /// 是否为方向性意图（会开始计时）
    pub fn is_directional(self) -> bool {
        !matches!(self, MotionIntent::Stop)
    }

    /// 人类可读名称
    pub fn label(self) -> &'static str {
        match self {
            MotionIntent::Forward => "Forward",
            MotionIntent::Backward => "Backward",
            MotionIntent::TurnLeft => "Left",
            MotionIntent::TurnRight => "Right",
            MotionIntent::Stop => "Stopped",
        }
    }
}

impl From<MotionIntent> for Command {
    fn from(intent: MotionIntent) -> Self {
        Command::motor(intent.vector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_vectors() {
        assert_eq!(
            Command::from(MotionIntent::Forward).to_string(),
            "CMD_M_MOTOR#0#800#0#0"
        );
        assert_eq!(
            Command::from(MotionIntent::Backward).to_string(),
            "CMD_M_MOTOR#180#800#0#0"
        );
        assert_eq!(
            Command::from(MotionIntent::TurnLeft).to_string(),
            "CMD_M_MOTOR#0#0#90#800"
        );
        assert_eq!(
            Command::from(MotionIntent::TurnRight).to_string(),
            "CMD_M_MOTOR#0#0#-90#800"
        );
        assert_eq!(
            Command::from(MotionIntent::Stop).to_string(),
            "CMD_M_MOTOR#0#0#0#0"
        );
    }

    #[test]
    fn test_speed_clamped() {
        let v = MotorVector::new(0, 1200, 0, -5);
        assert_eq!(v.forward_speed, MAXIMUM_SPEED);
        assert_eq!(v.turn_speed, STALL_SPEED);
    }

    #[test]
    fn test_only_stop_is_non_directional() {
        for intent in MotionIntent::ALL {
            assert_eq!(intent.is_directional(), intent != MotionIntent::Stop);
            assert_eq!(intent.vector().is_stop(), intent == MotionIntent::Stop);
        }
    }
}

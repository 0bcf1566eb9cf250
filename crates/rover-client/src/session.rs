//! 会话门面
//!
//! `Session` 把连接管理器和运动计时器组合在一起，是外部（命令行、界面）唯一需要接触的对象：
//!
//! - 输入：移动、停止、原始文本
//! - 输出：状态变化、遥测、运动结束事件（`subscribe` / `add_callback`）

use crate::config::SessionConfig;
use crate::motion::{MotionTracker, command_for, intent_for, intent_for_key_code};
use crossbeam_channel::Receiver;
use rover_driver::{
    ConnectionManager, ConnectionState, Connector, DriverError, EventCallback, LinkEvent,
    MetricsSnapshot, TelemetrySnapshot,
};
use rover_protocol::{Command, MotionIntent};
use std::sync::Arc;
use tracing::{debug, info};

/// 停止操作的结果
#[derive(Debug, Clone, PartialEq)]
pub struct StopReport {
    /// 累计距离（cm）
    pub total_distance_cm: f64,
    /// 本段运动的距离（cm），之前未在运动时为 0
    pub segment_distance_cm: f64,
    /// 停止指令的发送结果
    pub send_result: Result<(), DriverError>,
}

/// 会话
///
/// 通过 [`SessionBuilder`](crate::SessionBuilder) 创建。
pub struct Session<C: Connector> {
    config: SessionConfig,
    link: ConnectionManager<C>,
    motion: MotionTracker,
}

impl<C: Connector> Session<C> {
    pub(crate) fn from_parts(
        config: SessionConfig,
        link: ConnectionManager<C>,
        motion: MotionTracker,
    ) -> Self {
        Self {
            config,
            link,
            motion,
        }
    }

    /// 连接到配置中的地址
    pub fn open(&self) -> Result<(), DriverError> {
        self.link.open(&self.config.endpoint())
    }

    /// 断开连接（幂等）
    pub fn close(&self) {
        self.link.close();
    }

    /// 处理移动输入
    ///
    /// - 不可识别的符号：返回 `Ok(None)`，不发送
    /// - 停止符号：等同于 [`handle_stop_input`](Self::handle_stop_input)
    /// - 方向符号：开始计时，然后发送电机指令
    ///
    /// 即使发送失败（例如未连接）计时也已经开始。
    pub fn handle_move_input(&self, symbol: char) -> Result<Option<MotionIntent>, DriverError> {
        match intent_for(symbol) {
            Some(intent) => self.apply_intent(intent).map(Some),
            None => {
                debug!("Ignoring input symbol {:?}", symbol);
                Ok(None)
            },
        }
    }

    /// 处理浏览器键码（W/S/A/D）
    pub fn handle_key_code(&self, code: u32) -> Result<Option<MotionIntent>, DriverError> {
        match intent_for_key_code(code) {
            Some(intent) => self.apply_intent(intent).map(Some),
            None => Ok(None),
        }
    }

    fn apply_intent(&self, intent: MotionIntent) -> Result<MotionIntent, DriverError> {
        if !intent.is_directional() {
            return self.handle_stop_input().send_result.map(|()| intent);
        }
        if self.motion.begin_movement() {
            debug!("Movement started: {}", intent.label());
        }
        self.link.send(&command_for(intent))?;
        Ok(intent)
    }

    /// 处理停止输入
    ///
    /// 先结束计时（累计距离通过 `MovementEnded` 事件发布），再发送全零电机指令。
    pub fn handle_stop_input(&self) -> StopReport {
        let before = self.motion.total_distance_cm();
        let total = self.motion.end_movement();
        self.link.emit(LinkEvent::MovementEnded {
            total_distance_cm: total,
        });

        let send_result = self.link.send(&command_for(MotionIntent::Stop));
        StopReport {
            total_distance_cm: total,
            segment_distance_cm: total - before,
            send_result,
        }
    }

    /// 发送原始文本（不经过编码器）
    ///
    /// 文本首尾空白被去掉；空文本不发送。
    pub fn send_raw(&self, text: &str) -> Result<(), DriverError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        info!("Sending manual message: {}", text);
        self.link.send_raw(text)
    }

    /// 发送编码指令
    pub fn send(&self, command: &Command) -> Result<(), DriverError> {
        self.link.send(command)
    }

    /// 订阅事件
    pub fn subscribe(&self) -> Receiver<LinkEvent> {
        self.link.subscribe()
    }

    /// 注册事件回调（在 IO 线程上调用，必须非阻塞）
    pub fn add_callback(&self, callback: Arc<dyn EventCallback>) {
        self.link.add_callback(callback);
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        self.link.telemetry()
    }

    pub fn total_distance_cm(&self) -> f64 {
        self.motion.total_distance_cm()
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_active()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.link.metrics()
    }

    /// 清零收发指标
    pub fn reset_metrics(&self) {
        self.link.reset_metrics();
    }

    pub fn last_error(&self) -> Option<String> {
        self.link.last_error()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// 底层连接管理器
    pub fn link(&self) -> &ConnectionManager<C> {
        &self.link
    }
}

impl<C: Connector> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("link", &self.link)
            .field("motion", &self.motion)
            .finish()
    }
}

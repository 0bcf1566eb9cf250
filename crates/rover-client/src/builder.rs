//! Builder 模式实现
//!
//! 提供链式构造 `Session` 的便捷方式。

use crate::clock::{Clock, MonotonicClock};
use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::motion::MotionTracker;
use crate::session::Session;
use rover_driver::{ConnectionManager, Connector, PipelineConfig, PollingConfig};
use std::sync::Arc;

/// Session Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use rover_client::{SessionBuilder, SessionConfig};
/// use rover_driver::scheduler::SERVO_SWEEP_TASK;
/// use rover_driver::PollingConfig;
///
/// let session = SessionBuilder::new()
///     .config(SessionConfig::new("10.0.0.5", 5000))
///     .polling(PollingConfig::default().without_task(SERVO_SWEEP_TASK))
///     .build()
///     .unwrap();
/// session.open().unwrap();
/// ```
pub struct SessionBuilder {
    config: SessionConfig,
    polling: PollingConfig,
    pipeline: PipelineConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            polling: PollingConfig::default(),
            pipeline: PipelineConfig::default(),
            clock: None,
        }
    }

    /// 设置会话配置（地址、标称速度）
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置轮询任务集
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// 设置 Pipeline 配置（超时、缓冲区）
    pub fn pipeline_config(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// 设置时间源（默认 `MonotonicClock`）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 使用指定的连接器构建
    pub fn build_with<C: Connector>(self, connector: C) -> Result<Session<C>, ClientError> {
        self.config.validate()?;
        let link = ConnectionManager::new(connector, self.polling, self.pipeline)?;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(MonotonicClock),
        };
        let motion = MotionTracker::new(self.config.nominal_speed_cm_per_sec(), clock);
        Ok(Session::from_parts(self.config, link, motion))
    }

    /// 使用 TCP 连接器构建
    #[cfg(feature = "tcp")]
    pub fn build(self) -> Result<Session<rover_transport::TcpConnector>, ClientError> {
        self.build_with(rover_transport::TcpConnector::new())
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

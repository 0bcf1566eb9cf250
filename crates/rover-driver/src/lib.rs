//! # Rover Driver
//!
//! 连接管理层：连接状态机、IO 线程、传感器轮询、事件分发。
//!
//! ## 模块
//!
//! - `link`: `ConnectionManager`，对外 API
//! - `pipeline`: IO 循环与共享上下文
//! - `scheduler`: 轮询调度器
//! - `state`: 连接状态与遥测快照
//! - `hooks`: 事件回调与订阅
//! - `metrics`: 链路指标

pub mod error;
pub mod hooks;
pub mod link;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod state;

pub use error::DriverError;
pub use hooks::{EventCallback, HookManager, LinkEvent};
pub use link::ConnectionManager;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use pipeline::PipelineConfig;
pub use scheduler::{PollKind, PollTask, PollingConfig, PollingScheduler, ServoSweep};
pub use state::{ConnectionState, Reading, TelemetrySnapshot};

pub use rover_transport::{Connector, Endpoint};

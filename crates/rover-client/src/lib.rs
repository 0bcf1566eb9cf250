//! # Rover Client
//!
//! 面向应用的会话接口：把按键输入变成电机指令，估算行驶距离，转发遥测事件。
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use rover_client::{SessionBuilder, SessionConfig};
//!
//! rover_client::init_logging();
//!
//! let session = SessionBuilder::new()
//!     .config(SessionConfig::new("192.168.0.42", 5000))
//!     .build()
//!     .unwrap();
//! let events = session.subscribe();
//!
//! session.open().unwrap();
//! session.handle_move_input('w').unwrap();
//! let report = session.handle_stop_input();
//! println!("total: {:.1} cm", report.total_distance_cm);
//!
//! for event in events.try_iter() {
//!     println!("{event:?}");
//! }
//! session.close();
//! ```

pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod motion;
pub mod session;

pub use builder::SessionBuilder;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{DEFAULT_HOST, DEFAULT_PORT, FIXED_SPEED_CM_S, SessionConfig};
pub use error::ClientError;
pub use motion::{MotionTracker, command_for, intent_for, intent_for_key_code};
pub use session::{Session, StopReport};

pub use rover_driver::{ConnectionState, DriverError, LinkEvent, TelemetrySnapshot};
pub use rover_protocol::{MotionIntent, TelemetryEvent};

/// 默认日志过滤规则（`RUST_LOG` 未设置时使用）
pub const DEFAULT_LOG_FILTER: &str = "rover_cli=info,rover_client=info,rover_driver=info";

/// 安装 `tracing` 日志输出（写到 stderr，stdout 留给程序输出）
///
/// 使用 `RUST_LOG` 环境变量过滤，未设置时使用 [`DEFAULT_LOG_FILTER`]。
/// 重复调用无效果。
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_logging_twice_is_harmless() {
        super::init_logging();
        super::init_logging();
        tracing::info!("logging installed");
    }
}

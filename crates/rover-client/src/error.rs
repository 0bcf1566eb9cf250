//! 客户端错误类型

use rover_driver::DriverError;
use thiserror::Error;

/// 客户端错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// 驱动层错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 会话配置无效
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

//! 驱动层错误类型定义

use crate::state::ConnectionState;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// 当前状态不允许发送（未连接）
    #[error("Not connected (state: {state:?})")]
    NotConnected { state: ConnectionState },

    /// 连接已打开或正在打开
    #[error("Connection already open (state: {state:?})")]
    AlreadyOpen { state: ConnectionState },

    /// 建立连接失败
    #[error("Transport connect failed: {0}")]
    TransportConnect(String),

    /// 写入失败（连接随之进入 Failed）
    #[error("Transport write failed: {0}")]
    TransportWrite(String),

    /// 等待 IO 线程确认超时
    #[error("Operation timeout")]
    Timeout,

    /// 命令通道已关闭（IO 线程退出）
    #[error("Command channel closed")]
    ChannelClosed,

    /// 在 IO 线程内部（回调中）调用了会等待 IO 线程的方法
    #[error("Blocking call from the IO thread would deadlock")]
    WouldDeadlock,

    /// 配置无效
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

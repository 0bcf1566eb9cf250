//! # Rover Transport Layer
//!
//! 流式传输抽象层，提供统一的连接/读/写接口。
//!
//! 连接成功后，传输被拆分为独立的读半部（[`RxHalf`]）和写半部（[`TxHalf`]），
//! 两者都由驱动层的 IO 线程独占持有。

use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "tcp")]
pub use tcp::{TcpConnector, TcpRx, TcpTx};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockConnector, MockPeer};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// 读超时（无数据可读，正常情况）
    #[error("Read timeout")]
    Timeout,
    /// 对端关闭连接
    #[error("Connection closed by peer")]
    Closed,
    /// 地址无法解析
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    /// 连接被拒绝/不可达（Mock 或上层包装使用）
    #[error("Connect failed: {0}")]
    Refused(String),
}

impl TransportError {
    /// 是否为超时（读循环中用于区分"无数据"与真正的错误）
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// 远端地址
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.host, self.port)
    }
}

/// 连接器：建立连接并返回拆分后的读写半部
pub trait Connector: Send + Sync {
    type Rx: RxHalf + Send + 'static;
    type Tx: TxHalf + Send + 'static;

    /// 阻塞建立连接（带超时）
    fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<(Self::Rx, Self::Tx), TransportError>;
}

/// 读半部
pub trait RxHalf {
    /// 读取一段可用字节
    ///
    /// - `Ok(n)`, `n > 0`: 读到 n 字节
    /// - `Err(Closed)`: 对端关闭
    /// - `Err(Timeout)`: 超时内无数据（正常情况）
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// 写半部
pub trait TxHalf {
    /// 写入完整一帧（一次原子写入，不会与其他帧交错）
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// 关闭连接（释放句柄，同时唤醒阻塞的读半部）
    fn shutdown(&mut self) {}
}

impl<T: Connector + ?Sized> Connector for std::sync::Arc<T> {
    type Rx = T::Rx;
    type Tx = T::Tx;

    fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<(Self::Rx, Self::Tx), TransportError> {
        (**self).connect(endpoint, timeout)
    }
}

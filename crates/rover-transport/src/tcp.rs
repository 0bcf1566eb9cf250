//! TCP 传输实现
//!
//! 基于 `std::net::TcpStream`：连接后通过 `try_clone()` 拆分为读写两个句柄。
//! 读句柄设置短超时，使 IO 循环可以在无数据时继续处理命令队列和轮询任务。

use crate::{Connector, Endpoint, RxHalf, TransportError, TxHalf};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, trace};

/// TCP 连接器
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// 读超时（IO 循环的调度粒度）
    read_timeout: Duration,
    /// 是否关闭 Nagle（指令帧短小，默认关闭以降低延迟）
    nodelay: bool,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self {
            read_timeout: Duration::from_millis(5),
            nodelay: true,
        }
    }

    /// 设置读超时
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        // 0 会让 set_read_timeout 报错
        self.read_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// 设置 TCP_NODELAY
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for TcpConnector {
    type Rx = TcpRx;
    type Tx = TcpTx;

    fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<(TcpRx, TcpTx), TransportError> {
        let addrs: Vec<_> = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| TransportError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "no addresses resolved".to_string(),
            });
        }

        let mut last_err = None;
        for addr in &addrs {
            debug!("Connecting to {} ({})", endpoint, addr);
            match TcpStream::connect_timeout(addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    stream.set_read_timeout(Some(self.read_timeout))?;
                    let writer = stream.try_clone()?;
                    return Ok((TcpRx { stream }, TcpTx { stream: writer }));
                },
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                },
            }
        }

        Err(last_err.map(TransportError::Io).unwrap_or(TransportError::Refused(endpoint.to_string())))
    }
}

/// TCP 读半部
#[derive(Debug)]
pub struct TcpRx {
    stream: TcpStream,
}

impl RxHalf for TcpRx {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                trace!("TCP read {} bytes", n);
                Ok(n)
            },
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Err(TransportError::Timeout)
            },
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Err(TransportError::Timeout),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

/// TCP 写半部
#[derive(Debug)]
pub struct TcpTx {
    stream: TcpStream,
}

impl TxHalf for TcpTx {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    fn shutdown(&mut self) {
        // 已关闭时返回 NotConnected，忽略
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

//! Mock 传输（无网络依赖）
//!
//! 用于驱动层和客户端的测试：`MockConnector` 交给被测代码，
//! `MockPeer` 留在测试中扮演机器人一侧（注入上行字节、读取下行帧、注入故障）。

use crate::{Connector, Endpoint, RxHalf, TransportError, TxHalf};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 上行数据块
#[derive(Debug)]
enum Chunk {
    Data(Vec<u8>),
    Eof,
    Error(std::io::ErrorKind),
}

#[derive(Default)]
struct MockState {
    /// 当前连接的上行发送端
    inbound: Option<Sender<Chunk>>,
    /// 当前连接已关闭（shutdown 之后写入报错）
    closed: bool,
    /// 所有成功写入的帧（跨连接累计）
    written: Vec<Vec<u8>>,
    /// 写入次数（含失败）
    write_attempts: usize,
    connect_count: usize,
    endpoints: Vec<Endpoint>,
    refuse_connect: bool,
    fail_writes: bool,
    shutdown_count: usize,
}

struct Shared {
    state: Mutex<MockState>,
    written_cv: Condvar,
}

/// Mock 连接器
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
    read_timeout: Duration,
}

/// 测试侧句柄
#[derive(Clone)]
pub struct MockPeer {
    shared: Arc<Shared>,
}

impl MockConnector {
    /// 创建连接器和对应的测试句柄
    pub fn new() -> (MockConnector, MockPeer) {
        let shared = Arc::new(Shared {
            state: Mutex::new(MockState::default()),
            written_cv: Condvar::new(),
        });
        (
            MockConnector {
                shared: shared.clone(),
                read_timeout: Duration::from_millis(2),
            },
            MockPeer { shared },
        )
    }
}

impl Connector for MockConnector {
    type Rx = MockRx;
    type Tx = MockTx;

    fn connect(
        &self,
        endpoint: &Endpoint,
        _timeout: Duration,
    ) -> Result<(MockRx, MockTx), TransportError> {
        let mut state = self.shared.state.lock();
        state.connect_count += 1;
        state.endpoints.push(endpoint.clone());

        if state.refuse_connect {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("connection refused by {endpoint}"),
            )));
        }

        let (tx, rx) = unbounded();
        state.inbound = Some(tx);
        state.closed = false;

        Ok((
            MockRx {
                inbound: rx,
                read_timeout: self.read_timeout,
            },
            MockTx {
                shared: self.shared.clone(),
            },
        ))
    }
}

/// Mock 读半部
pub struct MockRx {
    inbound: Receiver<Chunk>,
    read_timeout: Duration,
}

impl RxHalf for MockRx {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.inbound.recv_timeout(self.read_timeout) {
            Ok(Chunk::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            },
            Ok(Chunk::Eof) => Err(TransportError::Closed),
            Ok(Chunk::Error(kind)) => Err(TransportError::Io(kind.into())),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(TransportError::Timeout),
            // 测试句柄替换了连接（重连）或被丢弃，视为对端关闭
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

/// Mock 写半部
pub struct MockTx {
    shared: Arc<Shared>,
}

impl TxHalf for MockTx {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.shared.state.lock();
        state.write_attempts += 1;
        if state.closed {
            return Err(TransportError::Io(std::io::ErrorKind::NotConnected.into()));
        }
        if state.fail_writes {
            return Err(TransportError::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        state.written.push(bytes.to_vec());
        drop(state);
        self.shared.written_cv.notify_all();
        Ok(())
    }

    fn shutdown(&mut self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.shutdown_count += 1;
        state.inbound = None;
    }
}

impl MockPeer {
    /// 向当前连接注入上行字节（可为半帧）
    pub fn push_inbound(&self, bytes: impl AsRef<[u8]>) -> bool {
        let state = self.shared.state.lock();
        match &state.inbound {
            Some(tx) => tx.send(Chunk::Data(bytes.as_ref().to_vec())).is_ok(),
            None => false,
        }
    }

    /// 模拟对端正常关闭（读到 EOF）
    pub fn close(&self) {
        let state = self.shared.state.lock();
        if let Some(tx) = &state.inbound {
            let _ = tx.send(Chunk::Eof);
        }
    }

    /// 模拟读错误（如连接被重置）
    pub fn fail_read(&self, kind: std::io::ErrorKind) {
        let state = self.shared.state.lock();
        if let Some(tx) = &state.inbound {
            let _ = tx.send(Chunk::Error(kind));
        }
    }

    /// 之后的连接请求是否被拒绝
    pub fn set_refuse_connect(&self, refuse: bool) {
        self.shared.state.lock().refuse_connect = refuse;
    }

    /// 之后的写入是否失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.state.lock().fail_writes = fail;
    }

    /// 已写入的帧（原样，含 `\r\n`）
    pub fn written(&self) -> Vec<String> {
        self.shared
            .state
            .lock()
            .written
            .iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    /// 已写入的帧（去掉结束符）
    pub fn written_lines(&self) -> Vec<String> {
        self.written().into_iter().map(|s| s.trim_end().to_string()).collect()
    }

    /// 清空写入记录
    pub fn clear_written(&self) {
        self.shared.state.lock().written.clear();
    }

    /// 写入尝试次数（含失败）
    pub fn write_attempts(&self) -> usize {
        self.shared.state.lock().write_attempts
    }

    /// 连接次数
    pub fn connect_count(&self) -> usize {
        self.shared.state.lock().connect_count
    }

    /// 最近一次连接的地址
    pub fn last_endpoint(&self) -> Option<Endpoint> {
        self.shared.state.lock().endpoints.last().cloned()
    }

    /// shutdown 被调用的次数
    pub fn shutdown_count(&self) -> usize {
        self.shared.state.lock().shutdown_count
    }

    /// 当前是否存在打开的连接
    pub fn is_connected(&self) -> bool {
        let state = self.shared.state.lock();
        state.inbound.is_some() && !state.closed
    }

    /// 等待直到满足条件的帧被写入（或超时）
    ///
    /// 返回超时时刻的写入记录，由调用方断言。
    pub fn wait_for_written<F>(&self, timeout: Duration, mut done: F) -> Vec<String>
    where
        F: FnMut(&[String]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            let lines: Vec<String> = state
                .written
                .iter()
                .map(|b| String::from_utf8_lossy(b).trim_end().to_string())
                .collect();
            if done(&lines) {
                return lines;
            }
            if self.shared.written_cv.wait_until(&mut state, deadline).timed_out() {
                return state
                    .written
                    .iter()
                    .map(|b| String::from_utf8_lossy(b).trim_end().to_string())
                    .collect();
            }
        }
    }
}

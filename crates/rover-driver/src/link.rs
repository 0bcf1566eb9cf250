//! 连接管理器
//!
//! `ConnectionManager` 持有连接状态机、轮询调度器和 IO 线程句柄，对外提供
//! `open` / `close` / `send` 以及状态、遥测、指标的查询。

use crate::error::DriverError;
use crate::hooks::{EventCallback, LinkEvent};
use crate::metrics::{LinkMetrics, MetricsSnapshot};
use crate::pipeline::{LinkContext, LinkRequest, PipelineConfig, io_loop};
use crate::scheduler::{PollingConfig, PollingScheduler};
use crate::state::{ConnectionState, TelemetrySnapshot};
use crossbeam_channel::{RecvTimeoutError, SendTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use rover_protocol::{Command, OutboundFrame};
use rover_transport::{Connector, Endpoint};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = bounded(1);

        // 看门狗线程代为 join，超时后继续在后台等待
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// IO 线程句柄
#[derive(Default)]
struct IoHandle {
    cmd_tx: Option<Sender<LinkRequest>>,
    thread: Option<JoinHandle<()>>,
    is_running: Option<Arc<AtomicBool>>,
    endpoint: Option<Endpoint>,
}

/// 连接管理器
///
/// # 状态机
///
/// - `open()`: Disconnected -> Connecting -> Connected | Failed
/// - IO 线程: Connected -> Disconnected（对端关闭）| Failed（读写错误）
/// - `close()`: 任意状态 -> Disconnected
///
/// 离开 Connected 时停用全部轮询任务，进入 Connected 时启用。
///
/// # 示例
///
/// ```rust,no_run
/// use rover_driver::{ConnectionManager, PipelineConfig, PollingConfig};
/// use rover_transport::{Endpoint, TcpConnector};
/// use rover_protocol::Command;
///
/// # fn main() -> Result<(), rover_driver::DriverError> {
/// let link = ConnectionManager::new(
///     TcpConnector::new(),
///     PollingConfig::default(),
///     PipelineConfig::default(),
/// )?;
/// link.open(&Endpoint::new("192.168.0.42", 5000))?;
/// link.send(&Command::temperature())?;
/// link.close();
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<C: Connector> {
    connector: C,
    ctx: Arc<LinkContext>,
    config: PipelineConfig,
    io: Mutex<IoHandle>,
}

impl<C: Connector> ConnectionManager<C> {
    /// 创建连接管理器（初始状态 Disconnected，不建立连接）
    pub fn new(
        connector: C,
        polling: PollingConfig,
        config: PipelineConfig,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        let scheduler = PollingScheduler::new(polling)?;
        Ok(Self {
            connector,
            ctx: Arc::new(LinkContext::new(scheduler)),
            config,
            io: Mutex::new(IoHandle::default()),
        })
    }

    /// 建立连接
    ///
    /// 仅在 Disconnected 状态下可用（Failed 需要先 `close()`）。
    /// 阻塞直到连接成功或 `connect_timeout` 超时。
    ///
    /// # 错误
    ///
    /// - `AlreadyOpen`: 当前状态不是 Disconnected，无副作用
    /// - `TransportConnect`: 连接失败，状态变为 Failed
    /// - `WouldDeadlock`: 在事件回调中调用
    pub fn open(&self, endpoint: &Endpoint) -> Result<(), DriverError> {
        if self.ctx.is_io_thread() {
            return Err(DriverError::WouldDeadlock);
        }
        if !self
            .ctx
            .transition_from(ConnectionState::Disconnected, ConnectionState::Connecting)
        {
            return Err(DriverError::AlreadyOpen {
                state: self.ctx.state(),
            });
        }

        // 回调中 close() 留下的线程句柄
        self.stop_io();

        LinkMetrics::incr(&self.ctx.metrics.connect_attempts);
        info!("Connecting to {}", endpoint);

        let (rx, tx) = match self.connector.connect(endpoint, self.config.connect_timeout()) {
            Ok(halves) => halves,
            Err(e) => {
                let reason = e.to_string();
                warn!("Connect to {} failed: {}", endpoint, reason);
                LinkMetrics::incr(&self.ctx.metrics.connect_failures);
                self.ctx.record_error(reason.clone());
                self.ctx.scheduler.lock().disable_all();
                self.ctx
                    .transition_from(ConnectionState::Connecting, ConnectionState::Failed);
                return Err(DriverError::TransportConnect(reason));
            },
        };

        self.ctx.clear_error();
        self.ctx.reset_telemetry();

        let (cmd_tx, cmd_rx) = bounded(self.config.command_queue_capacity);
        let is_running = Arc::new(AtomicBool::new(true));
        let thread = {
            let ctx = self.ctx.clone();
            let is_running = is_running.clone();
            let config = self.config.clone();
            spawn(move || io_loop(rx, tx, cmd_rx, ctx, is_running, config))
        };

        {
            let mut io = self.io.lock();
            io.cmd_tx = Some(cmd_tx);
            io.thread = Some(thread);
            io.is_running = Some(is_running);
            io.endpoint = Some(endpoint.clone());
        }

        if self
            .ctx
            .transition_from(ConnectionState::Connecting, ConnectionState::Connected)
        {
            info!("Connected to {}", endpoint);
            Ok(())
        } else {
            // 打开过程中被 close() 或连接已经结束
            let state = self.ctx.state();
            debug!("Open aborted in state {}", state);
            self.stop_io();
            Err(DriverError::TransportConnect(format!(
                "connection ended during open (state: {state})"
            )))
        }
    }

    /// 关闭连接
    ///
    /// 总是以 Disconnected 结束，停用轮询并等待 IO 线程退出后返回。幂等。
    /// 在事件回调中调用时不等待 IO 线程（线程在回调返回后自行退出）。
    pub fn close(&self) {
        let from = self.ctx.transition(ConnectionState::Disconnected);
        self.stop_io();
        if from != ConnectionState::Disconnected {
            info!("Link closed (was {})", from);
        }
    }

    /// 停止并回收 IO 线程
    fn stop_io(&self) {
        let (thread, cmd_tx, is_running) = {
            let mut io = self.io.lock();
            (io.thread.take(), io.cmd_tx.take(), io.is_running.take())
        };

        if let Some(flag) = is_running {
            flag.store(false, Ordering::Release);
        }
        // 先丢弃发送端，IO 线程才能观察到队列断开
        drop(cmd_tx);

        let Some(handle) = thread else {
            return;
        };

        if self.ctx.is_io_thread() {
            // 不能 join 自己，留给下一次 open/close/drop
            self.io.lock().thread = Some(handle);
            return;
        }

        if let Err(_e) = handle.join_timeout(self.config.join_timeout()) {
            error!(
                "IO thread panicked or failed to shut down within {:?}",
                self.config.join_timeout()
            );
        }
        self.ctx.set_io_thread(None);
    }

    /// 发送编码指令
    pub fn send(&self, command: &Command) -> Result<(), DriverError> {
        self.send_frame(OutboundFrame::Command(command.clone()))
    }

    /// 发送原始文本（不经过编码器，仅追加 `\r\n`）
    pub fn send_raw(&self, text: &str) -> Result<(), DriverError> {
        self.send_frame(OutboundFrame::Raw(text.to_string()))
    }

    /// 发送一帧并等待 IO 线程写入回执
    ///
    /// # 错误
    ///
    /// - `NotConnected`: 当前不是 Connected，不写入
    /// - `TransportWrite`: 写入失败，状态已变为 Failed
    /// - `Timeout`: 超过 `send_timeout` 未收到回执
    /// - `WouldDeadlock`: 在事件回调中调用
    pub fn send_frame(&self, frame: OutboundFrame) -> Result<(), DriverError> {
        let state = self.ctx.state();
        if !state.is_connected() {
            return Err(DriverError::NotConnected { state });
        }
        if self.ctx.is_io_thread() {
            return Err(DriverError::WouldDeadlock);
        }

        let sender = self
            .io
            .lock()
            .cmd_tx
            .clone()
            .ok_or_else(|| DriverError::NotConnected {
                state: self.ctx.state(),
            })?;

        debug!("Sending {}", frame);
        let timeout = self.config.send_timeout();
        let (ack_tx, ack_rx) = bounded(1);
        let request = LinkRequest::Send {
            bytes: frame.to_bytes(),
            ack: ack_tx,
        };

        match sender.send_timeout(request, timeout) {
            Ok(()) => {},
            Err(SendTimeoutError::Timeout(_)) => return Err(DriverError::Timeout),
            Err(SendTimeoutError::Disconnected(_)) => return Err(self.channel_closed()),
        }
        drop(sender);

        match ack_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(DriverError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(self.channel_closed()),
        }
    }

    /// IO 线程在处理请求前退出：连接已结束时报告 NotConnected
    fn channel_closed(&self) -> DriverError {
        let state = self.ctx.state();
        if state.is_connected() {
            DriverError::ChannelClosed
        } else {
            DriverError::NotConnected { state }
        }
    }

    /// 当前连接状态（无锁）
    pub fn state(&self) -> ConnectionState {
        self.ctx.state()
    }

    /// 最近一次连接/读写错误
    pub fn last_error(&self) -> Option<String> {
        self.ctx.last_error()
    }

    /// 最新遥测快照
    pub fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        self.ctx.telemetry()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 清零收发指标（连接状态不变）
    pub fn reset_metrics(&self) {
        self.ctx.metrics.reset();
    }

    /// 订阅事件（非阻塞投递，通道满时丢弃）
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<LinkEvent> {
        self.ctx.hooks().lock().subscribe()
    }

    /// 注册事件回调
    pub fn add_callback(&self, callback: Arc<dyn EventCallback>) {
        self.ctx.hooks().lock().add_callback(callback);
    }

    /// 向订阅者发布事件（由上层产生的事件，如运动结束）
    pub fn emit(&self, event: LinkEvent) {
        self.ctx.dispatch(&event);
    }

    /// IO 线程是否仍在运行
    pub fn is_io_alive(&self) -> bool {
        self.io
            .lock()
            .thread
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 最近一次打开的地址
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.io.lock().endpoint.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 只读访问调度器（检查任务启用状态、舵机角度等）
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&PollingScheduler) -> R) -> R {
        f(&self.ctx.scheduler.lock())
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("ctx", &self.ctx)
            .field("hooks", &*self.ctx.hooks().lock())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

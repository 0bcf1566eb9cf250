//! Pipeline IO 循环模块
//!
//! 每个打开的连接对应一个 IO 线程，独占传输层的读写两个半部。每轮循环：
//!
//! 1. 清空命令队列（调用方的发送请求，逐帧写出并回执）
//! 2. 取出到期的轮询任务并写出
//! 3. 带超时读取一段字节，切行、解码、分发事件
//!
//! 所有写入都发生在这一个线程上，一帧一次写入，因此轮询帧与用户帧不会交错；
//! 队列顺序即发送顺序。

use crate::error::DriverError;
use crate::hooks::{HookManager, LinkEvent};
use crate::metrics::LinkMetrics;
use crate::scheduler::PollingScheduler;
use crate::state::{AtomicConnectionState, ConnectionState, TelemetrySnapshot};
use arc_swap::ArcSwap;
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use rover_protocol::{LineFramer, TelemetryEvent, try_decode};
use rover_transport::{RxHalf, TransportError, TxHalf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Pipeline 配置
///
/// # Example
///
/// ```
/// # use rover_driver::PipelineConfig;
/// let config = PipelineConfig {
///     connect_timeout_ms: 1_000,
///     ..Default::default()
/// };
/// assert_eq!(config.send_timeout_ms, 1_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 建立连接超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 等待 IO 线程写入回执的超时（毫秒）
    pub send_timeout_ms: u64,
    /// 关闭时等待 IO 线程退出的超时（毫秒）
    pub join_timeout_ms: u64,
    /// 单次读取缓冲区大小（字节）
    pub read_buffer_size: usize,
    /// 单行长度上限（字节），超出的半行被丢弃
    pub max_line_len: usize,
    /// 命令队列容量
    pub command_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3_000,
            send_timeout_ms: 1_000,
            join_timeout_ms: 2_000,
            read_buffer_size: 1024,
            max_line_len: rover_protocol::framing::DEFAULT_MAX_LINE_LEN,
            command_queue_capacity: 64,
        }
    }
}

impl PipelineConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if self.read_buffer_size == 0 {
            return Err(DriverError::InvalidConfig("read_buffer_size must be > 0".to_string()));
        }
        if self.command_queue_capacity == 0 {
            return Err(DriverError::InvalidConfig(
                "command_queue_capacity must be > 0".to_string(),
            ));
        }
        if self.send_timeout_ms == 0 {
            return Err(DriverError::InvalidConfig("send_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

/// 发往 IO 线程的请求
#[derive(Debug)]
pub enum LinkRequest {
    /// 写出一帧，写入结果通过 `ack` 回执
    Send {
        bytes: Bytes,
        ack: Sender<Result<(), DriverError>>,
    },
}

/// 共享状态上下文
///
/// 由 `ConnectionManager` 和 IO 线程共同持有。
pub struct LinkContext {
    state: AtomicConnectionState,
    pub(crate) scheduler: Mutex<PollingScheduler>,
    hooks: Mutex<HookManager>,
    telemetry: ArcSwap<TelemetrySnapshot>,
    pub(crate) metrics: LinkMetrics,
    last_error: Mutex<Option<String>>,
    io_thread: Mutex<Option<ThreadId>>,
}

impl LinkContext {
    pub fn new(scheduler: PollingScheduler) -> Self {
        Self {
            state: AtomicConnectionState::default(),
            scheduler: Mutex::new(scheduler),
            hooks: Mutex::new(HookManager::new()),
            telemetry: ArcSwap::from_pointee(TelemetrySnapshot::default()),
            metrics: LinkMetrics::new(),
            last_error: Mutex::new(None),
            io_thread: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get(Ordering::Acquire)
    }

    /// 无条件切换状态，返回旧状态
    pub(crate) fn transition(&self, to: ConnectionState) -> ConnectionState {
        let from = self.state.swap(to, Ordering::AcqRel);
        self.on_transition(from, to);
        from
    }

    /// 仅当当前状态为 `expected` 时切换
    pub(crate) fn transition_from(&self, expected: ConnectionState, to: ConnectionState) -> bool {
        if self.state.compare_exchange(expected, to, Ordering::AcqRel, Ordering::Acquire) {
            self.on_transition(expected, to);
            true
        } else {
            false
        }
    }

    /// 状态切换的副作用
    ///
    /// 离开 Connected 时停用调度器（每次离开恰好一次），进入 Connected 时启用。
    fn on_transition(&self, from: ConnectionState, to: ConnectionState) {
        if from == to {
            return;
        }
        if from == ConnectionState::Connected {
            self.scheduler.lock().disable_all();
            LinkMetrics::incr(&self.metrics.poll_disables);
        }
        if to == ConnectionState::Connected {
            self.scheduler.lock().enable_all(Instant::now());
            LinkMetrics::incr(&self.metrics.poll_enables);
        }
        info!("Link state {} -> {}", from, to);
        self.dispatch(&LinkEvent::StateChanged { from, to });
    }

    /// 分发事件：先投递订阅通道，再在锁外逐个触发回调
    pub fn dispatch(&self, event: &LinkEvent) {
        let callbacks = {
            let mut hooks = self.hooks.lock();
            let stats = hooks.fan_out(event);
            if stats.dropped > 0 {
                LinkMetrics::add(&self.metrics.events_dropped, stats.dropped as u64);
            }
            hooks.callbacks()
        };
        for callback in callbacks {
            callback.on_event(event);
        }
    }

    pub(crate) fn hooks(&self) -> &Mutex<HookManager> {
        &self.hooks
    }

    pub fn telemetry(&self) -> Arc<TelemetrySnapshot> {
        self.telemetry.load_full()
    }

    /// 发布遥测值（仅 IO 线程写入）
    fn publish_telemetry(&self, event: TelemetryEvent, received_at: Instant) {
        let next = self.telemetry.load().with_event(event, received_at);
        self.telemetry.store(Arc::new(next));
    }

    pub(crate) fn reset_telemetry(&self) {
        self.telemetry.store(Arc::new(TelemetrySnapshot::default()));
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        *self.last_error.lock() = Some(message.into());
    }

    pub(crate) fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    pub(crate) fn set_io_thread(&self, id: Option<ThreadId>) {
        *self.io_thread.lock() = id;
    }

    /// 当前线程是否为 IO 线程
    pub fn is_io_thread(&self) -> bool {
        *self.io_thread.lock() == Some(std::thread::current().id())
    }

    /// 连接在 IO 线程上结束（对端关闭或出错）
    ///
    /// 打开过程中（尚未进入 Connected）结束时也要落到终态，
    /// 这样 `open()` 随后的 Connecting -> Connected 切换会失败。
    fn end_from_io(&self, to: ConnectionState) {
        if !self.transition_from(ConnectionState::Connected, to) {
            self.transition_from(ConnectionState::Connecting, to);
        }
    }
}

impl std::fmt::Debug for LinkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkContext")
            .field("state", &self.state())
            .field("last_error", &self.last_error())
            .finish_non_exhaustive()
    }
}

/// IO 循环退出原因
#[derive(Debug)]
enum LoopExit {
    /// 被 `close()` 停止
    Stopped,
    /// 对端正常关闭
    PeerClosed,
    /// 读写出错
    Failed(String),
}

/// IO 线程主循环
///
/// # 参数
/// - `rx` / `tx`: 传输层读写半部（独占）
/// - `cmd_rx`: 命令队列接收端
/// - `ctx`: 共享状态上下文
/// - `is_running`: 运行标志，`close()` 置为 false
/// - `config`: Pipeline 配置
pub fn io_loop<R: RxHalf, T: TxHalf>(
    mut rx: R,
    mut tx: T,
    cmd_rx: Receiver<LinkRequest>,
    ctx: Arc<LinkContext>,
    is_running: Arc<AtomicBool>,
    config: PipelineConfig,
) {
    ctx.set_io_thread(Some(std::thread::current().id()));
    let mut framer = LineFramer::with_max_line_len(config.max_line_len);
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];

    let exit = loop {
        if !is_running.load(Ordering::Acquire) {
            break LoopExit::Stopped;
        }

        // 1. 调用方的发送请求
        match drain_requests(&mut tx, &cmd_rx, &ctx) {
            Ok(true) => {},
            Ok(false) => break LoopExit::Stopped,
            Err(reason) => break LoopExit::Failed(reason),
        }

        // 2. 到期的轮询任务
        if let Err(reason) = fire_due_polls(&mut tx, &ctx) {
            debug!("Poll write failed: {}", reason);
            break LoopExit::Failed(reason);
        }

        // 3. 接收
        match rx.read_chunk(&mut buf) {
            Ok(n) => {
                LinkMetrics::add(&ctx.metrics.rx_bytes, n as u64);
                for line in framer.push(&buf[..n]) {
                    handle_line(&line, &ctx);
                }
            },
            Err(e) if e.is_timeout() => {},
            Err(TransportError::Closed) => break LoopExit::PeerClosed,
            Err(e) => break LoopExit::Failed(format!("read error: {e}")),
        }
    };

    match exit {
        LoopExit::Stopped => debug!("IO loop stopped"),
        LoopExit::PeerClosed => {
            info!("Connection closed by peer");
            ctx.end_from_io(ConnectionState::Disconnected);
        },
        LoopExit::Failed(reason) => {
            warn!("Link failed: {}", reason);
            ctx.record_error(reason);
            ctx.end_from_io(ConnectionState::Failed);
        },
    }

    tx.shutdown();
    trace!("IO loop exited");
}

/// 清空命令队列
///
/// 返回 `Ok(false)` 表示队列已断开（所有发送端被丢弃），`Err` 表示写入失败。
/// 写入失败时先切换到 Failed 再回执，调用方拿到错误时状态已经更新。
fn drain_requests<T: TxHalf>(
    tx: &mut T,
    cmd_rx: &Receiver<LinkRequest>,
    ctx: &LinkContext,
) -> Result<bool, String> {
    loop {
        let request = match cmd_rx.try_recv() {
            Ok(request) => request,
            Err(TryRecvError::Empty) => return Ok(true),
            Err(TryRecvError::Disconnected) => return Ok(false),
        };

        match request {
            LinkRequest::Send { bytes, ack } => {
                let state = ctx.state();
                if !state.is_connected() {
                    let _ = ack.send(Err(DriverError::NotConnected { state }));
                    continue;
                }
                match write_frame(tx, &bytes, ctx) {
                    Ok(()) => {
                        let _ = ack.send(Ok(()));
                    },
                    Err(reason) => {
                        ctx.record_error(reason.clone());
                        ctx.end_from_io(ConnectionState::Failed);
                        let _ = ack.send(Err(DriverError::TransportWrite(reason.clone())));
                        return Err(reason);
                    },
                }
            },
        }
    }
}

/// 写出到期的轮询指令
fn fire_due_polls<T: TxHalf>(tx: &mut T, ctx: &LinkContext) -> Result<(), String> {
    // 锁只在取指令时持有，写出时已释放
    let batch = ctx.scheduler.lock().poll_due(Instant::now(), ctx.state());
    for command in batch {
        let bytes = Bytes::from(command.to_wire());
        write_frame(tx, &bytes, ctx)?;
        LinkMetrics::incr(&ctx.metrics.tx_poll_frames);
    }
    Ok(())
}

fn write_frame<T: TxHalf>(tx: &mut T, bytes: &[u8], ctx: &LinkContext) -> Result<(), String> {
    match tx.write_frame(bytes) {
        Ok(()) => {
            LinkMetrics::incr(&ctx.metrics.tx_frames);
            LinkMetrics::add(&ctx.metrics.tx_bytes, bytes.len() as u64);
            trace!("TX {:?}", String::from_utf8_lossy(bytes));
            Ok(())
        },
        Err(e) => {
            LinkMetrics::incr(&ctx.metrics.write_errors);
            Err(format!("write error: {e}"))
        },
    }
}

/// 处理一行上行数据
fn handle_line(line: &str, ctx: &LinkContext) {
    LinkMetrics::incr(&ctx.metrics.rx_frames);
    match try_decode(line) {
        Ok(Some(event)) => {
            LinkMetrics::incr(&ctx.metrics.rx_telemetry);
            trace!("RX {:?} -> {:?}", line, event);
            ctx.publish_telemetry(event, Instant::now());
            ctx.dispatch(&LinkEvent::Telemetry(event));
        },
        Ok(None) => {
            LinkMetrics::incr(&ctx.metrics.rx_unrecognized);
            trace!("Unrecognized frame: {:?}", line);
        },
        Err(e) => {
            LinkMetrics::incr(&ctx.metrics.rx_decode_errors);
            warn!("Failed to parse message: {}", e);
        },
    }
}

//! 钩子系统（Hook System）
//!
//! 连接事件（状态变化、遥测、运动结束）的两种订阅方式：
//!
//! - **回调**：实现 [`EventCallback`]，在产生事件的线程（通常是 IO 线程）上同步调用
//! - **通道**：[`HookManager::subscribe`] 返回 `crossbeam_channel::Receiver`，适合耗时处理
//!
//! 回调必须是非阻塞的：IO 线程在回调返回前不会读取下一帧。

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use rover_protocol::TelemetryEvent;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::state::ConnectionState;

/// 每个订阅通道的缓冲容量
pub const SUBSCRIBER_CAPACITY: usize = 256;

/// 连接事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkEvent {
    /// 连接状态变化
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// 收到遥测帧（按接收顺序）
    Telemetry(TelemetryEvent),
    /// 一次运动结束，附带累计距离
    MovementEnded { total_distance_cm: f64 },
}

/// 事件回调 Trait
///
/// # 性能要求
///
/// - 非阻塞：禁止 I/O、长时间持锁
/// - 禁止在回调中调用会等待 IO 线程的方法（`send` 会返回 `WouldDeadlock`）
/// - 推荐使用 `try_send` 转发到自己的通道
///
/// # 示例
///
/// ```rust
/// use rover_driver::hooks::{EventCallback, LinkEvent};
/// use crossbeam_channel::{Sender, bounded};
///
/// struct Forward {
///     sender: Sender<LinkEvent>,
/// }
///
/// impl EventCallback for Forward {
///     fn on_event(&self, event: &LinkEvent) {
///         let _ = self.sender.try_send(*event);
///     }
/// }
///
/// let (tx, _rx) = bounded(16);
/// let _cb = Forward { sender: tx };
/// ```
pub trait EventCallback: Send + Sync {
    fn on_event(&self, event: &LinkEvent);
}

impl<F> EventCallback for F
where
    F: Fn(&LinkEvent) + Send + Sync,
{
    fn on_event(&self, event: &LinkEvent) {
        self(event)
    }
}

/// 分发结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutStats {
    /// 因订阅通道已满而丢弃的事件数
    pub dropped: usize,
    /// 因接收端已关闭而移除的订阅数
    pub pruned: usize,
}

/// 钩子管理器
///
/// 不是线程安全的，由外部同步（驱动层放在 `RwLock` / `Mutex` 中）。
#[derive(Default)]
pub struct HookManager {
    callbacks: Vec<Arc<dyn EventCallback>>,
    subscribers: Vec<Sender<LinkEvent>>,
}

impl HookManager {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// 添加回调
    pub fn add_callback(&mut self, callback: Arc<dyn EventCallback>) {
        self.callbacks.push(callback);
    }

    /// 新建订阅通道
    pub fn subscribe(&mut self) -> Receiver<LinkEvent> {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// 当前回调列表的拷贝
    ///
    /// 调用方释放锁之后再逐个触发，回调内部可以安全地注册新回调。
    pub fn callbacks(&self) -> SmallVec<[Arc<dyn EventCallback>; 4]> {
        self.callbacks.iter().cloned().collect()
    }

    /// 向所有订阅通道投递（非阻塞），并移除已关闭的订阅
    pub fn fan_out(&mut self, event: &LinkEvent) -> FanOutStats {
        let mut stats = FanOutStats::default();
        self.subscribers.retain(|tx| match tx.try_send(*event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                stats.dropped += 1;
                true
            },
            Err(TrySendError::Disconnected(_)) => {
                stats.pruned += 1;
                false
            },
        });
        stats
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookManager")
            .field("callbacks", &self.callbacks.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

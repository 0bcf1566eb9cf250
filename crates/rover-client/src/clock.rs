//! 时间源
//!
//! 运动计时只需要单调的毫秒时间。`MonotonicClock` 以首次访问为零点，
//! 不受系统时钟调整影响；`ManualClock` 由测试手动推进。

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// 单调时钟零点（首次访问时设置）
static CLOCK_START: OnceLock<Instant> = OnceLock::new();

/// 毫秒时间源
pub trait Clock: Send + Sync {
    /// 当前时间（毫秒，单调不减）
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// 单调时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        let start = CLOCK_START.get_or_init(Instant::now);
        start.elapsed().as_millis() as u64
    }
}

/// 手动时钟（测试用）
///
/// ```rust
/// use rover_client::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance_ms(2_500);
/// assert_eq!(clock.now_ms(), 3_500);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    pub fn set_ms(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::Relaxed);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

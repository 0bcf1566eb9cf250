//! 链路指标
//!
//! 原子计数器，IO 线程与调用线程都可以无锁更新和读取。

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路实时指标
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 建立连接的尝试次数
    pub connect_attempts: AtomicU64,
    /// 建立连接失败次数
    pub connect_failures: AtomicU64,

    /// 接收的字节数
    pub rx_bytes: AtomicU64,
    /// 切分出的完整行数
    pub rx_frames: AtomicU64,
    /// 成功解码为遥测事件的帧数
    pub rx_telemetry: AtomicU64,
    /// 前缀可识别但内容无效而丢弃的帧数
    pub rx_decode_errors: AtomicU64,
    /// 前缀不可识别的帧数
    pub rx_unrecognized: AtomicU64,

    /// 写出的帧数（含轮询）
    pub tx_frames: AtomicU64,
    /// 写出的字节数
    pub tx_bytes: AtomicU64,
    /// 其中由轮询任务产生的帧数
    pub tx_poll_frames: AtomicU64,
    /// 写失败次数
    pub write_errors: AtomicU64,

    /// 调度器启用次数（进入 Connected）
    pub poll_enables: AtomicU64,
    /// 调度器停用次数（离开 Connected）
    pub poll_disables: AtomicU64,

    /// 订阅通道已满而丢弃的事件数
    pub events_dropped: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            rx_telemetry: self.rx_telemetry.load(Ordering::Relaxed),
            rx_decode_errors: self.rx_decode_errors.load(Ordering::Relaxed),
            rx_unrecognized: self.rx_unrecognized.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tx_poll_frames: self.tx_poll_frames.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            poll_enables: self.poll_enables.load(Ordering::Relaxed),
            poll_disables: self.poll_disables.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.connect_attempts,
            &self.connect_failures,
            &self.rx_bytes,
            &self.rx_frames,
            &self.rx_telemetry,
            &self.rx_decode_errors,
            &self.rx_unrecognized,
            &self.tx_frames,
            &self.tx_bytes,
            &self.tx_poll_frames,
            &self.write_errors,
            &self.poll_enables,
            &self.poll_disables,
            &self.events_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub rx_bytes: u64,
    pub rx_frames: u64,
    pub rx_telemetry: u64,
    pub rx_decode_errors: u64,
    pub rx_unrecognized: u64,
    pub tx_frames: u64,
    pub tx_bytes: u64,
    pub tx_poll_frames: u64,
    pub write_errors: u64,
    pub poll_enables: u64,
    pub poll_disables: u64,
    pub events_dropped: u64,
}

impl MetricsSnapshot {
    /// 由调用方发送的帧数（不含轮询）
    pub fn tx_user_frames(&self) -> u64 {
        self.tx_frames.saturating_sub(self.tx_poll_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = LinkMetrics::new();
        LinkMetrics::incr(&metrics.tx_frames);
        LinkMetrics::incr(&metrics.tx_frames);
        LinkMetrics::incr(&metrics.tx_poll_frames);
        LinkMetrics::add(&metrics.rx_bytes, 21);

        let snap = metrics.snapshot();
        assert_eq!(snap.tx_frames, 2);
        assert_eq!(snap.tx_user_frames(), 1);
        assert_eq!(snap.rx_bytes, 21);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}

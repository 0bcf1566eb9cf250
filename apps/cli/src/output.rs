//! 事件与状态的文本输出

use rover_client::{LinkEvent, TelemetryEvent, TelemetrySnapshot};
use rover_driver::MetricsSnapshot;

/// 单行事件描述
pub fn format_event(event: &LinkEvent) -> String {
    match event {
        LinkEvent::StateChanged { from, to } => format!("🔌 状态: {} -> {}", from, to),
        LinkEvent::Telemetry(TelemetryEvent::Distance(cm)) => format!("📏 障碍物距离: {:.2} cm", cm),
        LinkEvent::Telemetry(TelemetryEvent::Temperature(c)) => format!("🌡  温度: {:.1} °C", c),
        LinkEvent::Telemetry(TelemetryEvent::CpuLoad(pct)) => format!("🧮 CPU 负载: {:.1} %", pct),
        LinkEvent::MovementEnded { total_distance_cm } => {
            format!("🛞 累计行驶: {:.1} cm", total_distance_cm)
        },
    }
}

/// 遥测快照（多行）
pub fn format_telemetry(snapshot: &TelemetrySnapshot) -> String {
    fn value(reading: Option<f64>, unit: &str) -> String {
        match reading {
            Some(v) => format!("{:.2} {}", v, unit),
            None => "(无数据)".to_string(),
        }
    }

    format!(
        "  距离: {}\n  温度: {}\n  CPU:  {}",
        value(snapshot.distance_cm.map(|r| r.value), "cm"),
        value(snapshot.temperature_c.map(|r| r.value), "°C"),
        value(snapshot.cpu_load_pct.map(|r| r.value), "%"),
    )
}

/// 收发统计（多行）
pub fn format_metrics(metrics: &MetricsSnapshot) -> String {
    format!(
        "  发送: {} 帧（轮询 {}），{} 字节\n  接收: {} 帧（遥测 {}，解析失败 {}，未识别 {}），{} 字节\n  写入错误: {}，丢弃事件: {}",
        metrics.tx_frames,
        metrics.tx_poll_frames,
        metrics.tx_bytes,
        metrics.rx_frames,
        metrics.rx_telemetry,
        metrics.rx_decode_errors,
        metrics.rx_unrecognized,
        metrics.rx_bytes,
        metrics.write_errors,
        metrics.events_dropped,
    )
}

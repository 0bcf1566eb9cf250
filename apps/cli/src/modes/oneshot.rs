//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置
//! 2. 连接小车
//! 3. 执行操作
//! 4. 断开连接

use crate::config::CliConfig;
use crate::output;
use anyhow::{Context, Result};
use crossbeam_channel::RecvTimeoutError;
use rover_client::{LinkEvent, Session, SessionBuilder};
use rover_transport::TcpConnector;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 事件通道的等待粒度
const EVENT_WAIT: Duration = Duration::from_millis(200);

/// One-shot 模式
pub struct OneShotMode {
    config: CliConfig,
}

impl OneShotMode {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    /// 创建会话并连接
    fn open_session(&self) -> Result<Session<TcpConnector>> {
        let session = SessionBuilder::new()
            .config(self.config.session.clone())
            .polling(self.config.polling.to_polling_config())
            .build()
            .context("创建会话失败")?;

        let host = self.config.session.host();
        let port = self.config.session.port();
        println!("⏳ 连接到 {}:{} ...", host, port);
        session
            .open()
            .with_context(|| format!("连接 {}:{} 失败", host, port))?;
        info!("Connected to {}:{}", host, port);
        println!("✅ 已连接");
        Ok(session)
    }

    /// 发送原始文本
    pub async fn send(&self, text: &str) -> Result<()> {
        let session = self.open_session()?;
        session.send_raw(text).context("发送失败")?;
        debug!("Sent raw text ({} bytes)", text.trim().len());
        println!("✅ 已发送: {}", text.trim());
        session.close();
        Ok(())
    }

    /// 按方向行驶一段时间后停止
    pub async fn drive(&self, symbol: char, duration: Duration) -> Result<()> {
        let session = self.open_session()?;

        session.handle_move_input(symbol).context("发送移动指令失败")?;
        println!("⏳ 行驶 {} ms ...", duration.as_millis());
        tokio::time::sleep(duration).await;

        let report = session.handle_stop_input();
        report.send_result.context("发送停止指令失败")?;
        info!(
            "Drive {:?} finished after {} ms, {:.1} cm",
            symbol,
            duration.as_millis(),
            report.segment_distance_cm
        );
        println!("🛑 已停止，本次行驶 {:.1} cm", report.segment_distance_cm);

        session.close();
        Ok(())
    }

    /// 打印事件直到 Ctrl+C、超时或连接断开
    pub async fn monitor(&self, duration: Option<Duration>) -> Result<()> {
        let session = self.open_session()?;
        let events = session.subscribe();
        let deadline = duration.map(|d| Instant::now() + d);

        println!("📊 监控中...");
        println!("按 Ctrl+C 停止\n");

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }

            let rx = events.clone();
            tokio::select! {
                _ = &mut ctrl_c => {
                    println!("\n收到退出信号，正在关闭...");
                    break;
                }
                received = tokio::task::spawn_blocking(move || rx.recv_timeout(EVENT_WAIT)) => {
                    match received {
                        Ok(Ok(event)) => {
                            println!("{}", output::format_event(&event));
                            if let LinkEvent::StateChanged { to, .. } = event {
                                if !to.is_connected() {
                                    warn!("Link left Connected state: {}", to);
                                    println!("⚠️  连接已断开");
                                    break;
                                }
                            }
                        }
                        Ok(Err(RecvTimeoutError::Timeout)) => {}
                        Ok(Err(RecvTimeoutError::Disconnected)) | Err(_) => break,
                    }
                }
            }
        }

        let metrics = session.metrics();
        info!("Monitor finished, {} telemetry frames", metrics.rx_telemetry);
        println!("\n{}", output::format_metrics(&metrics));
        session.close();
        println!("✅ 监控已结束");
        Ok(())
    }
}

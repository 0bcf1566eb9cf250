//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + 通道，保留历史记录，不阻塞 tokio。
//! 事件由单独的打印线程从订阅通道取出输出。

use crate::config::CliConfig;
use crate::output;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, bounded};
use rover_client::{ConnectionState, LinkEvent, Session, SessionBuilder};
use rover_driver::Connector;
use rustyline::Editor;
use std::thread;
use tracing::{debug, info, warn};

const HISTORY_FILE: &str = ".rover_history";

/// 输入线程用来表示 Ctrl+C 的特殊命令
const SIGINT: &str = "SIGINT";

/// 命令处理后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplFlow {
    Continue,
    Exit,
}

/// REPL 会话（在多次 connect/disconnect 之间保持同一个 Session）
pub struct ReplSession<C: Connector> {
    session: Session<C>,
}

impl<C: Connector> ReplSession<C> {
    pub fn new(session: Session<C>) -> Self {
        Self { session }
    }

    /// 连接（Failed 状态下先关闭再重连）
    pub fn connect(&self) -> Result<()> {
        match self.session.state() {
            ConnectionState::Connected => {
                println!("⚠️  已经连接");
                return Ok(());
            },
            ConnectionState::Failed => self.session.close(),
            ConnectionState::Connecting | ConnectionState::Disconnected => {},
        }

        let config = self.session.config();
        println!("⏳ 连接到 {}:{} ...", config.host(), config.port());
        self.session.open().context("连接失败")?;
        info!("REPL connected to {}:{}", config.host(), config.port());
        println!("✅ 已连接");
        Ok(())
    }

    pub fn disconnect(&self) {
        if self.session.state() == ConnectionState::Disconnected {
            println!("⚠️  未连接");
            return;
        }
        self.session.close();
        info!("REPL disconnected");
        println!("✅ 已断开");
    }

    /// 处理一个方向符号
    pub fn drive(&self, symbol: char) -> Result<()> {
        match self.session.handle_move_input(symbol)? {
            Some(intent) => {
                println!("➡️  {}", intent.label());
                Ok(())
            },
            None => anyhow::bail!("未知方向: {:?}", symbol),
        }
    }

    /// 停止（累计距离由事件线程输出）
    pub fn stop(&self) -> Result<()> {
        let report = self.session.handle_stop_input();
        report.send_result.context("停止指令发送失败")?;
        debug!("Stopped, segment {:.1} cm", report.segment_distance_cm);
        println!("🛑 已停止");
        Ok(())
    }

    pub fn send(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            anyhow::bail!("消息为空");
        }
        self.session.send_raw(text)?;
        println!("✅ 已发送");
        Ok(())
    }

    /// 清零链路统计（连接不受影响）
    pub fn reset_metrics(&self) {
        self.session.reset_metrics();
        println!("✅ 统计已清零");
    }

    pub fn print_status(&self) {
        println!("📊 状态: {}", self.session.state());
        println!("  累计行驶: {:.1} cm", self.session.total_distance_cm());
        println!("  运动中: {}", if self.session.is_moving() { "是" } else { "否" });
        println!("{}", output::format_telemetry(&self.session.telemetry()));
        println!("{}", output::format_metrics(&self.session.metrics()));
        if let Some(err) = self.session.last_error() {
            println!("  最近错误: {}", err);
        }
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }
}

/// 处理一行命令
pub fn handle_command<C: Connector>(line: &str, repl: &ReplSession<C>) -> Result<ReplFlow> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    if !head.is_empty() {
        debug!("REPL command: {}", head);
    }

    match head {
        "" => {},
        "exit" | "quit" => return Ok(ReplFlow::Exit),
        "help" => print_help(),
        "connect" => repl.connect()?,
        "disconnect" => repl.disconnect(),
        "status" => repl.print_status(),
        "reset" => repl.reset_metrics(),
        "stop" | SIGINT => repl.stop()?,
        "send" => repl.send(rest)?,
        "move" => {
            let mut chars = rest.chars();
            match (chars.next(), chars.next()) {
                (Some(symbol), None) => repl.drive(symbol)?,
                _ => anyhow::bail!("用法: move <w|s|a|d|x>"),
            }
        },
        _ => {
            let mut chars = head.chars();
            match (chars.next(), chars.next()) {
                (Some(symbol), None) if rest.is_empty() => repl.drive(symbol)?,
                _ => anyhow::bail!("未知命令: {}", head),
            }
        },
    }

    Ok(ReplFlow::Continue)
}

/// REPL 输入（专用输入线程）
pub struct ReplInput {
    command_rx: Receiver<String>,
    _input_thread: thread::JoinHandle<Result<()>>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    pub fn new() -> Self {
        let (command_tx, command_rx) = bounded::<String>(10);

        // Editor 在输入线程内创建，生命周期与 REPL 会话相同
        let input_thread = thread::spawn(move || {
            use rustyline::history::DefaultHistory;

            let mut rl = Editor::<(), DefaultHistory>::new()
                .map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;
            rl.load_history(HISTORY_FILE).ok();

            println!("Rover CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
            println!("输入 'help' 查看帮助，'exit' 退出");
            println!();

            loop {
                match rl.readline("rover> ") {
                    Ok(line) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }

                        if line == "exit" || line == "quit" {
                            rl.save_history(HISTORY_FILE).ok();
                            let _ = command_tx.send(line);
                            break;
                        }

                        let _ = rl.add_history_entry(line.clone());
                        if command_tx.send(line).is_err() {
                            break;
                        }
                    },

                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        // Ctrl+C：由主线程执行停止
                        println!("^C");
                        let _ = command_tx.send(SIGINT.to_string());
                    },

                    Err(rustyline::error::ReadlineError::Eof) => {
                        rl.save_history(HISTORY_FILE).ok();
                        break;
                    },

                    Err(err) => {
                        eprintln!("Error: {:?}", err);
                        break;
                    },
                }
            }

            Ok(())
        });

        Self {
            command_rx,
            _input_thread: input_thread,
        }
    }

    /// 等待用户输入（输入线程退出后返回 `None`）
    pub async fn recv_command(&self) -> Option<String> {
        let rx = self.command_rx.clone();
        tokio::task::spawn_blocking(move || rx.recv())
            .await
            .ok()
            .and_then(|result| result.ok())
    }
}

/// 事件打印线程（所有发送端释放后退出）
fn spawn_event_printer(events: Receiver<LinkEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for event in events.iter() {
            println!("{}", output::format_event(&event));
        }
    })
}

/// 运行 REPL 模式
pub async fn run_repl(config: CliConfig) -> Result<()> {
    let session = SessionBuilder::new()
        .config(config.session.clone())
        .polling(config.polling.to_polling_config())
        .build()
        .context("创建会话失败")?;
    let _printer = spawn_event_printer(session.subscribe());
    let repl = ReplSession::new(session);
    let input = ReplInput::new();

    println!();
    println!("💡 提示: 使用 'connect' 连接到小车，然后用 w/s/a/d 移动，x 停止");
    println!();

    loop {
        tokio::select! {
            line = input.recv_command() => {
                let Some(line) = line else { break };
                match handle_command(&line, &repl) {
                    Ok(ReplFlow::Exit) => {
                        println!("👋 再见！");
                        break;
                    }
                    Ok(ReplFlow::Continue) => {}
                    Err(err) => {
                        warn!("REPL command {:?} failed: {:#}", line, err);
                        eprintln!("❌ Error: {:#}", err);
                        print_help_hint(&line);
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n🛑 收到 Ctrl+C，停止并退出...");
                if repl.session().is_moving() {
                    let _ = repl.stop();
                }
                break;
            }
        }
    }

    repl.session().close();
    Ok(())
}

/// 打印帮助信息
fn print_help() {
    println!("可用命令:");
    println!("  connect                       连接到配置中的小车");
    println!("  disconnect                    断开连接");
    println!("  w / s / a / d                 前进 / 后退 / 左转 / 右转");
    println!("  x 或 stop                     停止（输出累计距离）");
    println!("  move <symbol>                 同上，显式形式");
    println!("  send <text>                   发送原始文本");
    println!("  status                        显示连接状态、遥测和统计");
    println!("  reset                         清零链路统计");
    println!("  help                          显示帮助");
    println!("  exit / quit                   退出");
    println!();
    println!("快捷键:");
    println!("  Ctrl+C                        停止");
    println!("  Ctrl+D                        退出");
    println!();
}

/// 提供基于错误的帮助提示
fn print_help_hint(command: &str) {
    if command.starts_with("move") {
        eprintln!("💡 提示: 使用 'move w' 或直接输入 'w' 前进");
    } else if command.starts_with("send") {
        eprintln!("💡 提示: 使用 'send CMD_BUZZER#1' 发送原始文本");
    } else {
        eprintln!("💡 提示: 输入 'help' 查看所有命令，未连接时先使用 'connect'");
    }
}

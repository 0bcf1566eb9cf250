//! 命令定义和实现

pub mod config;
pub mod monitor;
pub mod r#move;
pub mod send;

pub use config::ConfigCommand;
pub use monitor::MonitorCommand;
pub use r#move::MoveCommand;
pub use send::SendCommand;

//! 命令行集成测试
//!
//! 配置命令只读写临时目录；发送命令连到测试内启动的本地 TCP 服务器。

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

fn rover_cli() -> Command {
    let mut cmd = Command::cargo_bin("rover-cli").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    rover_cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("shell"))
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("send"));
}

#[test]
fn test_config_path_honours_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rover.toml");

    rover_cli()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("rover.toml"));
}

#[test]
fn test_config_set_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rover.toml");

    rover_cli()
        .arg("--config")
        .arg(&path)
        .args(["config", "set", "--host", "10.0.0.5", "--port", "6000", "--servo-sweep", "false"])
        .assert()
        .success();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("host = \"10.0.0.5\""));
    assert!(content.contains("servo_sweep = false"));

    rover_cli()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("10.0.0.5:6000"))
        .stdout(predicate::str::contains("servo_sweep: false"));
}

#[test]
fn test_config_set_rejects_zero_port() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rover.toml");

    rover_cli()
        .arg("--config")
        .arg(&path)
        .args(["config", "set", "--port", "0"])
        .assert()
        .failure();
    assert!(!path.exists());
}

#[test]
fn test_move_rejects_unknown_direction() {
    let dir = tempfile::tempdir().unwrap();
    rover_cli()
        .arg("--config")
        .arg(dir.path().join("rover.toml"))
        .args(["move", "q"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("未知方向"));
}

#[test]
fn test_send_writes_frame_to_server() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).unwrap();
        line
    });

    let dir = tempfile::tempdir().unwrap();
    rover_cli()
        .arg("--config")
        .arg(dir.path().join("rover.toml"))
        .args(["send", "--host", "127.0.0.1", "--port", &port.to_string(), "--no-poll"])
        .arg("CMD_BUZZER#1")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("已发送: CMD_BUZZER#1"));

    assert_eq!(server.join().unwrap(), "CMD_BUZZER#1\r\n");
}

#[test]
fn test_send_fails_when_nothing_listens() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let dir = tempfile::tempdir().unwrap();
    rover_cli()
        .arg("--config")
        .arg(dir.path().join("rover.toml"))
        .args(["send", "--host", "127.0.0.1", "--port", &port.to_string(), "--no-poll"])
        .arg("CMD_SONIC")
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("连接 127.0.0.1"));
}

//! 连接管理器集成测试
//!
//! 使用 Mock 传输验证状态机、收发路径与轮询的联动。

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rover_driver::scheduler::{
    CPU_LOAD_TASK, PollKind, SERVO_SWEEP_TASK, SONIC_TASK, TEMPERATURE_TASK,
};
use rover_driver::{
    ConnectionManager, ConnectionState, DriverError, LinkEvent, PipelineConfig, PollingConfig,
};
use rover_protocol::{Command, MotionIntent, TelemetryEvent};
use rover_transport::{Endpoint, MockConnector, MockPeer};
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

fn endpoint() -> Endpoint {
    Endpoint::new("10.0.0.5", 5000)
}

fn link_with(polling: PollingConfig) -> (ConnectionManager<MockConnector>, MockPeer) {
    let (connector, peer) = MockConnector::new();
    let link = ConnectionManager::new(connector, polling, PipelineConfig::default()).unwrap();
    (link, peer)
}

/// 等待条件成立
fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// 取下一个遥测事件（跳过状态事件）
fn next_telemetry(events: &Receiver<LinkEvent>) -> Option<TelemetryEvent> {
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match events.recv_timeout(remaining) {
            Ok(LinkEvent::Telemetry(event)) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

#[test]
fn test_end_to_end_open_and_receive() {
    let (link, peer) = link_with(PollingConfig::default());
    let events = link.subscribe();

    link.open(&endpoint()).unwrap();
    assert_eq!(link.state(), ConnectionState::Connected);
    assert_eq!(peer.last_endpoint(), Some(endpoint()));
    for name in [SONIC_TASK, TEMPERATURE_TASK, CPU_LOAD_TASK, SERVO_SWEEP_TASK] {
        assert!(link.with_scheduler(|s| s.is_enabled(name)), "{name} not enabled");
    }

    assert_eq!(
        events.recv_timeout(WAIT).unwrap(),
        LinkEvent::StateChanged {
            from: ConnectionState::Disconnected,
            to: ConnectionState::Connecting
        }
    );
    assert_eq!(
        events.recv_timeout(WAIT).unwrap(),
        LinkEvent::StateChanged {
            from: ConnectionState::Connecting,
            to: ConnectionState::Connected
        }
    );

    peer.push_inbound("CMD_TEMPERATURE#36.7\n");
    peer.push_inbound("CMD_CPU_LOAD#2\n");

    assert_eq!(next_telemetry(&events), Some(TelemetryEvent::Temperature(36.7)));
    assert_eq!(next_telemetry(&events), Some(TelemetryEvent::CpuLoad(2.0)));

    let snapshot = link.telemetry();
    assert_eq!(snapshot.temperature_c.map(|r| r.value), Some(36.7));
    assert_eq!(snapshot.cpu_load_pct.map(|r| r.value), Some(2.0));

    link.close();
}

#[test]
fn test_split_frame_decoded_once() {
    let (link, peer) = link_with(PollingConfig::empty());
    let events = link.subscribe();
    link.open(&endpoint()).unwrap();

    peer.push_inbound("CMD_MODED#3#1");
    std::thread::sleep(Duration::from_millis(20));
    peer.push_inbound("2.50\r\nCMD_TEMP");

    assert_eq!(next_telemetry(&events), Some(TelemetryEvent::Distance(12.5)));
    std::thread::sleep(Duration::from_millis(20));
    assert!(events.try_iter().all(|e| !matches!(e, LinkEvent::Telemetry(_))));
    assert_eq!(link.metrics().rx_telemetry, 1);

    link.close();
}

#[test]
fn test_malformed_and_unknown_frames_are_dropped() {
    let (link, peer) = link_with(PollingConfig::empty());
    let events = link.subscribe();
    link.open(&endpoint()).unwrap();

    peer.push_inbound("CMD_MODE#bad\nCMD_POWER#7.4\nCMD_TEMPERATURE#x\nCMD_MODED#3#40.0\n");
    assert_eq!(next_telemetry(&events), Some(TelemetryEvent::Distance(40.0)));

    let metrics = link.metrics();
    assert_eq!(metrics.rx_frames, 4);
    assert_eq!(metrics.rx_decode_errors, 2);
    assert_eq!(metrics.rx_unrecognized, 1);
    assert_eq!(link.state(), ConnectionState::Connected);

    link.close();
}

#[test]
fn test_send_writes_one_frame() {
    let (link, peer) = link_with(PollingConfig::empty());
    link.open(&endpoint()).unwrap();

    link.send(&Command::from(MotionIntent::Forward)).unwrap();
    link.send_raw("HELLO ROBOT").unwrap();

    assert_eq!(
        peer.written(),
        vec!["CMD_M_MOTOR#0#800#0#0\r\n", "HELLO ROBOT\r\n"]
    );
    assert_eq!(link.metrics().tx_user_frames(), 2);

    link.close();
}

#[test]
fn test_send_while_disconnected_writes_nothing() {
    let (link, peer) = link_with(PollingConfig::default());
    assert_eq!(
        link.send(&Command::sonic()),
        Err(DriverError::NotConnected {
            state: ConnectionState::Disconnected
        })
    );
    assert_eq!(peer.write_attempts(), 0);
}

#[test]
fn test_peer_eof_disconnects_and_disables_polling_once() {
    let (link, peer) = link_with(PollingConfig::default());
    let events = link.subscribe();
    link.open(&endpoint()).unwrap();

    peer.close();
    assert!(wait_until(|| link.state() == ConnectionState::Disconnected));
    assert!(wait_until(|| !link.is_io_alive()));

    assert_eq!(link.with_scheduler(|s| s.active_timer_count()), 0);
    assert_eq!(link.metrics().poll_disables, 1);
    assert!(events.try_iter().any(|e| e
        == LinkEvent::StateChanged {
            from: ConnectionState::Connected,
            to: ConnectionState::Disconnected
        }));

    assert!(matches!(
        link.send(&Command::sonic()),
        Err(DriverError::NotConnected { .. })
    ));

    // 对端关闭后可以直接重新打开
    link.open(&endpoint()).unwrap();
    assert_eq!(link.state(), ConnectionState::Connected);
    link.close();
    assert_eq!(link.metrics().poll_disables, 2);
}

#[test]
fn test_write_error_fails_link() {
    let (link, peer) = link_with(PollingConfig::empty());
    link.open(&endpoint()).unwrap();

    peer.set_fail_writes(true);
    let err = link.send(&Command::temperature()).unwrap_err();
    assert!(matches!(err, DriverError::TransportWrite(_)));
    assert_eq!(link.state(), ConnectionState::Failed);
    assert!(link.last_error().is_some());
    assert_eq!(link.metrics().write_errors, 1);

    assert!(matches!(
        link.send(&Command::temperature()),
        Err(DriverError::NotConnected {
            state: ConnectionState::Failed
        })
    ));

    link.close();
    assert_eq!(link.state(), ConnectionState::Disconnected);
}

#[test]
fn test_poll_write_error_fails_link_at_tick_boundary() {
    let polling =
        PollingConfig::empty().with_task(SONIC_TASK, Duration::from_millis(5), PollKind::Sonic);
    let (link, peer) = link_with(polling);
    let events = link.subscribe();

    peer.set_fail_writes(true);
    link.open(&endpoint()).unwrap();

    assert!(wait_until(|| link.state() == ConnectionState::Failed));
    assert!(wait_until(|| !link.is_io_alive()));
    assert_eq!(link.with_scheduler(|s| s.active_timer_count()), 0);

    let metrics = link.metrics();
    assert_eq!(metrics.poll_disables, 1);
    assert_eq!(metrics.write_errors, 1);
    assert_eq!(metrics.tx_poll_frames, 0);
    assert!(link.last_error().unwrap().contains("write error"));

    let transitions: Vec<_> = events
        .try_iter()
        .filter_map(|e| match e {
            LinkEvent::StateChanged { from, to } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions.last(),
        Some(&(ConnectionState::Connected, ConnectionState::Failed))
    );

    link.close();
    assert_eq!(link.state(), ConnectionState::Disconnected);
}

#[test]
fn test_oversized_poll_interval_rejected_before_open() {
    let (connector, peer) = MockConnector::new();
    let polling = PollingConfig::empty().with_task(SONIC_TASK, Duration::MAX, PollKind::Sonic);
    let result = ConnectionManager::new(connector, polling, PipelineConfig::default());
    assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    assert_eq!(peer.connect_count(), 0);
}

#[test]
fn test_read_error_fails_link() {
    let (link, peer) = link_with(PollingConfig::default());
    link.open(&endpoint()).unwrap();

    peer.fail_read(std::io::ErrorKind::ConnectionReset);
    assert!(wait_until(|| link.state() == ConnectionState::Failed));
    assert!(link.last_error().unwrap().contains("read error"));
    assert_eq!(link.with_scheduler(|s| s.active_timer_count()), 0);

    link.close();
}

#[test]
fn test_reopen_keeps_one_timer_per_task() {
    let (link, peer) = link_with(PollingConfig::default());

    link.open(&endpoint()).unwrap();
    link.close();
    link.open(&endpoint()).unwrap();

    link.with_scheduler(|s| {
        assert_eq!(s.active_timer_count(), s.tasks().len());
        assert!(s.tasks().iter().all(|t| t.is_enabled()));
    });
    assert_eq!(peer.connect_count(), 2);
    assert_eq!(link.metrics().poll_enables, 2);

    link.close();
}

#[test]
fn test_polling_writes_while_connected() {
    let polling = PollingConfig::empty()
        .with_task(SONIC_TASK, Duration::from_millis(10), PollKind::Sonic)
        .with_task(
            SERVO_SWEEP_TASK,
            Duration::from_millis(10),
            PollKind::ServoSweep(Default::default()),
        );
    let (link, peer) = link_with(polling);
    link.open(&endpoint()).unwrap();

    let lines = peer.wait_for_written(WAIT, |lines| {
        lines.iter().any(|l| l == "CMD_SERVO#0#50")
    });
    assert!(lines.iter().any(|l| l == "CMD_SONIC"));
    let servo: Vec<_> = lines.iter().filter(|l| l.starts_with("CMD_SERVO")).collect();
    assert_eq!(servo[0], "CMD_SERVO#0#45");
    assert_eq!(servo[1], "CMD_SERVO#0#50");
    assert!(link.metrics().tx_poll_frames >= 3);

    link.close();
}

#[test]
fn test_no_poll_write_after_close() {
    let polling =
        PollingConfig::empty().with_task(SONIC_TASK, Duration::from_millis(5), PollKind::Sonic);
    let (link, peer) = link_with(polling);
    link.open(&endpoint()).unwrap();

    peer.wait_for_written(WAIT, |lines| lines.len() >= 2);
    link.close();
    let after_close = peer.write_attempts();

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(peer.write_attempts(), after_close);
    assert_eq!(peer.shutdown_count(), 1);
}

#[test]
fn test_send_from_callback_would_deadlock() {
    let (link, peer) = link_with(PollingConfig::empty());
    let link = Arc::new(link);
    let result: Arc<Mutex<Option<Result<(), DriverError>>>> = Arc::new(Mutex::new(None));

    let weak = Arc::downgrade(&link);
    let slot = result.clone();
    link.add_callback(Arc::new(move |event: &LinkEvent| {
        if let (LinkEvent::Telemetry(_), Some(link)) = (event, weak.upgrade()) {
            *slot.lock() = Some(link.send(&Command::sonic()));
        }
    }));

    link.open(&endpoint()).unwrap();
    peer.push_inbound("CMD_TEMPERATURE#20\n");

    assert!(wait_until(|| result.lock().is_some()));
    assert_eq!(*result.lock(), Some(Err(DriverError::WouldDeadlock)));
    assert!(peer.written().is_empty());

    link.close();
}

#[test]
fn test_close_from_callback() {
    let (link, peer) = link_with(PollingConfig::default());
    let link = Arc::new(link);

    let weak = Arc::downgrade(&link);
    link.add_callback(Arc::new(move |event: &LinkEvent| {
        if let (LinkEvent::Telemetry(TelemetryEvent::Distance(d)), Some(link)) =
            (event, weak.upgrade())
            && *d < 5.0
        {
            link.close();
        }
    }));

    link.open(&endpoint()).unwrap();
    peer.push_inbound("CMD_MODED#3#2.0\n");

    assert!(wait_until(|| link.state() == ConnectionState::Disconnected));
    assert!(wait_until(|| !link.is_io_alive()));

    // 回调中关闭后可以重新打开
    link.open(&endpoint()).unwrap();
    assert_eq!(link.state(), ConnectionState::Connected);
    link.close();
}

#[test]
fn test_drop_closes_transport() {
    let (link, peer) = link_with(PollingConfig::default());
    link.open(&endpoint()).unwrap();
    drop(link);
    assert_eq!(peer.shutdown_count(), 1);
    assert!(!peer.is_connected());
}

//! 会话门面集成测试
//!
//! Mock 传输 + 手动时钟，验证输入到指令、距离估算和事件发布。

use rover_client::{
    ConnectionState, DriverError, LinkEvent, ManualClock, MotionIntent, Session, SessionBuilder,
    SessionConfig, TelemetryEvent,
};
use rover_driver::PollingConfig;
use rover_transport::{MockConnector, MockPeer};
use std::sync::Arc;
use std::time::Duration;

fn session() -> (Session<MockConnector>, MockPeer, Arc<ManualClock>) {
    let (connector, peer) = MockConnector::new();
    let clock = Arc::new(ManualClock::new(1_000));
    let session = SessionBuilder::new()
        .config(SessionConfig::new("10.0.0.5", 5000).with_nominal_speed(20.0))
        .polling(PollingConfig::empty())
        .clock(clock.clone())
        .build_with(connector)
        .unwrap();
    (session, peer, clock)
}

#[test]
fn test_distance_over_two_movements() {
    let (session, peer, clock) = session();
    let events = session.subscribe();
    session.open().unwrap();

    assert_eq!(session.handle_move_input('w').unwrap(), Some(MotionIntent::Forward));
    clock.advance_ms(2_500);
    let report = session.handle_stop_input();
    assert_eq!(report.total_distance_cm, 50.0);
    assert_eq!(report.segment_distance_cm, 50.0);
    assert_eq!(report.send_result, Ok(()));

    assert_eq!(session.handle_move_input('d').unwrap(), Some(MotionIntent::TurnRight));
    clock.advance_ms(1_000);
    let report = session.handle_stop_input();
    assert_eq!(report.total_distance_cm, 70.0);
    assert_eq!(report.segment_distance_cm, 20.0);
    assert_eq!(session.total_distance_cm(), 70.0);

    assert_eq!(
        peer.written_lines(),
        vec![
            "CMD_M_MOTOR#0#800#0#0",
            "CMD_M_MOTOR#0#0#0#0",
            "CMD_M_MOTOR#0#0#-90#800",
            "CMD_M_MOTOR#0#0#0#0",
        ]
    );

    let ended: Vec<f64> = events
        .try_iter()
        .filter_map(|e| match e {
            LinkEvent::MovementEnded { total_distance_cm } => Some(total_distance_cm),
            _ => None,
        })
        .collect();
    assert_eq!(ended, vec![50.0, 70.0]);

    session.close();
}

#[test]
fn test_held_key_does_not_restart_timer() {
    let (session, _peer, clock) = session();
    session.open().unwrap();

    session.handle_move_input('w').unwrap();
    clock.advance_ms(400);
    session.handle_move_input('w').unwrap();
    clock.advance_ms(600);
    assert_eq!(session.handle_stop_input().total_distance_cm, 20.0);

    session.close();
}

#[test]
fn test_unknown_symbol_sends_nothing() {
    let (session, peer, _clock) = session();
    session.open().unwrap();

    assert_eq!(session.handle_move_input('q'), Ok(None));
    assert_eq!(session.handle_key_code(13), Ok(None));
    assert!(peer.written().is_empty());
    assert!(!session.is_moving());

    session.close();
}

#[test]
fn test_stop_symbol_routes_to_stop() {
    let (session, peer, clock) = session();
    session.open().unwrap();

    assert_eq!(session.handle_key_code(87), Ok(Some(MotionIntent::Forward)));
    clock.advance_ms(1_000);
    assert_eq!(session.handle_move_input('x'), Ok(Some(MotionIntent::Stop)));

    assert!(!session.is_moving());
    assert_eq!(session.total_distance_cm(), 20.0);
    assert_eq!(peer.written_lines().last().map(String::as_str), Some("CMD_M_MOTOR#0#0#0#0"));

    session.close();
}

#[test]
fn test_move_while_disconnected_still_starts_timer() {
    let (session, peer, clock) = session();

    let err = session.handle_move_input('s').unwrap_err();
    assert_eq!(
        err,
        DriverError::NotConnected {
            state: ConnectionState::Disconnected
        }
    );
    assert!(session.is_moving());

    clock.advance_ms(500);
    let report = session.handle_stop_input();
    assert_eq!(report.total_distance_cm, 10.0);
    assert!(matches!(report.send_result, Err(DriverError::NotConnected { .. })));
    assert_eq!(peer.write_attempts(), 0);
}

#[test]
fn test_send_raw_trims_and_skips_empty() {
    let (session, peer, _clock) = session();
    session.open().unwrap();

    session.send_raw("   ").unwrap();
    session.send_raw("  CMD_BUZZER#1  ").unwrap();

    assert_eq!(peer.written(), vec!["CMD_BUZZER#1\r\n"]);

    session.close();
}

#[test]
fn test_telemetry_reaches_subscriber_and_snapshot() {
    let (session, peer, _clock) = session();
    let events = session.subscribe();
    session.open().unwrap();

    peer.push_inbound("CMD_MODED#3#12.50\r\n");

    let event = loop {
        match events.recv_timeout(Duration::from_secs(2)).unwrap() {
            LinkEvent::Telemetry(event) => break event,
            _ => continue,
        }
    };
    assert_eq!(event, TelemetryEvent::Distance(12.5));
    assert_eq!(session.telemetry().distance_cm.map(|r| r.value), Some(12.5));

    session.close();
}

#[test]
fn test_open_uses_config_endpoint_and_reopens() {
    let (session, peer, _clock) = session();
    session.open().unwrap();
    assert_eq!(peer.last_endpoint().map(|e| e.to_string()), Some("10.0.0.5::5000".to_string()));

    session.close();
    assert_eq!(session.state(), ConnectionState::Disconnected);
    session.open().unwrap();
    assert_eq!(session.state(), ConnectionState::Connected);
    assert_eq!(peer.connect_count(), 2);

    session.close();
    std::thread::sleep(Duration::from_millis(5));
    assert!(!peer.is_connected());
}

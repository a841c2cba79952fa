//! Tests requiring actual serial hardware.
//!
//! These tests are skipped if no hardware is available.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! # Set environment variables
//! export TEST_PORT=COM3                  # or /dev/ttyUSB0 on Linux
//! export TEST_BAUD=9600                  # optional, default: 9600
//! export TEST_LOOPBACK=1                 # if port has TX-RX loopback
//!
//! # Run tests
//! cargo test --test integration_hardware -- --ignored
//! ```
//!
//! # Hardware Requirements
//!
//! - **Real port tests**: Any available serial port
//! - **Loopback tests**: Port with TX and RX connected together

use super::utils::{
    hardware_registry, is_port_available, print_available_ports, TimingHelper, WaitingSink,
};
use crate::common::options;
use serde_json::json;
use serial_hub::{ConnectionId, HubError, PortData, SyncSerialPort, Transport};
use std::time::Duration;

const ARRIVAL_TIMEOUT: Duration = Duration::from_secs(2);

#[test]
#[ignore] // Run with --ignored flag
fn test_real_port_open_close() {
    let config = crate::skip_without_hardware!();
    println!("Testing port: {} at {} baud", config.port_name, config.baud_rate);

    let mut port = SyncSerialPort::new(&config.port_name)
        .with_read_timeout(Duration::from_millis(100));
    port.open().expect("port should open");
    port.apply_port_settings(&config.to_port_settings())
        .expect("settings should apply");
    assert!(port.is_open());

    port.close().expect("port should close");
    assert!(!port.is_open());
    port.close().expect("closing twice is a no-op");
}

#[test]
#[ignore]
fn test_real_port_shared_listeners() {
    let config = crate::skip_without_hardware!();
    let registry = hardware_registry();
    let first = ConnectionId::new();
    let second = ConnectionId::new();

    let opening = options(config.options_json(json!({"untilNewline": true})), true);
    registry
        .start_listening(&first, WaitingSink::new(), &config.port_name, Some(&opening))
        .expect("first listener opens the port");
    registry
        .start_listening(&second, WaitingSink::new(), &config.port_name, None)
        .expect("second listener joins");
    assert_eq!(registry.listener_count(&config.port_name), 2);

    let status = registry.status(&config.port_name).expect("port is open");
    assert_eq!(status.settings.baud_rate, config.baud_rate);

    registry.stop_listening(&first, &config.port_name);
    assert!(registry.is_port_open(&config.port_name));
    registry.stop_listening(&second, &config.port_name);
    assert!(!registry.is_port_open(&config.port_name));
}

#[test]
#[ignore]
fn test_real_port_rejects_different_baud() {
    let config = crate::skip_without_hardware!();
    let registry = hardware_registry();
    let owner = ConnectionId::new();

    let opening = options(json!({"baudRate": config.baud_rate}), true);
    registry
        .start_listening(&owner, WaitingSink::new(), &config.port_name, Some(&opening))
        .expect("port opens");

    let other_baud = if config.baud_rate == 19200 { 9600 } else { 19200 };
    let joining = options(json!({"baudRate": other_baud}), false);
    let result = registry.start_listening(
        &ConnectionId::new(),
        WaitingSink::new(),
        &config.port_name,
        Some(&joining),
    );
    assert!(matches!(result, Err(HubError::Incompatible { .. })));

    registry.shutdown();
}

#[test]
#[ignore]
fn test_loopback_newline_framing() {
    let config = crate::skip_without_loopback!();
    let registry = hardware_registry();
    let client = ConnectionId::new();
    let sink = WaitingSink::new();

    let opening = options(config.options_json(json!({"untilNewline": true})), true);
    registry
        .start_listening(&client, sink.clone(), &config.port_name, Some(&opening))
        .expect("port opens");

    let timer = TimingHelper::new("loopback round trip");
    registry
        .send_data(&client, &config.port_name, &PortData::from("ping\r\npong\r\n"), None)
        .expect("write succeeds");

    let messages = sink.wait_for(2, ARRIVAL_TIMEOUT);
    timer.finish();
    assert_eq!(messages, vec!["ping".to_string(), "pong".to_string()]);

    registry.shutdown();
}

#[test]
#[ignore]
fn test_loopback_length_prefixed_framing() {
    let config = crate::skip_without_loopback!();
    let registry = hardware_registry();
    let client = ConnectionId::new();
    let sink = WaitingSink::new();

    let rx = json!({"start": "\u{0002}", "lengthBytes": {"index": 0, "length": 1}});
    let opening = options(config.options_json(rx), true);
    registry
        .start_listening(&client, sink.clone(), &config.port_name, Some(&opening))
        .expect("port opens");

    registry
        .send_data(
            &client,
            &config.port_name,
            &PortData::Bytes(vec![0x02, 0x03, b'A', b'B', b'C']),
            None,
        )
        .expect("write succeeds");

    assert_eq!(sink.wait_for(1, ARRIVAL_TIMEOUT), vec!["ABC".to_string()]);
    registry.shutdown();
}

#[test]
#[ignore]
fn test_port_listed_by_system() {
    let config = crate::skip_without_hardware!();
    print_available_ports();
    assert!(
        is_port_available(&config.port_name),
        "{} should be reported by the system",
        config.port_name
    );
}

#[test]
fn test_missing_port_fails_to_open() {
    let registry = hardware_registry();
    let client = ConnectionId::new();

    let result = registry.start_listening(&client, WaitingSink::new(), "/dev/serial-hub-missing", None);
    assert!(matches!(result, Err(HubError::Transport { .. })));
    assert!(!registry.is_port_open("/dev/serial-hub-missing"));
    assert_eq!(registry.connection_count(), 0);
}

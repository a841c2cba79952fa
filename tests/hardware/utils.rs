//! Utility functions for hardware testing.
//!
//! Provides helpers for port discovery, test setup/teardown, and timing utilities.

use parking_lot::{Condvar, Mutex};
use serial_hub::{
    DeliveryError, NotificationSink, PortRegistry, PortSettings, SerialTransportFactory,
};
use serialport::{available_ports, SerialPortInfo, SerialPortType};
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Test port configuration from environment.
pub struct TestPortConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub loopback_enabled: bool,
}

impl TestPortConfig {
    /// Get test configuration from environment variables.
    pub fn from_env() -> Option<Self> {
        let port_name = env::var("TEST_PORT").ok()?;
        let baud_rate = env::var("TEST_BAUD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600);
        let loopback_enabled = env::var("TEST_LOOPBACK").ok().as_deref() == Some("1");

        Some(TestPortConfig {
            port_name,
            baud_rate,
            loopback_enabled,
        })
    }

    /// Line settings for the test port.
    pub fn to_port_settings(&self) -> PortSettings {
        PortSettings {
            baud_rate: self.baud_rate,
            ..PortSettings::default()
        }
    }

    /// Client options opening the port at the configured baud rate.
    pub fn options_json(&self, rx: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "baudRate": self.baud_rate, "rx": rx })
    }
}

/// Registry over real serial ports with a short read timeout.
pub fn hardware_registry() -> PortRegistry {
    PortRegistry::new(SerialTransportFactory {
        read_timeout: Duration::from_millis(100),
        ..SerialTransportFactory::default()
    })
}

/// Discover all available serial ports on the system.
pub fn discover_available_ports() -> Vec<SerialPortInfo> {
    available_ports().unwrap_or_default()
}

/// Find USB serial ports (excludes Bluetooth and other types).
pub fn discover_usb_ports() -> Vec<SerialPortInfo> {
    discover_available_ports()
        .into_iter()
        .filter(|port| matches!(port.port_type, SerialPortType::UsbPort(_)))
        .collect()
}

/// Print available ports for debugging.
pub fn print_available_ports() {
    let ports = discover_available_ports();

    if ports.is_empty() {
        println!("No serial ports detected on this system");
        return;
    }

    println!("Available serial ports ({}):", ports.len());
    for (idx, port) in ports.iter().enumerate() {
        println!("  {}. {}", idx + 1, port.port_name);
        if let SerialPortType::UsbPort(usb_info) = &port.port_type {
            println!("     VID:PID = {:04x}:{:04x}", usb_info.vid, usb_info.pid);
            if let Some(ref manufacturer) = usb_info.manufacturer {
                println!("     Manufacturer: {}", manufacturer);
            }
        }
    }
}

/// Check if a specific port is available.
pub fn is_port_available(port_name: &str) -> bool {
    discover_available_ports()
        .iter()
        .any(|p| p.port_name == port_name)
}

/// Sink that collects messages and lets a test wait for them.
#[derive(Default)]
pub struct WaitingSink {
    messages: Mutex<Vec<String>>,
    arrived: Condvar,
}

impl WaitingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait until at least `count` messages arrived or `timeout` elapsed.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        let mut messages = self.messages.lock();
        while messages.len() < count {
            if self.arrived.wait_until(&mut messages, deadline).timed_out() {
                break;
            }
        }
        messages.clone()
    }
}

impl NotificationSink for WaitingSink {
    fn deliver(&self, _port_name: &str, message: &str) -> Result<(), DeliveryError> {
        self.messages.lock().push(message.to_string());
        self.arrived.notify_all();
        Ok(())
    }
}

/// Timing helper for measuring operation duration.
pub struct TimingHelper {
    start: Instant,
    name: String,
}

impl TimingHelper {
    pub fn new(name: &str) -> Self {
        println!("Starting: {}", name);
        TimingHelper {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        println!("Completed: {} in {:?}", self.name, elapsed);
        elapsed
    }
}

/// Skip test with a clear message if hardware is not available.
#[macro_export]
macro_rules! skip_without_hardware {
    () => {
        match $crate::hardware::utils::TestPortConfig::from_env() {
            Some(config) => config,
            None => {
                println!("Skipping: TEST_PORT environment variable not set");
                println!("   Set TEST_PORT=COM3 (or /dev/ttyUSB0) to run hardware tests");
                return;
            }
        }
    };
}

/// Skip test with a clear message if loopback is not enabled.
#[macro_export]
macro_rules! skip_without_loopback {
    () => {{
        let config = $crate::skip_without_hardware!();
        if !config.loopback_enabled {
            println!("Skipping: TEST_LOOPBACK not set to 1");
            println!("   This test requires a loopback adapter (TX connected to RX)");
            return;
        }
        config
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_ports() {
        // Should not panic
        let ports = discover_available_ports();
        println!("Found {} ports", ports.len());
    }

    #[test]
    fn test_discover_usb_ports() {
        let usb_ports = discover_usb_ports();
        assert!(usb_ports.len() <= discover_available_ports().len());
    }

    #[test]
    fn test_timing_helper() {
        let timer = TimingHelper::new("test operation");
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.finish();
        assert!(elapsed >= Duration::from_millis(10));
    }

    #[test]
    fn test_waiting_sink_times_out() {
        let sink = WaitingSink::new();
        sink.deliver("COM1", "one").unwrap();
        let messages = sink.wait_for(2, Duration::from_millis(20));
        assert_eq!(messages, vec!["one".to_string()]);
    }
}

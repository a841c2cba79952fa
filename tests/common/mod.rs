//! Shared test utilities for serial-hub tests.
//!
//! This module provides common test infrastructure including:
//! - A recording notification sink that can be told to fail
//! - A registry harness backed by mock transports
//! - Option builders from JSON

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::Value;
use serial_hub::{
    ConnectionId, DeliveryError, HubResult, MockTransport, MockTransportFactory, NotificationSink,
    PortRegistry, SerialOptions,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sink that records every delivered message.
#[derive(Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A sink whose deliveries fail from the start.
    pub fn failing() -> Arc<Self> {
        let sink = Self::new();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delivered messages, in order.
    pub fn messages(&self) -> Vec<String> {
        self.deliveries.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Delivered `(port, message)` pairs, in order.
    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().len()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, port_name: &str, message: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::new("connection reset"));
        }
        self.deliveries
            .lock()
            .push((port_name.to_string(), message.to_string()));
        Ok(())
    }
}

/// Parse options the way a request handler would.
pub fn options(json: Value, opening: bool) -> SerialOptions {
    SerialOptions::parse(&json, opening).0
}

/// Registry wired to mock transports.
pub struct Harness {
    pub registry: PortRegistry,
    pub factory: MockTransportFactory,
}

impl Harness {
    pub fn new() -> Self {
        let factory = MockTransportFactory::new();
        let registry = PortRegistry::new(factory.clone());
        Self { registry, factory }
    }

    pub fn with_registry(build: impl FnOnce(MockTransportFactory) -> PortRegistry) -> Self {
        let factory = MockTransportFactory::new();
        let registry = build(factory.clone());
        Self { registry, factory }
    }

    /// Start listening with JSON options, parsed as opening options when the
    /// port is not open yet.
    pub fn listen(
        &self,
        connection: &ConnectionId,
        sink: Arc<dyn NotificationSink>,
        port: &str,
        json: Option<Value>,
    ) -> HubResult<bool> {
        let opening = !self.registry.is_port_open(port);
        let parsed = json.map(|json| options(json, opening));
        self.registry
            .start_listening(connection, sink, port, parsed.as_ref())
    }

    /// The mock transport most recently created for `port`.
    pub fn transport(&self, port: &str) -> MockTransport {
        self.factory
            .transport(port)
            .unwrap_or_else(|| panic!("no transport created for {}", port))
    }

    /// Simulate the device on `port` sending `bytes`.
    pub fn inject(&self, port: &str, bytes: &[u8]) {
        assert!(
            self.transport(port).inject(bytes),
            "port {} is not listening",
            port
        );
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

//! Mock transport implementation for testing.
//!
//! Provides a `MockTransport` that simulates a port without requiring actual
//! hardware. Bytes "received" by the device are injected by the test and handed
//! to the listener synchronously, on the injecting thread.

use super::error::PortError;
use super::traits::{ByteHandler, PortSettings, Transport, TransportFactory};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Inner state of the mock port, protected by a mutex for interior mutability.
#[derive(Default)]
struct MockPortState {
    open: bool,
    /// Settings applied by the last `apply_port_settings`.
    applied: Option<PortSettings>,
    handler: Option<ByteHandler>,
    /// Log of all bytes written to the port.
    write_log: Vec<Vec<u8>>,
    open_calls: usize,
    close_calls: usize,
    fail_open: bool,
    fail_writes: bool,
    fail_close: bool,
}

/// Mock transport for testing.
///
/// Clones share state, so a test can keep a handle while the shared port owns
/// another one.
///
/// # Example
/// ```
/// use serial_hub::port::{MockTransport, Transport};
/// use std::sync::{Arc, Mutex};
///
/// let mock = MockTransport::new("MOCK0");
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let mut transport = mock.clone();
/// transport.open().unwrap();
/// let sink = Arc::clone(&seen);
/// transport
///     .listen(Arc::new(move |bytes: &[u8]| sink.lock().unwrap().extend_from_slice(bytes)))
///     .unwrap();
///
/// mock.inject(b"Hello");
/// assert_eq!(&*seen.lock().unwrap(), b"Hello");
///
/// transport.write_bytes(b"Response").unwrap();
/// assert_eq!(mock.get_write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockTransport {
    /// The port name/identifier.
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockTransport {
    /// Create a new closed mock transport with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// Simulate the device sending `data`.
    ///
    /// Returns false when nobody is listening (closed port or no handler).
    pub fn inject(&self, data: &[u8]) -> bool {
        let handler = {
            let state = self.state.lock();
            if !state.open {
                return false;
            }
            state.handler.clone()
        };
        match handler {
            Some(handler) => {
                handler(data);
                true
            }
            None => false,
        }
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }

    pub fn applied_settings(&self) -> Option<PortSettings> {
        self.state.lock().applied
    }

    pub fn open_calls(&self) -> usize {
        self.state.lock().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    /// Make the next `open` calls fail with `NotFound`.
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make writes fail with a broken-pipe I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Make `close` report an error (the port still ends up closed).
    pub fn set_fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(PortError::not_found(&self.name));
        }
        if state.open {
            return Err(PortError::AlreadyOpen);
        }
        state.open = true;
        state.open_calls += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn apply_port_settings(&mut self, settings: &PortSettings) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        state.applied = Some(*settings);
        Ok(())
    }

    fn listen(&mut self, handler: ByteHandler) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        state.handler = Some(handler);
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        if state.fail_writes {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device disconnected",
            )));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn close(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if !state.open {
            return Ok(());
        }
        state.open = false;
        state.handler = None;
        state.close_calls += 1;
        if state.fail_close {
            return Err(PortError::Io(std::io::Error::other("close failed")));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

#[derive(Default)]
struct FactoryState {
    created: HashMap<String, MockTransport>,
    failing: HashSet<String>,
}

/// Hands out [`MockTransport`]s and remembers the latest one per port name.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transport most recently created for `port_name`.
    pub fn transport(&self, port_name: &str) -> Option<MockTransport> {
        self.state.lock().created.get(port_name).cloned()
    }

    /// Number of distinct port names a transport was created for.
    pub fn created_count(&self) -> usize {
        self.state.lock().created.len()
    }

    /// Transports created for `port_name` from now on refuse to open.
    pub fn fail_open(&self, port_name: &str) {
        self.state.lock().failing.insert(port_name.to_string());
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, port_name: &str) -> Box<dyn Transport> {
        let mut state = self.state.lock();
        let mock = MockTransport::new(port_name);
        if state.failing.contains(port_name) {
            mock.set_fail_open(true);
        }
        state.created.insert(port_name.to_string(), mock.clone());
        Box::new(mock)
    }
}

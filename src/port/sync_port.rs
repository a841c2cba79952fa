//! Serial port transport.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own `Transport`
//! trait. Received bytes are pumped by a dedicated reader thread per port.

use super::error::PortError;
use super::traits::{ByteHandler, PortSettings, Transport, TransportFactory};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, trace};

/// How long a single blocking read waits before reporting "no data yet".
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1200);

/// Size of the reader thread's scratch buffer.
pub const DEFAULT_READ_CHUNK: usize = 4096;

/// Serial port transport backed by `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation, present while open.
    port: Option<Box<dyn serialport::SerialPort>>,
    /// The port name/path for identification.
    name: String,
    read_timeout: Duration,
    chunk_size: usize,
    reader: Option<ReaderHandle>,
}

struct ReaderHandle {
    running: Arc<AtomicBool>,
    // Detached on close: the reader may be the thread doing the closing.
    _thread: thread::JoinHandle<()>,
}

impl SyncSerialPort {
    /// Create a closed transport for the given system path (e.g. "/dev/ttyUSB0" or "COM3").
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port: None,
            name: port_name.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            chunk_size: DEFAULT_READ_CHUNK,
            reader: None,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, PortError> {
        self.port.as_mut().ok_or(PortError::NotOpen)
    }
}

impl Transport for SyncSerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<(), PortError> {
        if self.port.is_some() {
            return Err(PortError::AlreadyOpen);
        }

        let defaults = PortSettings::default();
        let port = serialport::new(&self.name, defaults.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(&self.name),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn apply_port_settings(&mut self, settings: &PortSettings) -> Result<(), PortError> {
        let port = self.port_mut()?;
        port.set_baud_rate(settings.baud_rate)?;
        port.set_data_bits(settings.data_bits.into())?;
        port.set_stop_bits(settings.stop_bits.into())?;
        port.set_parity(settings.parity.into())?;
        port.set_flow_control(settings.flow_control.into())?;
        Ok(())
    }

    fn listen(&mut self, handler: ByteHandler) -> Result<(), PortError> {
        if self.reader.is_some() {
            return Err(PortError::config(format!(
                "Serial port [{}] already has a reader",
                self.name
            )));
        }

        let source = self.port_mut()?.try_clone()?;
        let running = Arc::new(AtomicBool::new(true));
        let name = self.name.clone();
        let chunk_size = self.chunk_size;
        let flag = Arc::clone(&running);

        let thread = thread::Builder::new()
            .name(format!("serial-rx-{}", self.name))
            .spawn(move || read_loop(source, &name, chunk_size, &flag, &handler))?;

        self.reader = Some(ReaderHandle {
            running,
            _thread: thread,
        });
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let timeout = self.read_timeout;
        let port = self.port_mut()?;
        port.write_all(data)
            .and_then(|()| port.flush())
            .map_err(|e| write_error(e, timeout))?;
        Ok(data.len())
    }

    fn close(&mut self) -> Result<(), PortError> {
        if let Some(reader) = self.reader.take() {
            reader.running.store(false, Ordering::Release);
        }
        // The reader's cloned handle is released once it observes the flag,
        // at the latest one read timeout later.
        self.port = None;
        Ok(())
    }
}

impl Drop for SyncSerialPort {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// The port timeout bounds writes too; a write that stalls past it is reported as such.
fn write_error(e: std::io::Error, timeout: Duration) -> PortError {
    match e.kind() {
        ErrorKind::TimedOut => PortError::timeout(timeout),
        _ => PortError::Io(e),
    }
}

fn read_loop(
    mut source: Box<dyn serialport::SerialPort>,
    name: &str,
    chunk_size: usize,
    running: &AtomicBool,
    handler: &ByteHandler,
) {
    let mut scratch = vec![0u8; chunk_size];

    while running.load(Ordering::Acquire) {
        match source.read(&mut scratch) {
            Ok(0) => continue,
            Ok(n) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                trace!("Read {} bytes from [{}]", n, name);
                handler(&scratch[..n]);
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => continue,
            Err(e) => {
                error!("Exception occurred while reading data from port [{}]: {}", name, e);
                break;
            }
        }
    }

    debug!("Reader for serial port [{}] stopped", name);
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// Opens [`SyncSerialPort`] transports with a fixed read timeout and chunk size.
#[derive(Debug, Clone)]
pub struct SerialTransportFactory {
    pub read_timeout: Duration,
    pub chunk_size: usize,
}

impl Default for SerialTransportFactory {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

impl TransportFactory for SerialTransportFactory {
    fn create(&self, port_name: &str) -> Box<dyn Transport> {
        Box::new(
            SyncSerialPort::new(port_name)
                .with_read_timeout(self.read_timeout)
                .with_chunk_size(self.chunk_size),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let mut port = SyncSerialPort::new("/dev/nonexistent_port_12345");
        let result = port.open();

        assert!(result.is_err());
        assert!(!port.is_open());
    }

    #[test]
    fn test_operations_require_open_port() {
        let mut port = SyncSerialPort::new("/dev/nonexistent_port_12345");

        assert!(matches!(
            port.apply_port_settings(&PortSettings::default()),
            Err(PortError::NotOpen)
        ));
        assert!(matches!(port.write_bytes(b"x"), Err(PortError::NotOpen)));
        let handler: ByteHandler = Arc::new(|_: &[u8]| {});
        assert!(matches!(port.listen(handler), Err(PortError::NotOpen)));
    }

    #[test]
    fn test_close_when_closed_is_noop() {
        let mut port = SyncSerialPort::new("/dev/nonexistent_port_12345");
        assert!(port.close().is_ok());
        assert!(port.close().is_ok());
    }

    #[test]
    fn test_stalled_write_reports_timeout() {
        let timeout = Duration::from_millis(250);

        let stalled = std::io::Error::new(ErrorKind::TimedOut, "operation timed out");
        assert!(matches!(write_error(stalled, timeout), PortError::Timeout(t) if t == timeout));

        let unplugged = std::io::Error::new(ErrorKind::BrokenPipe, "device disconnected");
        assert!(matches!(write_error(unplugged, timeout), PortError::Io(_)));
    }

    #[test]
    fn test_factory_defaults() {
        let factory = SerialTransportFactory::default();
        assert_eq!(factory.read_timeout, Duration::from_millis(1200));

        let transport = factory.create("COM7");
        assert_eq!(transport.name(), "COM7");
        assert!(!transport.is_open());
    }
}

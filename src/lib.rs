//! Serial Hub Library
//!
//! Shares physical serial ports between any number of client connections.
//! Bytes read from a device are split into messages by a configurable framing
//! strategy and delivered to every connection listening to that port.
//!
//! # Modules
//!
//! - `buffer`: Receive buffer for bytes not yet framed
//! - `encoding`: Charsets used to decode messages and encode outgoing text
//! - `options`: Parsing of client options into port settings and response formats
//! - `framing`: The framing engine
//! - `payload`: Outgoing data conversion
//! - `sink`: Connection identity and message delivery
//! - `port`: Transport abstraction with serial and mock implementations
//! - `shared_port`: One open port shared by many connections
//! - `registry`: Process-wide coordinator of shared ports
//! - `error`: Unified error handling
//! - `config`: Configuration management with TOML support
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```
//! use serial_hub::{ConnectionId, DeliveryError, MockTransportFactory, PortRegistry, SerialOptions};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let factory = MockTransportFactory::new();
//! let registry = PortRegistry::new(factory.clone());
//!
//! let (options, warnings) = SerialOptions::parse(&json!({"rx": {"untilNewline": true}}), true);
//! assert!(warnings.is_empty());
//!
//! let client = ConnectionId::new();
//! let sink = |port: &str, message: &str| -> Result<(), DeliveryError> {
//!     println!("{}: {}", port, message);
//!     Ok(())
//! };
//! registry.start_listening(&client, Arc::new(sink), "COM1", Some(&options)).unwrap();
//!
//! factory.transport("COM1").unwrap().inject(b"hello\r\n");
//! assert_eq!(registry.listener_count("COM1"), 1);
//! ```

pub mod buffer;
pub mod config;
pub mod encoding;
pub mod error;
pub mod framing;
pub mod logging;
pub mod options;
pub mod payload;
pub mod port;
pub mod registry;
pub mod shared_port;
pub mod sink;

// Re-export commonly used types for convenience
pub use buffer::ByteAccumulator;
pub use encoding::Encoding;
pub use error::{ConfigAspect, ConfigWarning, HubError, HubResult};
pub use framing::{extract, Extraction, ExtractionPolicy};
pub use options::{ByteParam, Endian, FrameEnd, FramingMode, ResponseFormat, SerialOptions};
pub use payload::{PayloadError, PortData};
pub use port::{
    DataBits, FlowControl, MockTransport, MockTransportFactory, Parity, PortError, PortSettings,
    SerialTransportFactory, StopBits, SyncSerialPort, Transport, TransportFactory,
};
pub use registry::{PortRegistry, PortStatus, RegistryBuilder};
pub use shared_port::{PortHooks, SharedPort};
pub use sink::{ConnectionId, DeliveryError, NotificationSink};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};

//! Transport abstraction layer for shared ports.
//!
//! Provides the `Transport` trait plus a real serial implementation and an
//! in-memory mock, enabling dependency injection and testing.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockTransport, MockTransportFactory};
pub use sync_port::*;
pub use traits::*;

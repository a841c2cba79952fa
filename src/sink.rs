//! Client connections and the sinks messages are delivered through.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identity of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A sink refused or failed to accept a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Delivery failed: {0}")]
pub struct DeliveryError(pub String);

impl DeliveryError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Delivers framed messages to one client connection.
///
/// Called from the port's reader thread with no locks held. An error removes
/// the connection from that port; it is never propagated further.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, port_name: &str, message: &str) -> Result<(), DeliveryError>;
}

impl<F> NotificationSink for F
where
    F: Fn(&str, &str) -> Result<(), DeliveryError> + Send + Sync,
{
    fn deliver(&self, port_name: &str, message: &str) -> Result<(), DeliveryError> {
        self(port_name, message)
    }
}

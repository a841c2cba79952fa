use crate::payload::PayloadError;
use crate::port::PortError;
use std::fmt;
use thiserror::Error;

/// A specialized `Result` type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Unified error type returned by the port registry and shared ports.
#[derive(Debug, Error)]
pub enum HubError {
    /// The transport failed to open, configure or write.
    #[error("Serial port [{port}] failed: {source}")]
    Transport {
        port: String,
        #[source]
        source: PortError,
    },

    #[error("Serial port [{port}] is already open with different {aspect}. Remove {aspect} options to join the shared port.")]
    Incompatible { port: String, aspect: ConfigAspect },

    #[error("Not listening to serial port [{0}]")]
    NotListening(String),

    #[error("Serial port [{0}] is not open")]
    PortNotOpen(String),

    #[error("Invalid data for serial port [{port}]: {source}")]
    Payload {
        port: String,
        #[source]
        source: PayloadError,
    },
}

impl HubError {
    pub fn transport(port: impl Into<String>, source: PortError) -> Self {
        Self::Transport {
            port: port.into(),
            source,
        }
    }

    /// Port the failed operation targeted.
    pub fn port(&self) -> &str {
        match self {
            Self::Transport { port, .. }
            | Self::Incompatible { port, .. }
            | Self::Payload { port, .. }
            | Self::NotListening(port)
            | Self::PortNotOpen(port) => port,
        }
    }
}

/// Part of a port's configuration that a joining client disagreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAspect {
    PortSettings,
    Encoding,
    ResponseFormat,
}

impl fmt::Display for ConfigAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PortSettings => "settings",
            Self::Encoding => "encoding",
            Self::ResponseFormat => "rx settings",
        };
        f.write_str(name)
    }
}

/// Non-fatal problem found while parsing client options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigWarning {
    #[error("Cannot read {value} as a {expected} for {field}, using default")]
    InvalidValue {
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("{reason}")]
    Ignored { field: String, reason: String },
}

impl ConfigWarning {
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidValue { field, .. } | Self::Ignored { field, .. } => field,
        }
    }
}

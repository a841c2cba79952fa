//! Core traits for transport abstraction.
//!
//! Defines the `Transport` trait that allows both real serial ports and mock
//! implementations to back a shared port interchangeably.

use super::error::PortError;
use crate::encoding::Encoding;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Physical line parameters of a port plus the charset of its text traffic.
///
/// Two settings are equal only when every field matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSettings {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Flow control mode.
    pub flow_control: FlowControl,

    /// Charset used for outgoing text.
    pub encoding: Encoding,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            encoding: Encoding::Utf8,
        }
    }
}

impl PortSettings {
    /// Compare only the parameters applied to the physical line, ignoring the charset.
    pub fn same_line(&self, other: &PortSettings) -> bool {
        self.baud_rate == other.baud_rate
            && self.data_bits == other.data_bits
            && self.stop_bits == other.stop_bits
            && self.parity == other.parity
            && self.flow_control == other.flow_control
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::Hardware => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Callback receiving every chunk of bytes a transport reads.
///
/// Invoked from the transport's own reader thread.
pub type ByteHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Trait for the physical side of a shared port.
///
/// A transport is opened once, configured, then pushes received bytes to the
/// handler registered with [`Transport::listen`] until it is closed.
pub trait Transport: Send + std::fmt::Debug {
    /// Get the name/path of this port.
    fn name(&self) -> &str;

    /// Acquire the underlying device.
    fn open(&mut self) -> Result<(), PortError>;

    fn is_open(&self) -> bool;

    /// Apply line parameters to an open device.
    fn apply_port_settings(&mut self, settings: &PortSettings) -> Result<(), PortError>;

    /// Start delivering received bytes to `handler`.
    fn listen(&mut self, handler: ByteHandler) -> Result<(), PortError>;

    /// Write bytes to the port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Release the device. Closing a closed transport is a no-op.
    fn close(&mut self) -> Result<(), PortError>;
}

/// Creates a fresh transport for a port name.
pub trait TransportFactory: Send + Sync {
    fn create(&self, port_name: &str) -> Box<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn(&str) -> Box<dyn Transport> + Send + Sync,
{
    fn create(&self, port_name: &str) -> Box<dyn Transport> {
        self(port_name)
    }
}

//! Parsing of individual port-setting values.
//!
//! Each parser returns `None` for values the transport cannot apply; the caller
//! turns that into a configuration warning and keeps the default.

use crate::port::{DataBits, FlowControl, Parity, StopBits};
use tracing::trace;

/// Baud rates accepted from clients.
pub const VALID_BAUD_RATES: &[u32] = &[
    110, 300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 128000, 230400,
    256000, 460800, 921600,
];

pub fn parse_baud_rate(rate: &str) -> Option<u32> {
    let rate = rate.trim();
    let parsed = match rate.strip_prefix("0x").or_else(|| rate.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => rate.parse::<u32>().ok(),
    }?;

    if VALID_BAUD_RATES.contains(&parsed) {
        trace!("Parsed serial setting: BAUDRATE_{}", parsed);
        Some(parsed)
    } else {
        None
    }
}

pub fn parse_data_bits(bits: &str) -> Option<DataBits> {
    match bits.trim() {
        "5" => Some(DataBits::Five),
        "6" => Some(DataBits::Six),
        "7" => Some(DataBits::Seven),
        "8" => Some(DataBits::Eight),
        _ => None,
    }
}

/// 1.5 stop bits cannot be expressed by the serial backend and is rejected.
pub fn parse_stop_bits(bits: &str) -> Option<StopBits> {
    match bits.trim() {
        "" | "1" => Some(StopBits::One),
        "2" => Some(StopBits::Two),
        _ => None,
    }
}

/// Mark and space parity are rejected for the same reason.
pub fn parse_parity(parity: &str) -> Option<Parity> {
    match parity.trim().to_ascii_lowercase().as_str() {
        "" | "n" | "none" => Some(Parity::None),
        "e" | "even" => Some(Parity::Even),
        "o" | "odd" => Some(Parity::Odd),
        _ => None,
    }
}

/// Directional variants collapse onto the bidirectional mode.
pub fn parse_flow_control(control: &str) -> Option<FlowControl> {
    match control.trim().to_ascii_lowercase().as_str() {
        "" | "n" | "none" => Some(FlowControl::None),
        "x" | "xonxoff" | "xonxoff_in" | "xonxoff_out" => Some(FlowControl::Software),
        "p" | "rtscts" | "rtscts_in" | "rtscts_out" => Some(FlowControl::Hardware),
        _ => None,
    }
}

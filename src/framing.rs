//! Splits the receive buffer of a port into discrete messages.
//!
//! [`extract`] performs a single step against the buffered bytes: it either
//! removes one complete frame, discards a frame without content, or leaves the
//! buffer untouched until more bytes arrive. Every step that does not report
//! [`Extraction::Incomplete`] consumes at least one byte, so draining always
//! terminates.

use crate::buffer::ByteAccumulator;
use crate::options::{FrameEnd, FramingMode};
use memchr::memchr2;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{trace, warn};

/// Outcome of one extraction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A complete frame was removed from the buffer.
    Message(Vec<u8>),
    /// A frame with an empty body was removed and dropped.
    Discarded,
    /// No complete frame is buffered yet.
    Incomplete,
}

/// How many frames are extracted per received chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// Extract until no complete frame remains.
    #[default]
    Drain,
    /// Extract at most one message per chunk; the rest waits for the next read.
    SinglePerEvent,
}

/// Run one extraction step for `mode`.
pub fn extract(mode: &FramingMode, buffer: &mut ByteAccumulator) -> Extraction {
    if buffer.is_empty() {
        return Extraction::Incomplete;
    }

    match mode {
        FramingMode::Newline => {
            trace!("Reading newline delimited response");
            newline(buffer)
        }
        FramingMode::Bounded {
            start,
            end,
            include_start,
        } => bounded(buffer, start, end, *include_start),
        FramingMode::FixedWidth { width } if *width > 0 => {
            trace!("Reading fixed length response");
            if buffer.len() < *width {
                return Extraction::Incomplete;
            }
            cut(buffer, 0..*width, *width)
        }
        FramingMode::Raw | FramingMode::FixedWidth { .. } => {
            trace!("Reading raw response");
            Extraction::Message(buffer.take())
        }
    }
}

/// Extract the frames currently available according to `policy`.
pub fn extract_messages(
    mode: &FramingMode,
    buffer: &mut ByteAccumulator,
    policy: ExtractionPolicy,
) -> Vec<Vec<u8>> {
    let mut messages = Vec::new();
    loop {
        match extract(mode, buffer) {
            Extraction::Message(message) => {
                messages.push(message);
                if policy == ExtractionPolicy::SinglePerEvent {
                    break;
                }
            }
            Extraction::Discarded => continue,
            Extraction::Incomplete => break,
        }
    }
    messages
}

/// A `\r\n` anywhere in the buffer wins over an earlier lone `\r` or `\n`.
fn newline(buffer: &mut ByteAccumulator) -> Extraction {
    if let Some(idx) = buffer.find(b"\r\n", 0) {
        return cut(buffer, 0..idx, idx + 2);
    }
    match memchr2(b'\r', b'\n', buffer.as_slice()) {
        Some(idx) => cut(buffer, 0..idx, idx + 1),
        None => Extraction::Incomplete,
    }
}

fn bounded(buffer: &mut ByteAccumulator, start: &[u8], end: &FrameEnd, include_start: bool) -> Extraction {
    let Some(start_idx) = buffer.find(start, 0) else {
        return Extraction::Incomplete;
    };
    let body_start = start_idx + start.len();
    let from = |offset: usize| if include_start { start_idx } else { offset };

    match end {
        FrameEnd::Delimiter { end } => {
            trace!("Reading bounded response");
            match buffer.find(end, body_start) {
                Some(end_idx) => cut(buffer, from(body_start)..end_idx, end_idx + end.len()),
                None => Extraction::Incomplete,
            }
        }
        FrameEnd::Width { width } => {
            trace!("Reading fixed length prefixed response");
            let stop = body_start + width;
            if buffer.len() < stop {
                return Extraction::Incomplete;
            }
            cut(buffer, from(body_start)..stop, stop)
        }
        FrameEnd::Length { length, crc } => {
            trace!("Reading dynamic formatted response");
            let Some(body_len) = length.read(buffer.as_slice(), body_start) else {
                return Extraction::Incomplete;
            };
            trace!("Found length byte, expected data length: {}", body_len);

            let body_from = body_start + length.span();
            let body_to = body_from.saturating_add(usize::try_from(body_len).unwrap_or(usize::MAX));
            let stop = body_to.saturating_add(crc.map_or(0, |crc| crc.span()));
            if buffer.len() < stop {
                return Extraction::Incomplete;
            }
            cut(buffer, from(body_from)..body_to, stop)
        }
        FrameEnd::Unbounded => {
            if buffer.len() == body_start {
                return Extraction::Incomplete;
            }
            warn!("Reading header formatted raw response, are you missing an rx option?");
            let stop = buffer.len();
            cut(buffer, from(body_start)..stop, stop)
        }
    }
}

/// Copy `message` out and remove everything up to `consumed`, including any
/// noise preceding the frame.
fn cut(buffer: &mut ByteAccumulator, message: Range<usize>, consumed: usize) -> Extraction {
    let bytes = buffer.as_slice()[message].to_vec();
    buffer.clear_range(0..consumed);
    if bytes.is_empty() {
        trace!("Dropping empty frame");
        Extraction::Discarded
    } else {
        Extraction::Message(bytes)
    }
}

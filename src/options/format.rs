//! Response framing parameters.
//!
//! The loose option fields are resolved into a single [`FramingMode`] once, when
//! the options are parsed, so the framing engine only ever switches on the mode.

use crate::encoding::Encoding;
use serde::{Deserialize, Serialize};

/// Byte order of a multi-byte length or CRC field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Endian {
    #[default]
    Big,
    Little,
}

/// Location of a binary field relative to a reference offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteParam {
    pub index: usize,
    pub length: usize,
    pub endian: Endian,
}

impl Default for ByteParam {
    fn default() -> Self {
        Self {
            index: 0,
            length: 1,
            endian: Endian::Big,
        }
    }
}

impl ByteParam {
    /// Widest field that still decodes into a `u64`.
    pub const MAX_LENGTH: usize = 8;

    /// Bytes covered from the reference offset through the end of the field.
    pub fn span(&self) -> usize {
        self.index + self.length
    }

    /// Decode the field as an unsigned integer, reading from `offset + index`.
    ///
    /// Returns `None` until enough bytes are available.
    pub fn read(&self, bytes: &[u8], offset: usize) -> Option<u64> {
        let start = offset + self.index;
        let field = bytes.get(start..start + self.length)?;
        let fold = |acc: u64, b: &u8| (acc << 8) | u64::from(*b);
        Some(match self.endian {
            Endian::Big => field.iter().fold(0, fold),
            Endian::Little => field.iter().rev().fold(0, fold),
        })
    }
}

/// How a bounded frame ends once its start bound was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameEnd {
    /// Ends right before this byte sequence.
    Delimiter { end: Vec<u8> },
    /// Exactly `width` bytes follow the start bound.
    Width { width: usize },
    /// A binary length field follows the start bound, optionally with a CRC trailer.
    Length {
        length: ByteParam,
        crc: Option<ByteParam>,
    },
    /// Everything buffered after the start bound.
    Unbounded,
}

/// Framing strategy of a port's receive stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FramingMode {
    /// Every read is a message.
    #[default]
    Raw,
    /// Lines split on `\r\n`, `\r` or `\n`.
    Newline,
    Bounded {
        start: Vec<u8>,
        end: FrameEnd,
        include_start: bool,
    },
    FixedWidth { width: usize },
}

/// Framing mode plus the charset messages are decoded with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub encoding: Encoding,
    pub mode: FramingMode,
}

impl ResponseFormat {
    pub fn new(mode: FramingMode, encoding: Encoding) -> Self {
        Self { encoding, mode }
    }
}

/// Unresolved framing fields as supplied by a caller.
#[derive(Debug, Clone, Default)]
pub struct FormatParts {
    pub encoding: Encoding,
    pub bound_newline: bool,
    pub bound_start: Option<Vec<u8>>,
    pub bound_end: Option<Vec<u8>>,
    pub fixed_width: usize,
    pub length: Option<ByteParam>,
    pub crc: Option<ByteParam>,
    pub include_start: bool,
}

impl FormatParts {
    /// Resolve the framing mode. The first matching rule wins:
    /// newline, start bound, fixed width, raw.
    pub fn resolve(self) -> ResponseFormat {
        let start = self.bound_start.filter(|s| !s.is_empty());
        let end = self.bound_end.filter(|e| !e.is_empty());

        let mode = if self.bound_newline {
            FramingMode::Newline
        } else if let Some(start) = start {
            let end = if let Some(end) = end {
                FrameEnd::Delimiter { end }
            } else if self.fixed_width > 0 {
                FrameEnd::Width {
                    width: self.fixed_width,
                }
            } else if let Some(length) = self.length {
                FrameEnd::Length {
                    length,
                    crc: self.crc,
                }
            } else {
                FrameEnd::Unbounded
            };
            FramingMode::Bounded {
                start,
                end,
                include_start: self.include_start,
            }
        } else if self.fixed_width > 0 {
            FramingMode::FixedWidth {
                width: self.fixed_width,
            }
        } else {
            FramingMode::Raw
        };

        ResponseFormat::new(mode, self.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_param_read_big_and_little() {
        let bytes = [0xAA, 0x01, 0x02, 0xBB];
        let big = ByteParam {
            index: 1,
            length: 2,
            endian: Endian::Big,
        };
        let little = ByteParam {
            endian: Endian::Little,
            ..big
        };
        assert_eq!(big.read(&bytes, 0), Some(0x0102));
        assert_eq!(little.read(&bytes, 0), Some(0x0201));
        assert_eq!(big.read(&bytes, 2), None);
        assert_eq!(big.span(), 3);
    }

    #[test]
    fn test_byte_param_high_bytes_stay_unsigned() {
        let param = ByteParam::default();
        assert_eq!(param.read(&[0xFF], 0), Some(255));
    }

    #[test]
    fn test_newline_wins_over_everything() {
        let format = FormatParts {
            bound_newline: true,
            bound_start: Some(vec![0x02]),
            fixed_width: 4,
            ..Default::default()
        }
        .resolve();
        assert_eq!(format.mode, FramingMode::Newline);
    }

    #[test]
    fn test_start_bound_end_priority() {
        let format = FormatParts {
            bound_start: Some(vec![0x02]),
            bound_end: Some(vec![0x0D]),
            fixed_width: 4,
            length: Some(ByteParam::default()),
            ..Default::default()
        }
        .resolve();
        assert_eq!(
            format.mode,
            FramingMode::Bounded {
                start: vec![0x02],
                end: FrameEnd::Delimiter { end: vec![0x0D] },
                include_start: false,
            }
        );

        let format = FormatParts {
            bound_start: Some(vec![0x02]),
            fixed_width: 4,
            length: Some(ByteParam::default()),
            ..Default::default()
        }
        .resolve();
        assert!(matches!(
            format.mode,
            FramingMode::Bounded {
                end: FrameEnd::Width { width: 4 },
                ..
            }
        ));
    }

    #[test]
    fn test_width_without_start_and_raw_fallback() {
        let format = FormatParts {
            bound_start: Some(Vec::new()),
            fixed_width: 4,
            length: Some(ByteParam::default()),
            ..Default::default()
        }
        .resolve();
        assert_eq!(format.mode, FramingMode::FixedWidth { width: 4 });

        let format = FormatParts {
            length: Some(ByteParam::default()),
            ..Default::default()
        }
        .resolve();
        assert_eq!(format.mode, FramingMode::Raw);
    }
}

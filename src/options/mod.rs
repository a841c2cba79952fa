//! Serial options supplied by clients when opening, joining or writing to a port.
//!
//! Options arrive as loosely-typed JSON. [`SerialOptions::parse`] turns them
//! into typed port settings and a resolved [`ResponseFormat`], collecting a
//! warning for every value it had to replace with a default.

pub mod format;
mod parser;
pub mod settings;

pub use format::{ByteParam, Endian, FormatParts, FrameEnd, FramingMode, ResponseFormat};

use crate::encoding::Encoding;
use crate::error::{ConfigAspect, ConfigWarning};
use crate::port::PortSettings;
use parser::OptionsParser;
use serde::Serialize;

/// Parsed client options.
///
/// `port_settings` and `response_format` are only present when the caller is
/// opening the port or supplied the corresponding keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerialOptions {
    pub port_settings: Option<PortSettings>,
    pub response_format: Option<ResponseFormat>,
    /// Charset named explicitly by the caller.
    pub encoding: Option<Encoding>,
    /// At least one line parameter (baud rate, data bits, ...) was supplied.
    pub line_settings_explicit: bool,
    /// An `rx` object was supplied.
    pub rx_explicit: bool,
}

/// Configuration in effect on an open port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedOptions {
    pub settings: PortSettings,
    pub format: ResponseFormat,
}

impl SerialOptions {
    /// Parse client JSON.
    ///
    /// With `opening` set, missing settings and framing fall back to the
    /// defaults the port will be opened with.
    pub fn parse(value: &serde_json::Value, opening: bool) -> (Self, Vec<ConfigWarning>) {
        OptionsParser::default().parse(value, opening)
    }

    pub fn with_port_settings(mut self, settings: PortSettings) -> Self {
        self.port_settings = Some(settings);
        self.line_settings_explicit = true;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self.rx_explicit = true;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        if let Some(settings) = self.port_settings.as_mut() {
            settings.encoding = encoding;
        }
        self
    }

    /// Check whether a client with these options may join a port that is
    /// already open with `applied`.
    ///
    /// Only aspects the client stated explicitly are compared.
    pub fn check_join(&self, applied: &AppliedOptions) -> Result<(), ConfigAspect> {
        if self.line_settings_explicit
            && !compatible_by(self.port_settings.as_ref(), Some(&applied.settings), PortSettings::same_line)
        {
            return Err(ConfigAspect::PortSettings);
        }
        if self.encoding.is_some_and(|encoding| encoding != applied.settings.encoding) {
            return Err(ConfigAspect::Encoding);
        }
        if self.rx_explicit && !compatible(self.response_format.as_ref(), Some(&applied.format)) {
            return Err(ConfigAspect::ResponseFormat);
        }
        Ok(())
    }
}

/// Two optional configurations are compatible when either is absent or both are equal.
pub fn compatible<T: PartialEq>(a: Option<&T>, b: Option<&T>) -> bool {
    compatible_by(a, b, |a, b| a == b)
}

fn compatible_by<T>(a: Option<&T>, b: Option<&T>, same: impl Fn(&T, &T) -> bool) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same(a, b),
        _ => true,
    }
}

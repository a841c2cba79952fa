//! Lenient parsing of client-supplied JSON options.
//!
//! Bad values never fail a request: each one is reported as a
//! [`ConfigWarning`] and the field keeps its default.

use super::format::{ByteParam, Endian, FormatParts, ResponseFormat};
use super::settings;
use super::SerialOptions;
use crate::encoding::{character_bytes, Encoding};
use crate::error::ConfigWarning;
use crate::port::PortSettings;
use serde_json::{Map, Value};
use tracing::warn;

/// Keys whose presence makes the port settings explicit.
const LINE_KEYS: [&str; 5] = ["baudRate", "dataBits", "stopBits", "parity", "flowControl"];

/// Default bounds of the legacy dialect: STX and CR.
const LEGACY_START: &str = "0x0002";
const LEGACY_END: &str = "0x000D";

#[derive(Debug, Default)]
pub(crate) struct OptionsParser {
    warnings: Vec<ConfigWarning>,
}

impl OptionsParser {
    pub(crate) fn parse(mut self, value: &Value, opening: bool) -> (SerialOptions, Vec<ConfigWarning>) {
        let Some(obj) = value.as_object() else {
            if !value.is_null() {
                self.invalid("JSONObject", "options", value);
            }
            let options = if opening {
                SerialOptions {
                    port_settings: Some(PortSettings::default()),
                    response_format: Some(ResponseFormat::default()),
                    ..Default::default()
                }
            } else {
                SerialOptions::default()
            };
            return (options, self.warnings);
        };

        let encoding = self.encoding(obj.get("encoding"), "encoding");
        let line_settings_explicit = LINE_KEYS.iter().any(|key| obj.contains_key(*key));

        let port_settings = (opening || line_settings_explicit)
            .then(|| self.port_settings(obj, encoding.unwrap_or_default()));

        let rx = present(obj, "rx");
        let response_format = match rx {
            Some(rx) => Some(self.rx_format(rx, encoding.unwrap_or_default())),
            None if opening => Some(self.legacy_format(obj)),
            None => None,
        };

        let options = SerialOptions {
            port_settings,
            response_format,
            encoding,
            line_settings_explicit,
            rx_explicit: rx.is_some(),
        };
        (options, self.warnings)
    }

    fn port_settings(&mut self, obj: &Map<String, Value>, encoding: Encoding) -> PortSettings {
        let mut port = PortSettings {
            encoding,
            ..PortSettings::default()
        };

        if let Some(value) = present(obj, "baudRate") {
            match text(value).and_then(|t| settings::parse_baud_rate(&t)) {
                Some(rate) => port.baud_rate = rate,
                None => self.invalid("supported baud rate", "baudRate", value),
            }
        }
        if let Some(value) = present(obj, "dataBits") {
            match text(value).and_then(|t| settings::parse_data_bits(&t)) {
                Some(bits) => port.data_bits = bits,
                None => self.invalid("data bits value (5-8)", "dataBits", value),
            }
        }
        if let Some(value) = present(obj, "stopBits") {
            match text(value).and_then(|t| settings::parse_stop_bits(&t)) {
                Some(bits) => port.stop_bits = bits,
                None => self.invalid("stop bits value (1 or 2)", "stopBits", value),
            }
        }
        if let Some(value) = present(obj, "parity") {
            match text(value).and_then(|t| settings::parse_parity(&t)) {
                Some(parity) => port.parity = parity,
                None => self.invalid("parity (none, even, odd)", "parity", value),
            }
        }
        if let Some(value) = present(obj, "flowControl") {
            match text(value).and_then(|t| settings::parse_flow_control(&t)) {
                Some(control) => port.flow_control = control,
                None => self.invalid("flow control (none, xonxoff, rtscts)", "flowControl", value),
            }
        }

        port
    }

    fn rx_format(&mut self, rx: &Value, encoding: Encoding) -> ResponseFormat {
        let Some(rx) = rx.as_object() else {
            self.invalid("JSONObject", "rx", rx);
            return ResponseFormat {
                encoding,
                ..Default::default()
            };
        };

        let encoding = self.encoding(rx.get("encoding"), "rx.encoding").unwrap_or(encoding);
        let mut parts = FormatParts {
            encoding,
            ..Default::default()
        };

        if let Some(value) = present(rx, "start") {
            parts.bound_start = self.bound_bytes(value, "start", encoding);
        }
        let has_start = parts.bound_start.as_ref().is_some_and(|s| !s.is_empty());

        if let Some(value) = present(rx, "includeHeader") {
            match boolean(value) {
                Some(include) => parts.include_start = include,
                None => self.invalid("boolean", "includeHeader", value),
            }
        }

        if let Some(value) = present(rx, "end") {
            match text(value) {
                Some(end) => parts.bound_end = Some(character_bytes(&end, encoding)),
                None => self.invalid("string", "end", value),
            }
            if !has_start {
                self.ignored("end", "End bound set without start bound defined");
            }
        }

        if let Some(value) = present(rx, "untilNewline") {
            match boolean(value) {
                Some(newline) => parts.bound_newline = newline,
                None => self.invalid("boolean", "untilNewline", value),
            }
        }

        if let Some(value) = present(rx, "width") {
            match integer(value).and_then(|w| usize::try_from(w).ok()) {
                Some(width) => parts.fixed_width = width,
                None => self.invalid("integer", "width", value),
            }
        }

        if let Some(value) = present(rx, "lengthBytes") {
            parts.length = self.byte_param(value, "lengthBytes", ByteParamShorthand::Index);
            if !has_start {
                self.ignored("lengthBytes", "Length byte(s) defined without start bound defined");
            }
        }

        if let Some(value) = present(rx, "crcBytes") {
            parts.crc = self.byte_param(value, "crcBytes", ByteParamShorthand::Length);
            if !has_start {
                self.ignored("crcBytes", "CRC byte(s) defined without start bound defined");
            }
        }

        parts.resolve()
    }

    /// Top-level `start`/`end`/`width` keys understood when no `rx` object is given.
    fn legacy_format(&mut self, obj: &Map<String, Value>) -> ResponseFormat {
        let encoding = Encoding::default();
        let mut parts = FormatParts {
            encoding,
            ..Default::default()
        };

        parts.bound_start = Some(self.legacy_bound(obj, "start", LEGACY_START, encoding));
        parts.bound_end = Some(self.legacy_bound(obj, "end", LEGACY_END, encoding));

        if let Some(value) = present(obj, "width") {
            match integer(value).and_then(|w| usize::try_from(w).ok()) {
                Some(width) => {
                    parts.fixed_width = width;
                    if parts.bound_end.as_ref().is_some_and(|e| !e.is_empty()) {
                        self.ignored(
                            "width",
                            "Combining 'width' property with 'end' property has undefined behavior and should not be used",
                        );
                    }
                }
                None => self.invalid("integer", "width", value),
            }
        }

        parts.resolve()
    }

    fn legacy_bound(&mut self, obj: &Map<String, Value>, key: &str, default: &str, encoding: Encoding) -> Vec<u8> {
        let bound = match present(obj, key) {
            Some(value) => text(value).unwrap_or_else(|| {
                self.invalid("string", key, value);
                default.to_string()
            }),
            None => default.to_string(),
        };
        character_bytes(&bound, encoding)
    }

    /// A bound is either a string or an array of fragments concatenated in order.
    fn bound_bytes(&mut self, value: &Value, field: &str, encoding: Encoding) -> Option<Vec<u8>> {
        match value {
            Value::Array(fragments) => {
                let mut bytes = Vec::new();
                for fragment in fragments {
                    match text(fragment) {
                        Some(fragment) => bytes.extend(character_bytes(&fragment, encoding)),
                        None => {
                            self.invalid("string", field, value);
                            return None;
                        }
                    }
                }
                Some(bytes)
            }
            other => match text(other) {
                Some(bound) => Some(character_bytes(&bound, encoding)),
                None => {
                    self.invalid("string", field, other);
                    None
                }
            },
        }
    }

    fn byte_param(&mut self, value: &Value, field: &str, shorthand: ByteParamShorthand) -> Option<ByteParam> {
        let mut param = ByteParam::default();

        let Some(obj) = value.as_object() else {
            match integer(value).and_then(|n| usize::try_from(n).ok()) {
                Some(n) => match shorthand {
                    ByteParamShorthand::Index => param.index = n,
                    ByteParamShorthand::Length => param.length = n,
                },
                None => {
                    self.invalid("integer", field, value);
                    return None;
                }
            }
            return self.checked_length(param, field, value);
        };

        if let Some(index) = present(obj, "index") {
            match integer(index).and_then(|n| usize::try_from(n).ok()) {
                Some(n) => param.index = n,
                None => self.invalid("integer", &format!("{}.index", field), index),
            }
        }
        if let Some(length) = present(obj, "length") {
            match integer(length).and_then(|n| usize::try_from(n).ok()) {
                Some(n) => param.length = n,
                None => self.invalid("integer", &format!("{}.length", field), length),
            }
        }
        if let Some(endian) = present(obj, "endian") {
            match text(endian).map(|e| e.to_ascii_uppercase()).as_deref() {
                Some("BIG") => param.endian = Endian::Big,
                Some("LITTLE") => param.endian = Endian::Little,
                _ => self.invalid("endian (BIG, LITTLE)", &format!("{}.endian", field), endian),
            }
        }

        self.checked_length(param, field, value)
    }

    fn checked_length(&mut self, param: ByteParam, field: &str, value: &Value) -> Option<ByteParam> {
        if (1..=ByteParam::MAX_LENGTH).contains(&param.length) {
            Some(param)
        } else {
            self.invalid("field length of 1-8 bytes", field, value);
            None
        }
    }

    fn encoding(&mut self, value: Option<&Value>, field: &str) -> Option<Encoding> {
        let value = value.filter(|v| !v.is_null())?;
        match value.as_str().map(str::trim) {
            Some("") => None,
            Some(name) => match name.parse::<Encoding>() {
                Ok(encoding) => Some(encoding),
                Err(_) => {
                    self.invalid("charset", field, value);
                    None
                }
            },
            None => {
                self.invalid("charset", field, value);
                None
            }
        }
    }

    fn invalid(&mut self, expected: &'static str, field: &str, value: &Value) {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if rendered.is_empty() {
            return;
        }
        let warning = ConfigWarning::InvalidValue {
            field: field.to_string(),
            expected,
            value: rendered,
        };
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn ignored(&mut self, field: &str, reason: &str) {
        let warning = ConfigWarning::Ignored {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Meaning of a bare integer given instead of a `{index, length}` object.
#[derive(Debug, Clone, Copy)]
enum ByteParamShorthand {
    Index,
    Length,
}

fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

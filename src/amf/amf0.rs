//! AMF0 encoder and decoder
//!
//! AMF0 is the Action Message Format used by RTMP command and data messages.
//! Reference: AMF0 File Format Specification (amf0-file-format-specification.pdf)
//!
//! Supported type markers:
//! ```text
//! 0x00 - Number (IEEE 754 double, big-endian)
//! 0x01 - Boolean (one byte, nonzero = true)
//! 0x02 - String (UTF-8, 16-bit big-endian length prefix)
//! 0x03 - Object (name/value pairs until 0x000009)
//! 0x05 - Null
//! 0x06 - Undefined
//! 0x08 - ECMA Array (32-bit count hint + name/value pairs until 0x000009)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::value::{AmfObject, AmfValue};
use crate::error::AmfError;

// AMF0 type markers
pub const MARKER_NUMBER: u8 = 0x00;
pub const MARKER_BOOLEAN: u8 = 0x01;
pub const MARKER_STRING: u8 = 0x02;
pub const MARKER_OBJECT: u8 = 0x03;
pub const MARKER_NULL: u8 = 0x05;
pub const MARKER_UNDEFINED: u8 = 0x06;
pub const MARKER_ECMA_ARRAY: u8 = 0x08;
pub const MARKER_OBJECT_END: u8 = 0x09;

/// Empty property name followed by the object-end marker
const OBJECT_END: [u8; 3] = [0x00, 0x00, MARKER_OBJECT_END];

/// Maximum nesting depth for objects/arrays (prevent stack overflow)
const MAX_NESTING_DEPTH: usize = 64;

/// AMF0 decoder
pub struct Amf0Decoder {
    /// Accept objects truncated right before their end marker
    lenient: bool,
    /// Current nesting depth
    depth: usize,
}

impl Amf0Decoder {
    /// Create a new decoder with default settings
    pub fn new() -> Self {
        Self {
            lenient: true, // OBS occasionally drops the trailing end marker
            depth: 0,
        }
    }

    /// Create decoder with explicit lenient mode setting
    pub fn with_lenient(lenient: bool) -> Self {
        Self { lenient, depth: 0 }
    }

    /// Decode a single AMF0 value from the buffer
    pub fn decode(&mut self, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        if buf.is_empty() {
            return Err(AmfError::UnexpectedEof);
        }

        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(AmfError::NestingTooDeep);
        }

        let marker = buf.get_u8();
        let result = self.decode_value(marker, buf);
        self.depth -= 1;
        result
    }

    /// Decode all values from buffer until exhausted
    pub fn decode_all(&mut self, buf: &mut Bytes) -> Result<Vec<AmfValue>, AmfError> {
        let mut values = Vec::new();
        while buf.has_remaining() {
            values.push(self.decode(buf)?);
        }
        Ok(values)
    }

    /// Decode the next value, or `None` when the buffer is exhausted.
    ///
    /// Trailing command arguments are optional on the wire.
    pub fn decode_optional(&mut self, buf: &mut Bytes) -> Result<Option<AmfValue>, AmfError> {
        if buf.has_remaining() {
            self.decode(buf).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a value that must be a (non-empty) string
    pub fn expect_string(&mut self, buf: &mut Bytes) -> Result<String, AmfError> {
        self.expect_marker(buf, MARKER_STRING)?;
        self.decode_string(buf)
    }

    /// Read a value that must be a number
    pub fn expect_number(&mut self, buf: &mut Bytes) -> Result<f64, AmfError> {
        self.expect_marker(buf, MARKER_NUMBER)?;
        self.decode_number(buf)
    }

    /// Read a value that must be a boolean
    pub fn expect_boolean(&mut self, buf: &mut Bytes) -> Result<bool, AmfError> {
        self.expect_marker(buf, MARKER_BOOLEAN)?;
        self.decode_boolean(buf)
    }

    /// Read a value that must be an anonymous object
    pub fn expect_object(&mut self, buf: &mut Bytes) -> Result<AmfObject, AmfError> {
        self.expect_marker(buf, MARKER_OBJECT)?;
        self.depth += 1;
        let result = self.decode_properties(buf);
        self.depth -= 1;
        result
    }

    fn expect_marker(&mut self, buf: &mut Bytes, expected: u8) -> Result<(), AmfError> {
        if buf.is_empty() {
            return Err(AmfError::UnexpectedEof);
        }
        let found = buf.get_u8();
        if found != expected {
            return Err(AmfError::UnexpectedMarker { expected, found });
        }
        Ok(())
    }

    fn decode_value(&mut self, marker: u8, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        match marker {
            MARKER_NUMBER => self.decode_number(buf).map(AmfValue::Number),
            MARKER_BOOLEAN => self.decode_boolean(buf).map(AmfValue::Boolean),
            MARKER_STRING => self.decode_string(buf).map(AmfValue::String),
            MARKER_OBJECT => self.decode_properties(buf).map(AmfValue::Object),
            MARKER_NULL => Ok(AmfValue::Null),
            MARKER_UNDEFINED => Ok(AmfValue::Undefined),
            MARKER_ECMA_ARRAY => self.decode_ecma_array(buf),
            _ => Err(AmfError::UnknownMarker(marker)),
        }
    }

    fn decode_number(&mut self, buf: &mut Bytes) -> Result<f64, AmfError> {
        if buf.remaining() < 8 {
            return Err(AmfError::UnexpectedEof);
        }
        Ok(buf.get_f64())
    }

    fn decode_boolean(&mut self, buf: &mut Bytes) -> Result<bool, AmfError> {
        if buf.is_empty() {
            return Err(AmfError::UnexpectedEof);
        }
        Ok(buf.get_u8() != 0)
    }

    fn decode_string(&mut self, buf: &mut Bytes) -> Result<String, AmfError> {
        let s = self.read_utf8(buf)?;
        if s.is_empty() {
            return Err(AmfError::EmptyString);
        }
        Ok(s)
    }

    fn decode_ecma_array(&mut self, buf: &mut Bytes) -> Result<AmfValue, AmfError> {
        if buf.remaining() < 4 {
            return Err(AmfError::UnexpectedEof);
        }

        // Count hint, producers do not keep it accurate
        let _count = buf.get_u32();

        self.decode_properties(buf).map(AmfValue::EcmaArray)
    }

    /// Read name/value pairs until the `00 00 09` terminator
    fn decode_properties(&mut self, buf: &mut Bytes) -> Result<AmfObject, AmfError> {
        let mut properties = AmfObject::new();

        loop {
            if buf.remaining() >= OBJECT_END.len() && buf[..OBJECT_END.len()] == OBJECT_END {
                buf.advance(OBJECT_END.len());
                break;
            }

            if buf.is_empty() {
                if self.lenient {
                    break;
                }
                return Err(AmfError::InvalidObjectEnd);
            }

            let key = self.read_utf8(buf)?;
            // Property values may be empty, e.g. `swfUrl: ""`
            let value = if buf.first() == Some(&MARKER_STRING) {
                buf.advance(1);
                AmfValue::String(self.read_utf8(buf)?)
            } else {
                self.decode(buf)?
            };
            properties.push(key, value);
        }

        Ok(properties)
    }

    /// Read UTF-8 string with 16-bit length prefix
    fn read_utf8(&mut self, buf: &mut Bytes) -> Result<String, AmfError> {
        if buf.remaining() < 2 {
            return Err(AmfError::UnexpectedEof);
        }

        let len = buf.get_u16() as usize;
        if buf.remaining() < len {
            return Err(AmfError::UnexpectedEof);
        }

        let bytes = buf.split_to(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| AmfError::InvalidUtf8)
    }
}

impl Default for Amf0Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// AMF0 encoder
pub struct Amf0Encoder {
    buf: BytesMut,
}

impl Amf0Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Create encoder with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Get the encoded bytes and reset encoder
    pub fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Get current encoded length
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if encoder is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a single AMF0 value
    pub fn encode(&mut self, value: &AmfValue) {
        match value {
            AmfValue::Number(n) => {
                self.buf.put_u8(MARKER_NUMBER);
                self.buf.put_f64(*n);
            }
            AmfValue::Boolean(b) => {
                self.buf.put_u8(MARKER_BOOLEAN);
                self.buf.put_u8(u8::from(*b));
            }
            AmfValue::String(s) => {
                self.buf.put_u8(MARKER_STRING);
                self.write_utf8(s);
            }
            AmfValue::Object(props) => {
                self.buf.put_u8(MARKER_OBJECT);
                self.write_properties(props);
            }
            AmfValue::Null => {
                self.buf.put_u8(MARKER_NULL);
            }
            AmfValue::Undefined => {
                self.buf.put_u8(MARKER_UNDEFINED);
            }
            AmfValue::EcmaArray(props) => {
                self.buf.put_u8(MARKER_ECMA_ARRAY);
                self.buf.put_u32(0);
                self.write_properties(props);
            }
        }
    }

    /// Encode multiple values
    pub fn encode_all(&mut self, values: &[AmfValue]) {
        for value in values {
            self.encode(value);
        }
    }

    fn write_properties(&mut self, props: &AmfObject) {
        for (key, val) in props.iter() {
            self.write_utf8(key);
            self.encode(val);
        }
        self.buf.put_slice(&OBJECT_END);
    }

    /// Write UTF-8 string with 16-bit length prefix (no type marker)
    fn write_utf8(&mut self, s: &str) {
        let mut len = s.len().min(u16::MAX as usize);
        while !s.is_char_boundary(len) {
            len -= 1;
        }
        self.buf.put_u16(len as u16);
        self.buf.put_slice(&s.as_bytes()[..len]);
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to encode a single value
pub fn encode(value: &AmfValue) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(value);
    encoder.finish()
}

/// Convenience function to encode multiple values
pub fn encode_all(values: &[AmfValue]) -> Bytes {
    let mut encoder = Amf0Encoder::new();
    encoder.encode_all(values);
    encoder.finish()
}

/// Convenience function to decode a single value
pub fn decode(data: &[u8]) -> Result<AmfValue, AmfError> {
    let mut decoder = Amf0Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode(&mut buf)
}

/// Convenience function to decode all values
pub fn decode_all(data: &[u8]) -> Result<Vec<AmfValue>, AmfError> {
    let mut decoder = Amf0Decoder::new();
    let mut buf = Bytes::copy_from_slice(data);
    decoder.decode_all(&mut buf)
}

//! AMF (Action Message Format) implementation
//!
//! AMF0 is the binary serialization used by RTMP command and data messages
//! to carry command names, transaction ids and property objects.

pub mod amf0;
pub mod value;

pub use amf0::{Amf0Decoder, Amf0Encoder};
pub use value::{AmfObject, AmfValue};

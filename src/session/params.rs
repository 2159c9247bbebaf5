//! Parameters extracted from client commands

use crate::amf::{AmfObject, AmfValue};
use crate::protocol::packet::{PlayPacket, PublishPacket};

/// Connect command parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectParams {
    /// Application name
    pub app: String,
    pub flash_ver: Option<String>,
    pub swf_url: Option<String>,
    /// Full RTMP URL
    pub tc_url: Option<String>,
    pub fpad: bool,
    pub audio_codecs: u32,
    pub video_codecs: u32,
    pub video_function: u32,
    pub page_url: Option<String>,
    /// AMF version requested for responses
    pub object_encoding: f64,
    /// Properties not listed above, in arrival order
    pub extra: AmfObject,
}

impl ConnectParams {
    /// Parse from the connect command object
    pub fn from_amf(obj: &AmfObject) -> Self {
        let mut params = ConnectParams::default();
        let string = |value: &AmfValue| value.as_str().map(str::to_string);
        let number = |value: &AmfValue| value.as_number().unwrap_or(0.0);

        for (key, value) in obj.iter() {
            match key {
                "app" => {
                    if let Some(s) = value.as_str() {
                        params.app = s.to_string();
                    }
                }
                "flashVer" | "flashver" => params.flash_ver = string(value),
                "swfUrl" | "swfurl" => params.swf_url = string(value),
                "tcUrl" | "tcurl" => params.tc_url = string(value),
                "fpad" => params.fpad = value.as_bool().unwrap_or(false),
                "audioCodecs" | "audiocodecs" => params.audio_codecs = number(value) as u32,
                "videoCodecs" | "videocodecs" => params.video_codecs = number(value) as u32,
                "videoFunction" | "videofunction" => {
                    params.video_function = number(value) as u32
                }
                "pageUrl" | "pageurl" => params.page_url = string(value),
                "objectEncoding" | "objectencoding" => params.object_encoding = number(value),
                _ => params.extra.push(key.to_string(), value.clone()),
            }
        }

        params
    }
}

/// Publish command parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PublishParams {
    /// Stream key (name)
    pub stream_key: String,
    /// Publish type: "live", "record", "append"
    pub publish_type: String,
    /// Message stream ID
    pub stream_id: u32,
}

impl PublishParams {
    pub fn from_packet(packet: PublishPacket, stream_id: u32) -> Self {
        Self {
            stream_key: packet.stream_name,
            publish_type: packet.stream_type,
            stream_id,
        }
    }
}

/// Play command parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PlayParams {
    pub stream_name: String,
    /// -2 = live or recorded, -1 = live only, >= 0 = seek position in ms
    pub start: f64,
    /// -1 = until the end
    pub duration: f64,
    pub reset: bool,
    /// Message stream ID
    pub stream_id: u32,
}

impl PlayParams {
    pub fn from_packet(packet: PlayPacket, stream_id: u32) -> Self {
        Self {
            stream_name: packet.stream_name,
            start: packet.start,
            duration: packet.duration,
            reset: packet.reset,
            stream_id,
        }
    }
}

//! Encoder identification
//!
//! Clients announce themselves through the `flashVer` property of the
//! connect command object. The result only feeds logs and the session
//! context; the command sequence is chosen from what the client sends.
//!
//! Typical values:
//! - OBS: `FMLE/3.0 (compatible; FMSc/1.0)` with `OBS-Studio/...` in newer builds
//! - ffmpeg/librtmp: `FMLE/3.0 (compatible; Lavf58.76.100)`
//! - Flash Player: `WIN 32,0,0,465`, `MAC ...`, `LNX ...`

use std::fmt;

/// Detected encoder type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncoderType {
    #[default]
    Unknown,
    Obs,
    Ffmpeg,
    Wirecast,
    FlashMediaEncoder,
    FlashPlayer,
    Xsplit,
    Larix,
    Other,
}

impl EncoderType {
    /// Detect encoder from the connect command's flashVer
    pub fn from_flash_ver(flash_ver: &str) -> Self {
        let lower = flash_ver.to_lowercase();

        if lower.contains("obs") {
            EncoderType::Obs
        // librtmp also claims FMLE, check it first
        } else if lower.contains("lavf") || lower.contains("librtmp") {
            EncoderType::Ffmpeg
        } else if lower.contains("wirecast") {
            EncoderType::Wirecast
        } else if lower.contains("xsplit") {
            EncoderType::Xsplit
        } else if lower.contains("larix") {
            EncoderType::Larix
        } else if lower.contains("fmle") || lower.contains("flash media") {
            EncoderType::FlashMediaEncoder
        } else if ["win ", "mac ", "lnx "].iter().any(|p| lower.starts_with(p)) {
            EncoderType::FlashPlayer
        } else {
            EncoderType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncoderType::Unknown => "unknown",
            EncoderType::Obs => "obs",
            EncoderType::Ffmpeg => "ffmpeg",
            EncoderType::Wirecast => "wirecast",
            EncoderType::FlashMediaEncoder => "fmle",
            EncoderType::FlashPlayer => "flash-player",
            EncoderType::Xsplit => "xsplit",
            EncoderType::Larix => "larix",
            EncoderType::Other => "other",
        }
    }
}

impl fmt::Display for EncoderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_detection() {
        assert_eq!(
            EncoderType::from_flash_ver("OBS-Studio/29.1.3"),
            EncoderType::Obs
        );
        assert_eq!(
            EncoderType::from_flash_ver("FMLE/3.0"),
            EncoderType::FlashMediaEncoder
        );
        assert_eq!(
            EncoderType::from_flash_ver("FMLE/3.0 (compatible; Lavf58.76.100)"),
            EncoderType::Ffmpeg
        );
        assert_eq!(
            EncoderType::from_flash_ver("FMLE/3.0 (compatible; librtmp)"),
            EncoderType::Ffmpeg
        );
        assert_eq!(
            EncoderType::from_flash_ver("WIN 32,0,0,465"),
            EncoderType::FlashPlayer
        );
        assert_eq!(EncoderType::from_flash_ver("Larix/1.0"), EncoderType::Larix);
        assert_eq!(EncoderType::from_flash_ver("custom"), EncoderType::Other);
    }

    #[test]
    fn test_display() {
        assert_eq!(EncoderType::Ffmpeg.to_string(), "ffmpeg");
        assert_eq!(EncoderType::default().to_string(), "unknown");
    }
}

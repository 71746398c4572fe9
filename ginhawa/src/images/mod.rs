//! In-memory image payloads
//!
//! Images travel through the system as a MIME type plus raw bytes. At the
//! edges they are written as data URIs (`data:<mime>;base64,<payload>`),
//! which is what browsers hand over for uploads and what they display.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::ErrorInfo;

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// An encoded image
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Decode a base64 payload as returned by the image model
    pub fn from_base64(mime_type: &str, payload: &str) -> Result<Self, base64::DecodeError> {
        Ok(Self::new(mime_type, BASE64.decode(payload.trim())?))
    }

    /// Parse a `data:<mime>;base64,<payload>` URI
    ///
    /// Any deviation from that shape, an empty MIME type or an empty or
    /// undecodable payload is reported as invalid input.
    pub fn from_data_uri(uri: &str) -> Result<Self, ErrorInfo> {
        let rest = uri
            .trim()
            .strip_prefix(DATA_PREFIX)
            .ok_or_else(ErrorInfo::malformed_image)?;
        let (mime_type, payload) = rest
            .split_once(BASE64_MARKER)
            .ok_or_else(ErrorInfo::malformed_image)?;

        if mime_type.is_empty() || payload.is_empty() {
            return Err(ErrorInfo::malformed_image());
        }

        Self::from_base64(mime_type, payload).map_err(|_| ErrorInfo::malformed_image())
    }

    /// Whether the MIME type names an image
    pub fn is_image(&self) -> bool {
        is_image_mime(&self.mime_type)
    }

    /// Payload as standard base64
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Render as a displayable data URI
    pub fn to_data_uri(&self) -> String {
        format!(
            "{}{}{}{}",
            DATA_PREFIX,
            self.mime_type,
            BASE64_MARKER,
            self.to_base64()
        )
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Payloads can be megabytes; keep them out of logs.
impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// `image/*` with a non-empty subtype
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .trim()
        .to_ascii_lowercase()
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_data_uri() {
        let image = ImageData::from_data_uri("data:image/jpeg;base64,AAAA").unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.bytes, vec![0, 0, 0]);
        assert_eq!(image.to_data_uri(), "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn test_parse_rejects_missing_prefix() {
        let err = ImageData::from_data_uri("image/jpeg;base64,AAAA").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_rejects_non_base64_uri() {
        assert!(ImageData::from_data_uri("data:image/png,rawtext").is_err());
        assert!(ImageData::from_data_uri("data:;base64,AAAA").is_err());
        assert!(ImageData::from_data_uri("data:image/png;base64,").is_err());
        assert!(ImageData::from_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_text_payload_parses_but_is_not_image() {
        let file = ImageData::from_data_uri("data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(file.bytes, b"hello");
        assert!(!file.is_image());
    }

    #[test]
    fn test_is_image_mime() {
        assert!(is_image_mime("image/png"));
        assert!(is_image_mime("IMAGE/JPEG"));
        assert!(!is_image_mime("image/"));
        assert!(!is_image_mime("text/plain"));
        assert!(!is_image_mime(""));
    }

    #[test]
    fn test_debug_omits_payload() {
        let image = ImageData::new("image/png", vec![1, 2, 3]);
        let debug = format!("{:?}", image);
        assert!(debug.contains("size_bytes: 3"));
        assert!(!debug.contains("[1, 2, 3]"));
    }
}

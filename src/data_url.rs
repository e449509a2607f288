//! Self-contained `data:` URLs used as inline image references in documents.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;
use std::str::FromStr;

const BASE64_MARKER: &str = ";base64,";

/// A decoded `data:<mime>;base64,<payload>` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    mime: String,
    bytes: Vec<u8>,
}

impl DataUrl {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Length of the textual form without building it.
    pub fn encoded_len(&self) -> usize {
        "data:".len() + self.mime.len() + BASE64_MARKER.len() + self.bytes.len().div_ceil(3) * 4
    }
}

/// Formats borrowed bytes as a data URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{}{}{}", mime, BASE64_MARKER, STANDARD.encode(bytes))
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_data_url(&self.mime, &self.bytes))
    }
}

impl FromStr for DataUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("data:")
            .ok_or_else(|| Error::Decode("not a data URL".to_string()))?;
        let (mime, payload) = rest
            .split_once(BASE64_MARKER)
            .ok_or_else(|| Error::Decode("data URL is not base64 encoded".to_string()))?;

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::Decode(format!("invalid base64 payload: {}", e)))?;

        Ok(Self::new(mime, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_data_url() {
        let url = DataUrl::new("image/png", vec![0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(url.to_string(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_parse_data_url() {
        let url: DataUrl = "data:image/jpeg;base64,/9j/".parse().unwrap();
        assert_eq!(url.mime(), "image/jpeg");
        assert_eq!(url.bytes(), &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_encoded_len_matches_display() {
        for len in 0..8 {
            let url = DataUrl::new("image/jpeg", vec![7; len]);
            assert_eq!(url.encoded_len(), url.to_string().len());
        }
    }

    #[test]
    fn test_rejects_non_data_url() {
        let err = "http://example.com/a.png".parse::<DataUrl>().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_rejects_plain_text_payload() {
        let err = "data:text/plain,hello".parse::<DataUrl>().unwrap_err();
        assert!(err.to_string().contains("not base64"));
    }

    #[test]
    fn test_rejects_bad_base64() {
        let err = "data:image/png;base64,@@@".parse::<DataUrl>().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}

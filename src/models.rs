//! Data models and structures
//!
//! Defines the upload result contract shared by every adapter, the JSON
//! wire format of the upload endpoint, and the editor/process configuration.

use crate::transcoder::{
    TranscodeRequest, TranscoderConfig, DEFAULT_MAX_SIDE, DEFAULT_MAX_SIZE_KB, DEFAULT_QUALITY,
    DEFAULT_UNSCALED_QUALITY,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What an adapter hands back to the host on success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResult {
    pub default: String,
}

impl UploadResult {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
        }
    }
}

// Upload endpoint response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteResponse {
    pub url: Option<String>,
    pub error: Option<RemoteError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteError {
    pub message: Option<String>,
}

pub fn generic_upload_error(file_name: &str) -> Error {
    Error::Upload(format!("Couldn't upload file: {}.", file_name))
}

impl RemoteResponse {
    pub fn into_result(self, file_name: &str) -> Result<UploadResult> {
        match (self.error, self.url) {
            (Some(RemoteError { message: Some(msg) }), _) => Err(Error::Upload(msg)),
            (Some(_), _) | (None, None) => Err(generic_upload_error(file_name)),
            (None, Some(url)) => Ok(UploadResult::new(url)),
        }
    }
}

// Editor configuration namespaces
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    pub simple_upload: Option<SimpleUploadConfig>,
    #[serde(default)]
    pub base64_upload: Base64UploadConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SimpleUploadConfig {
    pub upload_url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Base64UploadConfig {
    pub quality: f32,
    pub max_side: u32,
    pub max_size_kb: usize,
    pub quality_when_unscaled: Option<f32>,
}

impl Default for Base64UploadConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            max_side: DEFAULT_MAX_SIDE,
            max_size_kb: DEFAULT_MAX_SIZE_KB,
            quality_when_unscaled: Some(DEFAULT_UNSCALED_QUALITY),
        }
    }
}

impl Base64UploadConfig {
    pub fn request(&self) -> TranscodeRequest {
        TranscodeRequest::new(self.quality)
            .with_max_side(self.max_side)
            .with_max_size_kb(self.max_size_kb)
    }

    pub fn transcoder_config(&self) -> TranscoderConfig {
        TranscoderConfig {
            quality_when_unscaled: self.quality_when_unscaled,
            ..TranscoderConfig::default()
        }
    }
}

// Process configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub base64_upload: Base64UploadConfig,
    pub simple_upload: Option<SimpleUploadConfig>,
}

fn parse_var<T: std::str::FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let quality_when_unscaled = match lookup("UPLOAD_UNSCALED_QUALITY") {
            Some(raw) if raw.trim().eq_ignore_ascii_case("caller") => None,
            raw => Some(parse_var(
                "UPLOAD_UNSCALED_QUALITY",
                raw,
                DEFAULT_UNSCALED_QUALITY,
            )?),
        };

        let base64_upload = Base64UploadConfig {
            quality: parse_var("UPLOAD_QUALITY", lookup("UPLOAD_QUALITY"), DEFAULT_QUALITY)?,
            max_side: parse_var(
                "UPLOAD_MAX_SIDE",
                lookup("UPLOAD_MAX_SIDE"),
                DEFAULT_MAX_SIDE,
            )?,
            max_size_kb: parse_var(
                "UPLOAD_MAX_SIZE_KB",
                lookup("UPLOAD_MAX_SIZE_KB"),
                DEFAULT_MAX_SIZE_KB,
            )?,
            quality_when_unscaled,
        };

        let headers = match lookup("SIMPLE_UPLOAD_HEADERS") {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                Error::Config(format!("SIMPLE_UPLOAD_HEADERS is not a JSON object: {}", e))
            })?,
            None => HashMap::new(),
        };
        let simple_upload = lookup("SIMPLE_UPLOAD_URL").map(|url| SimpleUploadConfig {
            upload_url: Some(url),
            headers,
        });

        Ok(Self {
            base64_upload,
            simple_upload,
        })
    }
}

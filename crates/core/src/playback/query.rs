//! Compact blobs carried in playback URLs.
//!
//! Both the query and the user config travel as base64url (no padding) JSON
//! so a playback URL is self-contained: `/playback/{config}/{query}`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{LinkTarget, DOWNLOAD_SERVICE};
use crate::release::{MediaType, Privacy, ReleaseDescriptor};

/// Errors decoding or encoding URL blobs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid base64 encoding: {0}")]
    InvalidEncoding(String),

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("Query has no info hash")]
    MissingHash,

    #[error("Query has no service")]
    MissingService,
}

fn encode_blob<T: Serialize>(value: &T) -> Result<String, QueryError> {
    let json = serde_json::to_vec(value).map_err(|e| QueryError::InvalidJson(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_blob<T: DeserializeOwned>(blob: &str) -> Result<T, QueryError> {
    // Tolerate padded input from older clients.
    let bytes = URL_SAFE_NO_PAD
        .decode(blob.trim().trim_end_matches('='))
        .map_err(|e| QueryError::InvalidEncoding(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| QueryError::InvalidJson(e.to_string()))
}

/// What to play: one release (and file) through one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackQuery {
    pub info_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet: Option<String>,
    /// Release file URL for web-locator releases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    pub media_type: MediaType,
    /// Backend code, or `DL` for the download service.
    pub service: String,
    #[serde(default)]
    pub privacy: Privacy,
}

impl PlaybackQuery {
    /// Build a query for a reconciled descriptor.
    ///
    /// Confirmed releases play through the backend that confirmed them;
    /// everything else goes through the download service.
    pub fn for_descriptor(descriptor: &ReleaseDescriptor, target: Option<(u32, u32)>) -> Self {
        Self {
            info_hash: descriptor.info_hash.clone(),
            magnet: descriptor
                .is_magnet()
                .then(|| descriptor.magnet()),
            link: descriptor.link.clone(),
            file_index: descriptor.file_index,
            season: target.map(|(s, _)| s),
            episode: target.map(|(_, e)| e),
            media_type: descriptor.media_type,
            service: descriptor
                .availability
                .clone()
                .unwrap_or_else(|| DOWNLOAD_SERVICE.to_string()),
            privacy: descriptor.privacy,
        }
    }

    pub fn encode(&self) -> Result<String, QueryError> {
        encode_blob(self)
    }

    pub fn decode(blob: &str) -> Result<Self, QueryError> {
        let mut query: PlaybackQuery = decode_blob(blob)?;
        query.info_hash = query.info_hash.trim().to_lowercase();
        if query.info_hash.is_empty() {
            return Err(QueryError::MissingHash);
        }
        if query.service.trim().is_empty() {
            return Err(QueryError::MissingService);
        }
        Ok(query)
    }

    /// Canonical JSON form, identical for equal queries.
    pub fn normalized(&self) -> Result<String, QueryError> {
        serde_json::to_string(self).map_err(|e| QueryError::InvalidJson(e.to_string()))
    }

    pub fn is_download(&self) -> bool {
        self.service == DOWNLOAD_SERVICE
    }

    pub fn target(&self) -> LinkTarget {
        LinkTarget {
            info_hash: self.info_hash.clone(),
            magnet: self.magnet.clone(),
            link: self.link.clone(),
            file_index: self.file_index,
            season: self.season,
            episode: self.episode,
            media_type: self.media_type,
        }
    }
}

/// Per-user settings carried in the config segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Overrides the server's proxy default for this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
}

impl UserConfig {
    pub fn encode(&self) -> Result<String, QueryError> {
        encode_blob(self)
    }

    /// `-` or an empty segment means defaults.
    pub fn decode(blob: &str) -> Result<Self, QueryError> {
        let blob = blob.trim();
        if blob.is_empty() || blob == "-" {
            return Ok(Self::default());
        }
        decode_blob(blob)
    }

    /// Identity used for coalescing: the API key when present, else the client address.
    pub fn identity(&self, client_addr: &str) -> String {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => format!("key:{}", key),
            _ => format!("ip:{}", client_addr),
        }
    }
}

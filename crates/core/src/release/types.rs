//! Types for release descriptors discovered by indexers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a release can be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Magnet URI only. Content is resolved lazily by a backend.
    Magnet,
    /// Downloadable release file (e.g. a `.torrent` URL) with a known manifest.
    WebLocator,
}

/// Licensing/visibility of the indexer a release came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Privacy {
    #[default]
    Public,
    Private,
}

/// Kind of media a release holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }
}

/// Metadata extracted from a release title or file name.
///
/// Immutable once attached to a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audio: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl ParsedMetadata {
    /// True when the parser recognized at least one season or episode number.
    pub fn has_episode_info(&self) -> bool {
        !self.seasons.is_empty() || !self.episodes.is_empty()
    }

    pub fn contains_episode(&self, season: u32, episode: u32) -> bool {
        self.seasons.contains(&season) && self.episodes.contains(&episode)
    }
}

/// One file inside a release manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Index of the file inside the release, as understood by backends.
    pub file_index: u32,
    /// File name (path components stripped).
    pub file_name: String,
    /// Size in bytes.
    pub size: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seasons: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episodes: Vec<u32>,
}

impl ManifestFile {
    pub fn new(file_index: u32, file_name: impl Into<String>, size: u64) -> Self {
        Self {
            file_index,
            file_name: file_name.into(),
            size,
            seasons: Vec::new(),
            episodes: Vec::new(),
        }
    }
}

/// A file as listed by an indexer, before parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFile {
    /// Path within the release.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

/// A single indexer search hit, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRelease {
    pub title: String,
    /// Info hash when the indexer knows it; otherwise derived from the magnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,
    /// Release file download URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    pub indexer: String,
    #[serde(default)]
    pub privacy: Privacy,
    /// File listing, when the indexer (or a fetched release file) provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<RawFile>>,
}

/// A normalized candidate release.
///
/// Identity is `info_hash`. The reconciliation fields (`availability`,
/// `file_*`) start empty and are filled while availability reports are folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Lowercase hex info hash.
    pub info_hash: String,
    pub raw_title: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    pub indexer: String,
    pub privacy: Privacy,
    pub link_kind: LinkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trackers: Vec<String>,
    pub parsed: ParsedMetadata,
    pub media_type: MediaType,

    /// Short code of the backend that confirmed the content is cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Full file manifest, only present when the release contents were enumerated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_index: Option<Vec<ManifestFile>>,
}

impl ReleaseDescriptor {
    pub fn is_magnet(&self) -> bool {
        self.link_kind == LinkKind::Magnet
    }

    pub fn is_public(&self) -> bool {
        self.privacy == Privacy::Public
    }

    /// Record the chosen file.
    pub fn select_file(&mut self, file: &ManifestFile) {
        self.file_index = Some(file.file_index);
        self.file_name = Some(file.file_name.clone());
        self.file_size = Some(file.size);
    }

    /// Forget availability and the selected file. The manifest is kept.
    pub fn clear_reconciliation(&mut self) {
        self.availability = None;
        self.file_index = None;
        self.file_name = None;
        self.file_size = None;
    }

    /// Magnet URI for this release, synthesized from the hash when absent.
    pub fn magnet(&self) -> String {
        match &self.magnet_uri {
            Some(uri) => uri.clone(),
            None => super::store::build_magnet(&self.info_hash, &self.raw_title, &self.trackers),
        }
    }
}

/// Errors for release normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("Release has no info hash: {0}")]
    MissingHash(String),

    #[error("Invalid magnet URI: {0}")]
    InvalidMagnet(String),
}

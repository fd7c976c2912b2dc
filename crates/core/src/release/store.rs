//! Normalization of raw indexer hits into release descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use data_encoding::{BASE32_NOPAD, HEXLOWER};
use tracing::{debug, warn};

use crate::matcher::{is_video_file, select_largest};
use super::{
    parser::TitleParser,
    LinkKind, ManifestFile, MediaType, RawRelease, ReleaseDescriptor, ReleaseError,
};

/// Priority used for indexers without an explicit entry (lowest).
const DEFAULT_PRIORITY: u32 = u32::MAX;

/// Turns raw indexer hits into [`ReleaseDescriptor`]s, one per info hash.
pub struct ReleaseStore {
    parser: Arc<dyn TitleParser>,
    /// Indexer name -> priority. Lower values win.
    priorities: HashMap<String, u32>,
}

impl ReleaseStore {
    pub fn new(parser: Arc<dyn TitleParser>) -> Self {
        Self {
            parser,
            priorities: HashMap::new(),
        }
    }

    /// Set the priority of an indexer. Lower values win seeder ties.
    pub fn with_priority(mut self, indexer: impl Into<String>, priority: u32) -> Self {
        self.priorities.insert(indexer.into(), priority);
        self
    }

    pub fn set_priority(&mut self, indexer: impl Into<String>, priority: u32) {
        self.priorities.insert(indexer.into(), priority);
    }

    fn priority_of(&self, indexer: &str) -> u32 {
        self.priorities
            .get(indexer)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    /// Normalize a single raw hit.
    pub fn normalize(
        &self,
        raw: RawRelease,
        media_type: MediaType,
    ) -> Result<ReleaseDescriptor, ReleaseError> {
        let info_hash = match (&raw.info_hash, &raw.magnet_uri) {
            (Some(hash), _) if !hash.trim().is_empty() => hash.trim().to_lowercase(),
            (_, Some(magnet)) => extract_info_hash(magnet)?,
            _ => return Err(ReleaseError::MissingHash(raw.title)),
        };

        let trackers = raw
            .magnet_uri
            .as_deref()
            .map(extract_trackers)
            .unwrap_or_default();

        let link_kind = if raw.link.is_some() {
            LinkKind::WebLocator
        } else {
            LinkKind::Magnet
        };

        let full_index = raw.files.as_ref().map(|files| {
            files
                .iter()
                .enumerate()
                .filter(|(_, f)| is_video_file(&f.path))
                .map(|(idx, f)| {
                    let name = f.path.rsplit(['/', '\\']).next().unwrap_or(&f.path);
                    let parsed = self.parser.parse(name);
                    ManifestFile {
                        file_index: idx as u32,
                        file_name: name.to_string(),
                        size: f.size,
                        seasons: parsed.seasons,
                        episodes: parsed.episodes,
                    }
                })
                .collect::<Vec<_>>()
        });

        let mut descriptor = ReleaseDescriptor {
            parsed: self.parser.parse(&raw.title),
            info_hash,
            raw_title: raw.title,
            size: raw.size,
            seeders: raw.seeders,
            indexer: raw.indexer,
            privacy: raw.privacy,
            link_kind,
            link: raw.link,
            magnet_uri: raw.magnet_uri,
            trackers,
            media_type,
            availability: None,
            file_index: None,
            file_name: None,
            file_size: None,
            full_index,
        };

        // Movies resolve to their largest video file up front.
        if media_type == MediaType::Movie {
            if let Some(largest) = descriptor
                .full_index
                .as_deref()
                .and_then(select_largest)
                .cloned()
            {
                descriptor.select_file(&largest);
            }
        }

        Ok(descriptor)
    }

    /// Normalize and deduplicate a batch of raw hits.
    ///
    /// Hits that cannot be normalized are logged and skipped. When several
    /// hits share a hash, the one with more seeders wins, then the one from
    /// the higher-priority indexer; otherwise the first seen is kept. Output
    /// order follows first appearance of each hash.
    pub fn normalize_all(
        &self,
        raw: Vec<RawRelease>,
        media_type: MediaType,
    ) -> Vec<ReleaseDescriptor> {
        let mut out: Vec<ReleaseDescriptor> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for hit in raw {
            let title = hit.title.clone();
            let descriptor = match self.normalize(hit, media_type) {
                Ok(d) => d,
                Err(e) => {
                    warn!(title = %title, error = %e, "Skipping release");
                    continue;
                }
            };

            match positions.get(&descriptor.info_hash) {
                Some(&pos) => {
                    if self.wins_over(&descriptor, &out[pos]) {
                        debug!(
                            hash = %descriptor.info_hash,
                            indexer = %descriptor.indexer,
                            "Replacing duplicate release"
                        );
                        out[pos] = descriptor;
                    }
                }
                None => {
                    positions.insert(descriptor.info_hash.clone(), out.len());
                    out.push(descriptor);
                }
            }
        }

        out
    }

    fn wins_over(&self, candidate: &ReleaseDescriptor, existing: &ReleaseDescriptor) -> bool {
        let candidate_seeders = candidate.seeders.unwrap_or(0);
        let existing_seeders = existing.seeders.unwrap_or(0);
        if candidate_seeders != existing_seeders {
            return candidate_seeders > existing_seeders;
        }
        self.priority_of(&candidate.indexer) < self.priority_of(&existing.indexer)
    }
}

/// Extract the lowercase hex info hash from a magnet URI.
///
/// Base32 (32 char) hashes are converted to hex.
pub fn extract_info_hash(magnet: &str) -> Result<String, ReleaseError> {
    let query = magnet
        .strip_prefix("magnet:?")
        .ok_or_else(|| ReleaseError::InvalidMagnet(magnet.to_string()))?;

    let topic = query
        .split('&')
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| *key == "xt")
        .map(|(_, value)| value)
        .ok_or_else(|| ReleaseError::InvalidMagnet(magnet.to_string()))?;

    let hash = topic
        .strip_prefix("urn:btih:")
        .ok_or_else(|| ReleaseError::InvalidMagnet(magnet.to_string()))?;

    match hash.len() {
        40 if hash.chars().all(|c| c.is_ascii_hexdigit()) => Ok(hash.to_lowercase()),
        32 => BASE32_NOPAD
            .decode(hash.to_ascii_uppercase().as_bytes())
            .map(|bytes| HEXLOWER.encode(&bytes))
            .map_err(|_| ReleaseError::InvalidMagnet(magnet.to_string())),
        _ => Err(ReleaseError::InvalidMagnet(magnet.to_string())),
    }
}

/// Tracker URLs listed in the `tr` parameters of a magnet URI.
pub fn extract_trackers(magnet: &str) -> Vec<String> {
    let Some((_, query)) = magnet.split_once('?') else {
        return Vec::new();
    };
    query
        .split('&')
        .filter_map(|param| param.strip_prefix("tr="))
        .filter_map(|tr| urlencoding::decode(tr).ok().map(|s| s.into_owned()))
        .collect()
}

/// Build a magnet URI from its parts.
pub fn build_magnet(info_hash: &str, name: &str, trackers: &[String]) -> String {
    let mut magnet = format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        info_hash,
        urlencoding::encode(name)
    );
    for tracker in trackers {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}

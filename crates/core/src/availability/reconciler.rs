//! Request-scoped reconciliation of releases against backend availability.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::normalizers::{self, NormalizeFailure, Observation};
use super::{AvailabilityReport, BackendKind, ReconcileError};
use crate::matcher::{
    is_video_file, match_release, nearest_episode_fallback, select_episode_file, select_largest,
    FallbackPolicy, FileMatch,
};
use crate::media::RequestedMedia;
use crate::metrics;
use crate::release::{ManifestFile, ReleaseDescriptor, TitleParser};

/// Holds the candidate releases of one request, indexed by info hash.
///
/// Backend reports are folded in with [`Reconciler::update_availability`];
/// [`Reconciler::best_matching`] then yields what is worth offering.
pub struct Reconciler {
    media: RequestedMedia,
    parser: Arc<dyn TitleParser>,
    /// Policy handed to aggregator normalizers for series.
    fallback: FallbackPolicy,
    items: Vec<ReleaseDescriptor>,
    by_hash: HashMap<String, usize>,
}

impl Reconciler {
    pub fn new(
        descriptors: Vec<ReleaseDescriptor>,
        media: RequestedMedia,
        parser: Arc<dyn TitleParser>,
    ) -> Result<Self, ReconcileError> {
        media.episode_target()?;
        let mut reconciler = Self {
            media,
            parser,
            fallback: FallbackPolicy::NearestEpisode,
            items: Vec::new(),
            by_hash: HashMap::new(),
        };
        reconciler.index(descriptors);
        Ok(reconciler)
    }

    pub fn with_fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback = policy;
        self
    }

    fn index(&mut self, descriptors: Vec<ReleaseDescriptor>) {
        for mut descriptor in descriptors {
            descriptor.info_hash = descriptor.info_hash.trim().to_lowercase();
            if descriptor.info_hash.is_empty() {
                debug!(title = %descriptor.raw_title, "Dropping release without hash");
                continue;
            }
            if self.by_hash.contains_key(&descriptor.info_hash) {
                debug!(hash = %descriptor.info_hash, "Duplicate hash, keeping first seen");
                continue;
            }
            self.by_hash
                .insert(descriptor.info_hash.clone(), self.items.len());
            self.items.push(descriptor);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn media(&self) -> &RequestedMedia {
        &self.media
    }

    pub fn get(&self, hash: &str) -> Option<&ReleaseDescriptor> {
        self.by_hash
            .get(&hash.to_lowercase())
            .map(|&idx| &self.items[idx])
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[ReleaseDescriptor] {
        &self.items
    }

    /// Hashes no backend has confirmed yet.
    pub fn unavailable_hashes(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.availability.is_none())
            .map(|item| item.info_hash.clone())
            .collect()
    }

    pub fn public_items(&self) -> Vec<&ReleaseDescriptor> {
        self.items.iter().filter(|item| item.is_public()).collect()
    }

    /// Releases worth offering for the requested media.
    ///
    /// Magnets are always kept. Web-locator releases are kept when their file
    /// is known, when their manifest holds the requested episode, or when the
    /// title marks a complete collection. Other season packs are dropped.
    pub fn best_matching(&mut self) -> Vec<ReleaseDescriptor> {
        let target = match self.media.episode_target() {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "Invalid requested media, nothing matches");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for item in self.items.iter_mut() {
            if item.is_magnet() || item.file_index.is_some() {
                out.push(item.clone());
                continue;
            }

            let manifest = item.full_index.clone().unwrap_or_default();
            match target {
                Some((season, episode)) => {
                    match match_release(
                        &item.raw_title,
                        &manifest,
                        season,
                        episode,
                        self.parser.as_ref(),
                        FallbackPolicy::Disabled,
                    ) {
                        FileMatch::Exact(file) | FileMatch::Fallback(file) => {
                            item.select_file(&file);
                            out.push(item.clone());
                        }
                        FileMatch::CompleteCollection => out.push(item.clone()),
                        FileMatch::NoMatch => {
                            debug!(hash = %item.info_hash, title = %item.raw_title, "Season pack has no matching file")
                        }
                    }
                }
                None => {
                    if let Some(file) = select_largest(&manifest).cloned() {
                        item.select_file(&file);
                    }
                    out.push(item.clone());
                }
            }
        }

        info!(
            candidates = self.items.len(),
            matched = out.len(),
            "Selected best matching releases"
        );
        out
    }

    /// Fold a backend's availability report into the indexed items.
    ///
    /// Returns how many items were confirmed. Empty, malformed or error
    /// reports change nothing.
    pub fn update_availability(
        &mut self,
        report: &AvailabilityReport,
        backend: &BackendKind,
        media: &RequestedMedia,
    ) -> Result<usize, ReconcileError> {
        let target = media.episode_target()?;
        let label = backend.code();

        if report.is_empty() {
            debug!(backend = %label, "Empty availability report");
            metrics::AVAILABILITY_REPORTS
                .with_label_values(&[&label, "empty"])
                .inc();
            return Ok(0);
        }

        let observations = match normalizers::normalize(backend, report, self.fallback)? {
            Ok(observations) => observations,
            Err(NormalizeFailure::Malformed(e)) => {
                warn!(backend = %label, error = %e, "Malformed availability report, ignoring");
                metrics::AVAILABILITY_REPORTS
                    .with_label_values(&[&label, "malformed"])
                    .inc();
                return Ok(0);
            }
            Err(NormalizeFailure::BackendError(message)) => {
                warn!(backend = %label, error = %message, "Backend reported an error, ignoring");
                metrics::AVAILABILITY_REPORTS
                    .with_label_values(&[&label, "error"])
                    .inc();
                return Ok(0);
            }
        };

        let mut confirmed = 0;
        for observation in observations {
            let Some(&idx) = self.by_hash.get(&observation.hash) else {
                debug!(backend = %label, hash = %observation.hash, "Hash not indexed, ignoring");
                continue;
            };
            let item = &mut self.items[idx];
            apply_observation(item, observation, target, self.parser.as_ref());
            confirmed += 1;
        }

        metrics::AVAILABILITY_REPORTS
            .with_label_values(&[&label, "applied"])
            .inc();
        metrics::AVAILABILITY_CONFIRMED
            .with_label_values(&[&label])
            .inc_by(confirmed as u64);
        info!(backend = %label, confirmed, "Applied availability report");
        Ok(confirmed)
    }
}

/// Record one confirmation. A selected file overwrites an earlier selection;
/// no selection leaves it untouched.
fn apply_observation(
    item: &mut ReleaseDescriptor,
    observation: Observation,
    target: Option<(u32, u32)>,
    parser: &dyn TitleParser,
) {
    item.availability = Some(observation.code.clone());

    let selected = match (&observation.files, target) {
        (Some(files), Some((season, episode))) => {
            select_episode_file(files, season, episode, parser).or_else(|| {
                match observation.fallback {
                    FallbackPolicy::NearestEpisode => {
                        nearest_episode_fallback(files, season, episode, parser)
                    }
                    FallbackPolicy::Disabled => None,
                }
            })
        }
        (Some(files), None) => select_largest(files).cloned(),
        (None, Some((season, episode))) => item
            .full_index
            .as_deref()
            .and_then(|manifest| select_episode_file(manifest, season, episode, parser)),
        (None, None) => None,
    };

    if let Some(files) = observation.files {
        if item.full_index.is_none() {
            let videos: Vec<ManifestFile> = files
                .into_iter()
                .filter(|f| is_video_file(&f.file_name))
                .collect();
            if !videos.is_empty() {
                item.full_index = Some(videos);
            }
        }
    }

    match selected {
        Some(file) => {
            debug!(
                hash = %item.info_hash,
                backend = %observation.code,
                file = %file.file_name,
                "Selected file from availability report"
            );
            item.select_file(&file);
        }
        None => debug!(
            hash = %item.info_hash,
            backend = %observation.code,
            "Confirmed without file selection"
        ),
    }
}

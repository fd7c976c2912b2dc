//! Per-backend availability payload normalizers.
//!
//! Each normalizer turns one backend's report into [`Observation`]s: which
//! hash was confirmed, under which code, and (when the backend lists them)
//! which files it holds. File selection happens in the reconciler.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tracing::{debug, warn};

use super::{store_code, AvailabilityReport, BackendKind, ReconcileError};
use crate::matcher::FallbackPolicy;
use crate::release::ManifestFile;

/// One confirmed hash from a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Lowercase info hash.
    pub hash: String,
    /// Availability code to record.
    pub code: String,
    /// Files listed by the backend. `None` for coarse reports.
    pub files: Option<Vec<ManifestFile>>,
    /// Policy used for series when strict matching finds nothing.
    pub fallback: FallbackPolicy,
}

impl Observation {
    fn new(hash: &str, code: &str, files: Option<Vec<ManifestFile>>) -> Self {
        Self {
            hash: hash.to_lowercase(),
            code: code.to_string(),
            files,
            fallback: FallbackPolicy::Disabled,
        }
    }
}

/// Why a report yielded nothing.
#[derive(Debug)]
pub enum NormalizeFailure {
    /// The payload did not have the expected shape.
    Malformed(serde_json::Error),
    /// The backend reported an error instead of results.
    BackendError(String),
}

impl From<serde_json::Error> for NormalizeFailure {
    fn from(e: serde_json::Error) -> Self {
        NormalizeFailure::Malformed(e)
    }
}

/// Dispatch to the normalizer for `backend`.
///
/// The outer `Result` carries programming errors (unknown backend); the inner
/// one carries payload problems that callers log and skip.
pub fn normalize(
    backend: &BackendKind,
    report: &AvailabilityReport,
    stremthru_fallback: FallbackPolicy,
) -> Result<Result<Vec<Observation>, NormalizeFailure>, ReconcileError> {
    let value = report.value().clone();
    Ok(match backend {
        BackendKind::RealDebrid => real_debrid(value),
        BackendKind::AllDebrid => all_debrid(value),
        BackendKind::Torbox => torbox(value),
        BackendKind::Premiumize => premiumize(value),
        BackendKind::StremThru { .. } => {
            let code = backend.availability_code()?;
            stremthru(value, &code, stremthru_fallback)
        }
    })
}

// =============================================================================
// RealDebrid
// =============================================================================

#[derive(Deserialize)]
struct RdEntry {
    #[serde(default)]
    rd: Vec<HashMap<String, RdFile>>,
}

#[derive(Deserialize)]
struct RdFile {
    filename: String,
    #[serde(default)]
    filesize: u64,
}

/// `{hash: {"rd": [{file_id: {filename, filesize}}]}}`
fn real_debrid(value: serde_json::Value) -> Result<Vec<Observation>, NormalizeFailure> {
    let entries: HashMap<String, serde_json::Value> = serde_json::from_value(value)?;
    let mut out = Vec::new();
    for (hash, raw) in entries {
        // Uncached hashes come back as `[]` rather than an object.
        let Ok(entry) = serde_json::from_value::<RdEntry>(raw) else {
            debug!(hash = %hash, "Unexpected RealDebrid entry, skipping");
            continue;
        };
        if entry.rd.is_empty() {
            debug!(hash = %hash, "No RealDebrid variants, skipping");
            continue;
        }
        // Variants overlap; keep one entry per file id.
        let mut files: BTreeMap<u32, ManifestFile> = BTreeMap::new();
        for variant in entry.rd {
            for (id, file) in variant {
                let Ok(index) = id.parse::<u32>() else {
                    debug!(hash = %hash, id = %id, "Ignoring non-numeric file id");
                    continue;
                };
                files
                    .entry(index)
                    .or_insert_with(|| ManifestFile::new(index, file.filename, file.filesize));
            }
        }
        out.push(Observation::new(&hash, "RD", Some(files.into_values().collect())));
    }
    Ok(out)
}

// =============================================================================
// AllDebrid
// =============================================================================

#[derive(Deserialize)]
struct AdResponse {
    status: String,
    #[serde(default)]
    data: Option<AdData>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct AdData {
    #[serde(default)]
    magnets: Vec<AdMagnet>,
}

#[derive(Deserialize)]
struct AdMagnet {
    hash: String,
    #[serde(default)]
    instant: Option<bool>,
    #[serde(default)]
    files: Vec<AdNode>,
}

/// File (`n`, `s`) or folder (`n`, `e`) in an AllDebrid tree.
#[derive(Deserialize)]
struct AdNode {
    n: String,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    e: Option<Vec<AdNode>>,
}

/// `{status, data: {magnets: [{hash, files: [{n, s, e}]}]}}`
fn all_debrid(value: serde_json::Value) -> Result<Vec<Observation>, NormalizeFailure> {
    let response: AdResponse = serde_json::from_value(value)?;
    if response.status != "success" {
        return Err(NormalizeFailure::BackendError(
            response
                .error
                .map(|e| e.to_string())
                .unwrap_or(response.status),
        ));
    }

    let magnets = response.data.map(|d| d.magnets).unwrap_or_default();
    Ok(magnets
        .into_iter()
        .filter(|m| m.instant != Some(false))
        .map(|m| {
            let mut files = Vec::new();
            let mut next_index = 1;
            flatten_tree(&m.files, &mut next_index, &mut files);
            let files = (!files.is_empty()).then_some(files);
            Observation::new(&m.hash, "AD", files)
        })
        .collect())
}

/// Depth-first flatten. Leaves get sequential indices in traversal order.
fn flatten_tree(nodes: &[AdNode], next_index: &mut u32, out: &mut Vec<ManifestFile>) {
    for node in nodes {
        match &node.e {
            Some(children) => flatten_tree(children, next_index, out),
            None => {
                out.push(ManifestFile::new(
                    *next_index,
                    node.n.clone(),
                    node.s.unwrap_or(0),
                ));
                *next_index += 1;
            }
        }
    }
}

// =============================================================================
// TorBox
// =============================================================================

#[derive(Deserialize)]
struct TbResponse {
    success: bool,
    #[serde(default)]
    data: Option<Vec<TbItem>>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Deserialize)]
struct TbItem {
    hash: String,
    #[serde(default)]
    files: Vec<TbFile>,
}

#[derive(Deserialize)]
struct TbFile {
    name: String,
    #[serde(default)]
    size: u64,
}

/// `{success, data: [{hash, files: [{name, size}]}]}`; file index is position.
fn torbox(value: serde_json::Value) -> Result<Vec<Observation>, NormalizeFailure> {
    let response: TbResponse = serde_json::from_value(value)?;
    if !response.success {
        return Err(NormalizeFailure::BackendError(
            response.detail.unwrap_or_else(|| "success=false".to_string()),
        ));
    }

    Ok(response
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|item| {
            let files = item
                .files
                .into_iter()
                .enumerate()
                .map(|(idx, f)| ManifestFile::new(idx as u32, f.name, f.size))
                .collect();
            Observation::new(&item.hash, "TB", Some(files))
        })
        .collect())
}

// =============================================================================
// Premiumize (coarse)
// =============================================================================

#[derive(Deserialize)]
struct PmStatus {
    #[serde(default)]
    transcoded: bool,
    #[serde(default)]
    files: Option<Vec<PmFile>>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    filesize: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct PmFile {
    #[serde(default)]
    cached: bool,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    file_index: u32,
    #[serde(default)]
    title: String,
}

/// `{hash: {transcoded, files?, filename?, filesize?}}`
///
/// Only cached files (or the single filename/filesize pair) are reported.
/// Without either, the observation is coarse.
fn premiumize(value: serde_json::Value) -> Result<Vec<Observation>, NormalizeFailure> {
    let statuses: HashMap<String, PmStatus> = serde_json::from_value(value)?;
    Ok(statuses
        .into_iter()
        .filter(|(_, status)| status.transcoded)
        .map(|(hash, status)| {
            let mut files: Vec<ManifestFile> = status
                .files
                .unwrap_or_default()
                .into_iter()
                .filter(|f| f.cached)
                .map(|f| ManifestFile::new(f.file_index, f.title, f.size))
                .collect();
            if files.is_empty() {
                if let (Some(name), Some(size)) =
                    (status.filename, status.filesize.as_ref().and_then(json_u64))
                {
                    files.push(ManifestFile::new(0, name, size));
                }
            }
            Observation::new(&hash, "PM", (!files.is_empty()).then_some(files))
        })
        .collect())
}

/// Premiumize sends sizes as numbers or numeric strings.
fn json_u64(value: &serde_json::Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

// =============================================================================
// StremThru
// =============================================================================

#[derive(Deserialize)]
struct StItem {
    hash: String,
    #[serde(default)]
    debrid: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    files: Vec<StFile>,
}

#[derive(Deserialize)]
struct StFile {
    #[serde(default)]
    index: u32,
    name: String,
    #[serde(default)]
    size: u64,
}

const STORE_CODES: &[&str] = &["RD", "AD", "TB", "PM", "OC", "DBL", "ED", "PK"];

/// Availability code named by a per-item override, given as a code or a store name.
fn override_code(value: &str) -> Option<&'static str> {
    STORE_CODES
        .iter()
        .copied()
        .find(|code| code.eq_ignore_ascii_case(value))
        .or_else(|| store_code(value))
}

/// `[{hash, debrid?, status?, files: [{index, name, size}]}]`
///
/// A per-item `debrid` value overrides the underlying store code. Items whose
/// override names no known store are dropped.
fn stremthru(
    value: serde_json::Value,
    default_code: &str,
    fallback: FallbackPolicy,
) -> Result<Vec<Observation>, NormalizeFailure> {
    let items: Vec<StItem> = serde_json::from_value(value)?;
    Ok(items
        .into_iter()
        .filter(|item| item.status.as_deref().map_or(true, |s| s == "cached"))
        .filter_map(|item| {
            let code = match item.debrid.as_deref() {
                None => default_code,
                Some(name) => match override_code(name) {
                    Some(code) => code,
                    None => {
                        warn!(hash = %item.hash, debrid = %name, "Unknown debrid override, skipping item");
                        return None;
                    }
                },
            };
            let files = item
                .files
                .into_iter()
                .map(|f| ManifestFile::new(f.index, f.name, f.size))
                .collect::<Vec<_>>();
            let mut observation =
                Observation::new(&item.hash, code, (!files.is_empty()).then_some(files));
            observation.fallback = fallback;
            Some(observation)
        })
        .collect())
}

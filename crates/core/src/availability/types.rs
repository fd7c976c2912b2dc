//! Backend kinds, availability payloads and reconciliation errors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::MediaError;

/// Availability check payload as returned by a backend.
///
/// Shape depends on the backend; only the matching normalizer understands it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityReport(pub serde_json::Value);

impl AvailabilityReport {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Null, `{}` and `[]` carry no information.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            serde_json::Value::Array(list) => list.is_empty(),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for AvailabilityReport {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Cached-content backend providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    RealDebrid,
    AllDebrid,
    Torbox,
    /// Reports a cached flag per hash without usable file detail.
    Premiumize,
    /// Aggregator in front of another store (e.g. `"realdebrid"`).
    StremThru { store: String },
}

impl BackendKind {
    /// Short service code used in playback queries and descriptors.
    pub fn code(&self) -> String {
        match self {
            BackendKind::RealDebrid => "RD".to_string(),
            BackendKind::AllDebrid => "AD".to_string(),
            BackendKind::Torbox => "TB".to_string(),
            BackendKind::Premiumize => "PM".to_string(),
            BackendKind::StremThru { store } => format!("ST:{}", store),
        }
    }

    /// Code written into `availability` when this backend confirms content.
    ///
    /// StremThru reports on behalf of its underlying store.
    pub fn availability_code(&self) -> Result<String, ReconcileError> {
        match self {
            BackendKind::StremThru { store } => store_code(store)
                .map(str::to_string)
                .ok_or_else(|| ReconcileError::UnknownBackend(self.code())),
            other => Ok(other.code()),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for BackendKind {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RD" => Ok(BackendKind::RealDebrid),
            "AD" => Ok(BackendKind::AllDebrid),
            "TB" => Ok(BackendKind::Torbox),
            "PM" => Ok(BackendKind::Premiumize),
            _ => match s.strip_prefix("ST:") {
                Some(store) if store_code(store).is_some() => Ok(BackendKind::StremThru {
                    store: store.to_string(),
                }),
                _ => Err(ReconcileError::UnknownBackend(s.to_string())),
            },
        }
    }
}

/// Short code of a store reachable through StremThru.
pub fn store_code(store: &str) -> Option<&'static str> {
    match store.to_ascii_lowercase().as_str() {
        "realdebrid" => Some("RD"),
        "alldebrid" => Some("AD"),
        "torbox" => Some("TB"),
        "premiumize" => Some("PM"),
        "offcloud" => Some("OC"),
        "debridlink" => Some("DBL"),
        "easydebrid" => Some("ED"),
        "pikpak" => Some("PK"),
        _ => None,
    }
}

/// Errors raised while reconciling availability.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// A backend kind the reconciler has no normalizer for.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Invalid requested media: {0}")]
    InvalidMedia(#[from] MediaError),
}

//! The media a user asked for.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::release::MediaType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("Invalid season format: {0}")]
    InvalidSeason(String),

    #[error("Invalid episode format: {0}")]
    InvalidEpisode(String),
}

/// Movie or series episode target.
///
/// Season and episode keep their normalized `Sxx` / `Exx` string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series { season: String, episode: String },
}

/// Target of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedMedia {
    /// External identifier (e.g. an IMDb id).
    pub id: String,
    /// Candidate titles, most relevant first.
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(flatten)]
    pub kind: MediaKind,
}

impl RequestedMedia {
    pub fn movie(id: impl Into<String>, titles: Vec<String>) -> Self {
        Self {
            id: id.into(),
            titles,
            kind: MediaKind::Movie,
        }
    }

    /// Build a series request from numbers, normalizing to `Sxx` / `Exx`.
    pub fn series(id: impl Into<String>, titles: Vec<String>, season: u32, episode: u32) -> Self {
        Self {
            id: id.into(),
            titles,
            kind: MediaKind::Series {
                season: format!("S{:02}", season),
                episode: format!("E{:02}", episode),
            },
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self.kind {
            MediaKind::Movie => MediaType::Movie,
            MediaKind::Series { .. } => MediaType::Series,
        }
    }

    /// Requested `(season, episode)` for series, `None` for movies.
    pub fn episode_target(&self) -> Result<Option<(u32, u32)>, MediaError> {
        match &self.kind {
            MediaKind::Movie => Ok(None),
            MediaKind::Series { season, episode } => {
                Ok(Some((parse_season(season)?, parse_episode(episode)?)))
            }
        }
    }
}

/// `"S02"` -> 2.
pub fn parse_season(value: &str) -> Result<u32, MediaError> {
    parse_prefixed(value, 'S').ok_or_else(|| MediaError::InvalidSeason(value.to_string()))
}

/// `"E05"` -> 5.
pub fn parse_episode(value: &str) -> Result<u32, MediaError> {
    parse_prefixed(value, 'E').ok_or_else(|| MediaError::InvalidEpisode(value.to_string()))
}

fn parse_prefixed(value: &str, prefix: char) -> Option<u32> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix(prefix)
        .or_else(|| trimmed.strip_prefix(prefix.to_ascii_lowercase()))
        .unwrap_or(trimmed);
    digits.parse().ok()
}

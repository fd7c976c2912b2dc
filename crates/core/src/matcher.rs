//! Picks the right file inside a multi-file release.
//!
//! Matching is strict by default: a file matches when its parsed seasons
//! contain the requested season and its parsed episodes contain the requested
//! episode. The nearest-episode fallback is opt-in via [`FallbackPolicy`].

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::release::{file_extension, inline_episode_match, ManifestFile, TitleParser, VIDEO_EXTENSIONS};

static COMPLETE_COLLECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)integrale|complete|complet|integral").unwrap());

/// What to do when no file matches the requested episode exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Return no file.
    #[default]
    Disabled,
    /// Pick the file with the closest episode number in the same season.
    NearestEpisode,
}

/// Outcome of matching a release against a requested episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMatch {
    /// A file matched season and episode exactly.
    Exact(ManifestFile),
    /// Nothing matched but the release is a complete collection. No file is chosen.
    CompleteCollection,
    /// Chosen by the fallback policy, not a confident match.
    Fallback(ManifestFile),
    NoMatch,
}

impl FileMatch {
    /// File selected by this match, if any.
    pub fn file(&self) -> Option<&ManifestFile> {
        match self {
            FileMatch::Exact(f) | FileMatch::Fallback(f) => Some(f),
            FileMatch::CompleteCollection | FileMatch::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, FileMatch::NoMatch)
    }
}

pub fn is_video_file(name: &str) -> bool {
    file_extension(name)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// True when a release title marks a complete collection.
pub fn is_complete_collection(title: &str) -> bool {
    COMPLETE_COLLECTION.is_match(title)
}

/// Largest video file. Ties keep the earliest.
pub fn select_largest(files: &[ManifestFile]) -> Option<&ManifestFile> {
    files
        .iter()
        .filter(|f| is_video_file(&f.file_name))
        .fold(None, |best: Option<&ManifestFile>, f| match best {
            Some(b) if b.size >= f.size => Some(b),
            _ => Some(f),
        })
}

/// Seasons and episodes of a manifest file.
///
/// Uses pre-parsed values when the manifest carries them, otherwise runs the
/// parser, and falls back to inline `SxxEyy` matching when the parser finds nothing.
fn episode_info(file: &ManifestFile, parser: &dyn TitleParser) -> (Vec<u32>, Vec<u32>) {
    if !file.seasons.is_empty() || !file.episodes.is_empty() {
        return (file.seasons.clone(), file.episodes.clone());
    }
    let parsed = parser.parse(&file.file_name);
    if parsed.has_episode_info() {
        return (parsed.seasons, parsed.episodes);
    }
    match inline_episode_match(&file.file_name) {
        Some((season, episode)) => (vec![season], vec![episode]),
        None => (Vec::new(), Vec::new()),
    }
}

/// Select the video file for `season`/`episode`. Larger files win ties.
pub fn select_episode_file(
    files: &[ManifestFile],
    season: u32,
    episode: u32,
    parser: &dyn TitleParser,
) -> Option<ManifestFile> {
    let mut best: Option<&ManifestFile> = None;
    for file in files.iter().filter(|f| is_video_file(&f.file_name)) {
        let (seasons, episodes) = episode_info(file, parser);
        if !(seasons.contains(&season) && episodes.contains(&episode)) {
            continue;
        }
        if best.map_or(true, |b| file.size > b.size) {
            best = Some(file);
        }
    }

    match best {
        Some(f) => debug!(file = %f.file_name, season, episode, "Matched episode file"),
        None => debug!(season, episode, files = files.len(), "No episode file matched"),
    }
    best.cloned()
}

/// Fallback of last resort: the file in `season` whose episode number is
/// closest to `episode`. Larger files win ties.
pub fn nearest_episode_fallback(
    files: &[ManifestFile],
    season: u32,
    episode: u32,
    parser: &dyn TitleParser,
) -> Option<ManifestFile> {
    let mut best: Option<(&ManifestFile, u32)> = None;
    for file in files.iter().filter(|f| is_video_file(&f.file_name)) {
        let (seasons, episodes) = episode_info(file, parser);
        if !seasons.contains(&season) {
            continue;
        }
        let Some(distance) = episodes.iter().map(|e| e.abs_diff(episode)).min() else {
            continue;
        };
        let better = match best {
            None => true,
            Some((b, d)) => distance < d || (distance == d && file.size > b.size),
        };
        if better {
            best = Some((file, distance));
        }
    }

    best.map(|(file, distance)| {
        warn!(
            file = %file.file_name,
            season,
            episode,
            distance,
            "No exact episode match, using nearest episode as fallback"
        );
        file.clone()
    })
}

/// Match a release (title + manifest) against a requested episode.
pub fn match_release(
    title: &str,
    files: &[ManifestFile],
    season: u32,
    episode: u32,
    parser: &dyn TitleParser,
    policy: FallbackPolicy,
) -> FileMatch {
    if let Some(file) = select_episode_file(files, season, episode, parser) {
        return FileMatch::Exact(file);
    }
    if is_complete_collection(title) {
        debug!(title, "Release is a complete collection, deferring file choice");
        return FileMatch::CompleteCollection;
    }
    match policy {
        FallbackPolicy::NearestEpisode => nearest_episode_fallback(files, season, episode, parser)
            .map(FileMatch::Fallback)
            .unwrap_or(FileMatch::NoMatch),
        FallbackPolicy::Disabled => FileMatch::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{ParsedMetadata, PatternParser};

    fn file(index: u32, name: &str, size: u64) -> ManifestFile {
        ManifestFile::new(index, name, size)
    }

    /// Parser that never recognizes anything.
    struct BlindParser;

    impl TitleParser for BlindParser {
        fn parse(&self, _name: &str) -> ParsedMetadata {
            ParsedMetadata::default()
        }
    }

    #[test]
    fn test_select_episode_file_prefers_larger() {
        let files = vec![
            file(0, "Show.S02E04.mkv", 2000),
            file(1, "Show.S02E05.720p.mkv", 900),
            file(2, "Show.S02E05.1080p.mkv", 1400),
        ];
        let chosen = select_episode_file(&files, 2, 5, &PatternParser::new()).unwrap();
        assert_eq!(chosen.file_index, 2);
        assert_eq!(chosen.size, 1400);
    }

    #[test]
    fn test_select_episode_file_uses_preparsed_manifest() {
        let mut a = file(0, "a.mkv", 900);
        a.seasons = vec![2];
        a.episodes = vec![5];
        let mut b = file(1, "b.mkv", 1400);
        b.seasons = vec![2];
        b.episodes = vec![5];

        let chosen = select_episode_file(&[a, b], 2, 5, &BlindParser).unwrap();
        assert_eq!(chosen.size, 1400);
    }

    #[test]
    fn test_select_episode_file_inline_fallback() {
        let files = vec![file(7, "show.s01e03.mkv", 10)];
        let chosen = select_episode_file(&files, 1, 3, &BlindParser).unwrap();
        assert_eq!(chosen.file_index, 7);
    }

    #[test]
    fn test_select_episode_file_ignores_non_video() {
        let files = vec![file(0, "Show.S01E01.srt", 10)];
        assert!(select_episode_file(&files, 1, 1, &PatternParser::new()).is_none());
    }

    #[test]
    fn test_select_largest() {
        let files = vec![
            file(0, "a.mkv", 100),
            file(1, "b.mkv", 900),
            file(2, "c.mp4", 300),
        ];
        assert_eq!(select_largest(&files).unwrap().size, 900);
        assert!(select_largest(&[]).is_none());
    }

    #[test]
    fn test_select_largest_skips_non_video() {
        let files = vec![
            file(0, "Film.2020.mkv", 700),
            file(1, "Film.2020.iso", 4000),
            file(2, "extras.rar", 2000),
        ];
        assert_eq!(select_largest(&files).unwrap().file_index, 0);

        let archives = vec![file(0, "disc.iso", 4000)];
        assert!(select_largest(&archives).is_none());
    }

    #[test]
    fn test_is_complete_collection() {
        assert!(is_complete_collection("Show COMPLETE Series"));
        assert!(is_complete_collection("Show.Integrale.FRENCH"));
        assert!(is_complete_collection("show complet"));
        assert!(!is_complete_collection("Show S01E01"));
    }

    #[test]
    fn test_match_release_complete_collection() {
        let files = vec![file(0, "Bonus.mkv", 10)];
        let result = match_release(
            "Show COMPLETE 1080p",
            &files,
            3,
            1,
            &PatternParser::new(),
            FallbackPolicy::Disabled,
        );
        assert_eq!(result, FileMatch::CompleteCollection);
        assert!(result.file().is_none());
        assert!(result.is_match());
    }

    #[test]
    fn test_match_release_nearest_episode_fallback() {
        let files = vec![
            file(0, "Show.S01E01.mkv", 10),
            file(1, "Show.S01E04.mkv", 10),
            file(2, "Show.S01E07.mkv", 10),
            file(3, "Show.S02E06.mkv", 10),
        ];
        let parser = PatternParser::new();

        let strict = match_release("Show S01", &files, 1, 6, &parser, FallbackPolicy::Disabled);
        assert_eq!(strict, FileMatch::NoMatch);

        let loose = match_release("Show S01", &files, 1, 6, &parser, FallbackPolicy::NearestEpisode);
        match loose {
            FileMatch::Fallback(f) => assert_eq!(f.file_index, 2),
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_nearest_episode_requires_same_season() {
        let files = vec![file(0, "Show.S02E06.mkv", 10)];
        assert!(nearest_episode_fallback(&files, 1, 6, &PatternParser::new()).is_none());
    }
}

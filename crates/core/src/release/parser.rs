//! Release title / file name parsing.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::ParsedMetadata;

/// Extracts structured metadata from a release title or file name.
pub trait TitleParser: Send + Sync {
    fn parse(&self, name: &str) -> ParsedMetadata;
}

static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bs(\d{1,2})[ ._-]?e(\d{1,3})(?:(?:[ ._]?-[ ._]?e?|[ ._]?e)(\d{1,3}))?")
        .unwrap()
});
static CROSS_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{2,3})\b").unwrap());
static SEASON_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ ._]?-[ ._]?s?(\d{1,2})\b").unwrap());
static SEASON_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})\b").unwrap());
static SEASON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:season|saison)[ ._-]?(\d{1,2})\b").unwrap());
static EPISODE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:episode|ep)[ ._-]?(\d{1,3})\b").unwrap());
static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(2160p|1440p|1080p|720p|576p|480p|4k|uhd)\b").unwrap());
static CODEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(x264|x265|h\.?264|h\.?265|hevc|avc|av1|xvid)\b").unwrap());
static QUALITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(remux|bluray|blu-ray|bdrip|brrip|web-?dl|webrip|hdtv|dvdrip|hdlight|hdrip|cam)\b")
        .unwrap()
});
static AUDIO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(aac|ac3|e-?ac3|ddp?5\.1|dts(?:-hd)?|truehd|atmos|flac|opus|mp3)\b").unwrap()
});
static GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-([A-Za-z0-9]+)$").unwrap());

/// Longest episode range expanded from a title like `S01E01-E24`.
const MAX_EPISODE_RANGE: u32 = 100;

/// Built-in pattern based parser.
///
/// Understands `S01E02`, `S01E01-E03`, `1x02`, `S01-S03`, `Season 2`,
/// `Episode 4` and common quality tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternParser;

impl PatternParser {
    pub fn new() -> Self {
        Self
    }
}

impl TitleParser for PatternParser {
    fn parse(&self, name: &str) -> ParsedMetadata {
        let stem = strip_extension(name);
        let mut seasons = Vec::new();
        let mut episodes = Vec::new();

        for caps in SEASON_EPISODE.captures_iter(stem) {
            let (Some(season), Some(start)) = (capture_u32(&caps, 1), capture_u32(&caps, 2))
            else {
                continue;
            };
            seasons.push(season);
            match capture_u32(&caps, 3) {
                Some(end) if end > start && end - start <= MAX_EPISODE_RANGE => {
                    episodes.extend(start..=end)
                }
                _ => episodes.push(start),
            }
        }

        if seasons.is_empty() {
            for caps in CROSS_EPISODE.captures_iter(stem) {
                if let (Some(season), Some(episode)) = (capture_u32(&caps, 1), capture_u32(&caps, 2))
                {
                    seasons.push(season);
                    episodes.push(episode);
                }
            }
        }

        if seasons.is_empty() {
            if let Some(caps) = SEASON_RANGE.captures(stem) {
                if let (Some(first), Some(last)) = (capture_u32(&caps, 1), capture_u32(&caps, 2)) {
                    if last >= first {
                        seasons.extend(first..=last);
                    }
                }
            }
        }

        if seasons.is_empty() {
            seasons.extend(
                SEASON_ONLY
                    .captures_iter(stem)
                    .chain(SEASON_WORD.captures_iter(stem))
                    .filter_map(|caps| capture_u32(&caps, 1)),
            );
        }

        if episodes.is_empty() {
            episodes.extend(
                EPISODE_WORD
                    .captures_iter(stem)
                    .filter_map(|caps| capture_u32(&caps, 1)),
            );
        }

        seasons.sort_unstable();
        seasons.dedup();
        episodes.sort_unstable();
        episodes.dedup();

        ParsedMetadata {
            seasons,
            episodes,
            resolution: first_match(&RESOLUTION, stem).map(|r| r.to_lowercase()),
            codec: first_match(&CODEC, stem).map(|c| c.to_lowercase()),
            quality: first_match(&QUALITY, stem).map(|q| q.to_lowercase()),
            audio: {
                let mut audio: Vec<String> = AUDIO
                    .find_iter(stem)
                    .map(|m| m.as_str().to_lowercase())
                    .collect();
                audio.dedup();
                audio
            },
            group: GROUP
                .captures(stem)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        }
    }
}

/// Quick `SxxEyy` / `NxNN` lookup for a file name.
///
/// Used by the matcher when a parser finds no season or episode at all.
pub fn inline_episode_match(name: &str) -> Option<(u32, u32)> {
    let caps = SEASON_EPISODE
        .captures(name)
        .or_else(|| CROSS_EPISODE.captures(name))?;
    Some((capture_u32(&caps, 1)?, capture_u32(&caps, 2)?))
}

fn capture_u32(caps: &regex_lite::Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn first_match<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.find(text).map(|m| m.as_str())
}

/// File extensions treated as playable video.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "m2ts", "ts", "vob",
    "ogv", "3gp", "divx", "rmvb",
];

/// Extension of a path, lowercased, without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    file.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

fn strip_extension(name: &str) -> &str {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file.rsplit_once('.') {
        Some((stem, ext)) if VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(ext)) => stem,
        _ => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str) -> ParsedMetadata {
        PatternParser::new().parse(name)
    }

    #[test]
    fn test_parse_standard_episode() {
        let parsed = parse("Show.Name.S02E05.1080p.WEB-DL.x264-GROUP.mkv");
        assert_eq!(parsed.seasons, vec![2]);
        assert_eq!(parsed.episodes, vec![5]);
        assert_eq!(parsed.resolution.as_deref(), Some("1080p"));
        assert_eq!(parsed.codec.as_deref(), Some("x264"));
        assert_eq!(parsed.quality.as_deref(), Some("web-dl"));
        assert_eq!(parsed.group.as_deref(), Some("GROUP"));
    }

    #[test]
    fn test_parse_episode_range() {
        let parsed = parse("Show.S01E01-E03.720p.HDTV");
        assert_eq!(parsed.seasons, vec![1]);
        assert_eq!(parsed.episodes, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_cross_format() {
        let parsed = parse("show 3x07 hdtv.avi");
        assert_eq!(parsed.seasons, vec![3]);
        assert_eq!(parsed.episodes, vec![7]);
    }

    #[test]
    fn test_parse_season_pack() {
        let parsed = parse("Show.Name.S02.COMPLETE.1080p.BluRay");
        assert_eq!(parsed.seasons, vec![2]);
        assert!(parsed.episodes.is_empty());
    }

    #[test]
    fn test_parse_season_range() {
        let parsed = parse("Show Name S01-S03 Integrale");
        assert_eq!(parsed.seasons, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_season_word() {
        let parsed = parse("Show Name Saison 4 FRENCH");
        assert_eq!(parsed.seasons, vec![4]);
    }

    #[test]
    fn test_parse_movie_has_no_episode_info() {
        let parsed = parse("Movie.Title.2019.2160p.UHD.BluRay.REMUX.HEVC.TrueHD.Atmos-GRP");
        assert!(!parsed.has_episode_info());
        assert_eq!(parsed.resolution.as_deref(), Some("2160p"));
        assert_eq!(parsed.codec.as_deref(), Some("hevc"));
        assert!(parsed.audio.contains(&"truehd".to_string()));
    }

    #[test]
    fn test_inline_episode_match() {
        assert_eq!(inline_episode_match("a.s10e12.b"), Some((10, 12)));
        assert_eq!(inline_episode_match("a 2x03 b"), Some((2, 3)));
        assert_eq!(inline_episode_match("nothing here"), None);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a/b/Movie.MKV").as_deref(), Some("mkv"));
        assert_eq!(file_extension("README"), None);
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("dir/Show.S01E01.mkv"), "Show.S01E01");
        assert_eq!(strip_extension("Show.S01E01.1080p"), "Show.S01E01.1080p");
        assert_eq!(strip_extension("Show.2019.HDTV"), "Show.2019.HDTV");
        assert_eq!(strip_extension("Show S01E01"), "Show S01E01");
    }
}

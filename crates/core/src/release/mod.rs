//! Release descriptors: normalized candidate releases found by indexers.

mod parser;
mod store;
mod types;

pub use parser::{
    file_extension, inline_episode_match, PatternParser, TitleParser, VIDEO_EXTENSIONS,
};
pub use store::{build_magnet, extract_info_hash, extract_trackers, ReleaseStore};
pub use types::*;

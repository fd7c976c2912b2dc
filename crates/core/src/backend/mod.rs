//! Cached-content backend abstraction.
//!
//! Provider clients implement [`DebridBackend`]; the [`BackendRegistry`]
//! routes playback service codes to them.

mod registry;
mod types;

pub use registry::{BackendRegistry, DOWNLOAD_SERVICE};
pub use types::*;

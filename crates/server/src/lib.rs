//! HTTP surface of cachelink: playback, search and catalog endpoints.

pub mod api;
pub mod metrics;
pub mod state;

//! Playback resolution.
//!
//! A playback URL carries a [`UserConfig`] and a [`PlaybackQuery`]. The
//! [`PlaybackCoalescer`] makes sure identical requests share one upstream
//! resolution, performed by a [`LinkResolver`] such as [`BackendResolver`].

mod coalescer;
mod error;
mod key;
mod query;
mod rate_limit;
mod resolver;

pub use coalescer::{
    CoalescerSettings, LinkResolver, PlaybackCoalescer, PlaybackOutcome, PlaybackStatus,
    DOWNLOAD_IN_PROGRESS,
};
pub use error::PlaybackError;
pub use key::PlaybackRequestKey;
pub use query::{PlaybackQuery, QueryError, UserConfig};
pub use rate_limit::{RateDecision, RateLimitSettings, RateLimiter};
pub use resolver::BackendResolver;

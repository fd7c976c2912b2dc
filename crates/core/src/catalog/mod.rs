//! Public release catalog - a durable side cache of public releases.
//!
//! Searches persist the public descriptors they found so later searches can
//! reuse them without hitting the indexers again. Entries are keyed by info
//! hash and overwritten on collision; nothing is evicted automatically.

mod sqlite;
mod types;

pub use sqlite::SqliteCatalog;
pub use types::*;

use crate::release::ReleaseDescriptor;

/// Trait for public release storage.
pub trait ReleaseCatalog: Send + Sync {
    /// Store public releases, overwriting entries with the same hash.
    ///
    /// Private releases are skipped. Returns the number of new entries.
    fn store(&self, releases: &[ReleaseDescriptor]) -> Result<u32, CatalogError>;

    /// Look up releases by title, optionally restricted to one indexer.
    fn find(&self, query: &CatalogQuery) -> Result<Vec<ReleaseDescriptor>, CatalogError>;

    /// Get a specific release by info hash.
    fn get(&self, info_hash: &str) -> Result<CachedRelease, CatalogError>;

    fn stats(&self) -> Result<CatalogStats, CatalogError>;

    fn exists(&self, info_hash: &str) -> Result<bool, CatalogError>;

    fn remove(&self, info_hash: &str) -> Result<(), CatalogError>;

    /// Clear all cached data.
    fn clear(&self) -> Result<(), CatalogError>;
}

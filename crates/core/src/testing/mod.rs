//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! so search and playback can be tested without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use cachelink_core::testing::{MemoryCoordinationStore, MockBackend, MockIndexer};
//!
//! let backend = MockBackend::new(BackendKind::RealDebrid);
//! let indexer = MockIndexer::new("public-idx", 1);
//! let store = MemoryCoordinationStore::new();
//!
//! // Configure mock responses
//! indexer.set_results(vec![fixtures::raw_release("Film 2020 1080p", "abc", "public-idx")]).await;
//! backend.set_resolution(Resolution::Ready("https://cdn/x".into())).await;
//! ```

mod memory_store;
mod mock_backend;
mod mock_indexer;

pub use memory_store::MemoryCoordinationStore;
pub use mock_backend::MockBackend;
pub use mock_indexer::MockIndexer;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::release::{
        LinkKind, ManifestFile, MediaType, ParsedMetadata, Privacy, RawFile, RawRelease,
        ReleaseDescriptor,
    };

    /// Create a public magnet descriptor with reasonable defaults.
    pub fn descriptor(info_hash: &str, title: &str, media_type: MediaType) -> ReleaseDescriptor {
        ReleaseDescriptor {
            info_hash: info_hash.to_string(),
            raw_title: title.to_string(),
            size: 1024 * 1024 * 1024 * 2, // 2 GB
            seeders: Some(25),
            indexer: "mock-indexer".to_string(),
            privacy: Privacy::Public,
            link_kind: LinkKind::Magnet,
            link: None,
            magnet_uri: Some(format!("magnet:?xt=urn:btih:{}", info_hash)),
            trackers: Vec::new(),
            parsed: ParsedMetadata::default(),
            media_type,
            availability: None,
            file_index: None,
            file_name: None,
            file_size: None,
            full_index: None,
        }
    }

    /// Create a private web-locator descriptor carrying a file manifest.
    pub fn private_descriptor(
        info_hash: &str,
        title: &str,
        media_type: MediaType,
        files: Vec<ManifestFile>,
    ) -> ReleaseDescriptor {
        ReleaseDescriptor {
            privacy: Privacy::Private,
            link_kind: LinkKind::WebLocator,
            link: Some(format!("https://private.example/dl/{}.torrent", info_hash)),
            magnet_uri: None,
            indexer: "private-indexer".to_string(),
            full_index: Some(files),
            ..descriptor(info_hash, title, media_type)
        }
    }

    /// Create a raw indexer hit with a magnet URI.
    pub fn raw_release(title: &str, info_hash: &str, indexer: &str) -> RawRelease {
        RawRelease {
            title: title.to_string(),
            info_hash: Some(info_hash.to_string()),
            magnet_uri: Some(format!("magnet:?xt=urn:btih:{}", info_hash)),
            link: None,
            size: 1024 * 1024 * 1024,
            seeders: Some(10),
            indexer: indexer.to_string(),
            privacy: Privacy::Public,
            files: None,
        }
    }

    /// Create a raw private hit with a release-file URL and file listing.
    pub fn private_raw_release(
        title: &str,
        info_hash: &str,
        indexer: &str,
        files: &[(&str, u64)],
    ) -> RawRelease {
        RawRelease {
            magnet_uri: None,
            link: Some(format!("https://private.example/dl/{}.torrent", info_hash)),
            privacy: Privacy::Private,
            files: Some(
                files
                    .iter()
                    .map(|(path, size)| RawFile {
                        path: path.to_string(),
                        size: *size,
                    })
                    .collect(),
            ),
            ..raw_release(title, info_hash, indexer)
        }
    }
}

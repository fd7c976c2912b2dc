//! Lookup of configured backends by service code.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::DebridBackend;

/// Service code that routes playback to the designated download backend.
pub const DOWNLOAD_SERVICE: &str = "DL";

/// Configured backends, keyed by service code.
///
/// An aggregator is reachable both by its own code (`ST:torbox`) and by the
/// code of the store it fronts (`TB`) unless that store is registered directly.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn DebridBackend>>,
    by_code: HashMap<String, usize>,
    download: Option<usize>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, backend: Arc<dyn DebridBackend>) {
        let kind = backend.kind();
        let idx = self.backends.len();
        self.backends.push(backend);

        let code = kind.code();
        self.by_code.insert(code.clone(), idx);
        if let Ok(alias) = kind.availability_code() {
            if alias != code {
                // A direct registration always wins over an alias.
                let taken = self
                    .by_code
                    .get(&alias)
                    .map(|&i| self.backends[i].kind().code() == alias)
                    .unwrap_or(false);
                if !taken {
                    self.by_code.insert(alias, idx);
                }
            }
        }
        info!(backend = %code, "Registered backend");
    }

    pub fn with_backend(mut self, backend: Arc<dyn DebridBackend>) -> Self {
        self.register(backend);
        self
    }

    /// Designate the backend handling `DL` requests. Returns false when
    /// `code` is not registered.
    pub fn set_download_service(&mut self, code: &str) -> bool {
        match self.by_code.get(code) {
            Some(&idx) => {
                self.download = Some(idx);
                debug!(backend = %code, "Designated download backend");
                true
            }
            None => false,
        }
    }

    /// Backend for a service code. `DL` maps to the download backend.
    pub fn get(&self, code: &str) -> Option<Arc<dyn DebridBackend>> {
        if code == DOWNLOAD_SERVICE {
            return self.download_backend();
        }
        self.by_code
            .get(code)
            .map(|&idx| Arc::clone(&self.backends[idx]))
    }

    /// The designated download backend, or the first registered one.
    pub fn download_backend(&self) -> Option<Arc<dyn DebridBackend>> {
        self.download
            .or_else(|| (!self.backends.is_empty()).then_some(0))
            .map(|idx| Arc::clone(&self.backends[idx]))
    }

    /// All backends in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn DebridBackend>> {
        self.backends.iter()
    }

    pub fn codes(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.kind().code()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("codes", &self.codes())
            .field("download", &self.download)
            .finish()
    }
}

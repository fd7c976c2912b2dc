//! SQLite-backed public release catalog.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use super::{CachedRelease, CatalogError, CatalogQuery, CatalogStats, ReleaseCatalog};
use crate::metrics;
use crate::release::ReleaseDescriptor;

/// SQLite-backed release catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Create a new SQLite catalog, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            -- One row per public release, the descriptor kept as JSON
            CREATE TABLE IF NOT EXISTS public_releases (
                info_hash TEXT PRIMARY KEY,
                raw_title TEXT NOT NULL,
                indexer TEXT NOT NULL,
                media_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                descriptor TEXT NOT NULL,
                first_seen_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_public_releases_title ON public_releases(raw_title);
            CREATE INDEX IF NOT EXISTS idx_public_releases_indexer ON public_releases(indexer);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog connection lock poisoned".to_string()))
    }

    fn row_to_cached_release(row: &rusqlite::Row) -> rusqlite::Result<(String, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }

    fn decode(
        (json, first_seen, updated): (String, String, String),
    ) -> Result<CachedRelease, CatalogError> {
        let descriptor: ReleaseDescriptor =
            serde_json::from_str(&json).map_err(|e| CatalogError::Internal(e.to_string()))?;
        Ok(CachedRelease {
            descriptor,
            first_seen_at: parse_timestamp(&first_seen),
            updated_at: parse_timestamp(&updated),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ReleaseCatalog for SqliteCatalog {
    fn store(&self, releases: &[ReleaseDescriptor]) -> Result<u32, CatalogError> {
        let conn = self.lock()?;
        let now_str = Utc::now().to_rfc3339();
        let mut new_count = 0;

        for release in releases {
            if !release.is_public() || release.info_hash.is_empty() {
                debug!(hash = %release.info_hash, "Skipping non-public release");
                continue;
            }

            let info_hash = release.info_hash.to_lowercase();
            // Availability and file choice are request-scoped.
            let mut stored = release.clone();
            stored.info_hash = info_hash.clone();
            stored.clear_reconciliation();
            let json =
                serde_json::to_string(&stored).map_err(|e| CatalogError::Internal(e.to_string()))?;

            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM public_releases WHERE info_hash = ?",
                    params![&info_hash],
                    |_| Ok(true),
                )
                .unwrap_or(false);

            conn.execute(
                "INSERT INTO public_releases (info_hash, raw_title, indexer, media_type, size_bytes, descriptor, first_seen_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(info_hash) DO UPDATE SET
                    raw_title = excluded.raw_title,
                    indexer = excluded.indexer,
                    media_type = excluded.media_type,
                    size_bytes = excluded.size_bytes,
                    descriptor = excluded.descriptor,
                    updated_at = excluded.updated_at",
                params![
                    &info_hash,
                    &stored.raw_title,
                    &stored.indexer,
                    stored.media_type.as_str(),
                    stored.size as i64,
                    &json,
                    &now_str,
                ],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

            let result = if exists { "updated" } else { "inserted" };
            metrics::CATALOG_WRITES.with_label_values(&[result]).inc();
            if !exists {
                new_count += 1;
            }
        }

        Ok(new_count)
    }

    fn find(&self, query: &CatalogQuery) -> Result<Vec<ReleaseDescriptor>, CatalogError> {
        let conn = self.lock()?;
        let pattern = format!("%{}%", query.title);

        let mut stmt = conn
            .prepare(
                "SELECT descriptor, first_seen_at, updated_at
                 FROM public_releases
                 WHERE raw_title LIKE ?1
                   AND (?2 IS NULL OR indexer = ?2)
                   AND (?3 IS NULL OR media_type = ?3)
                 ORDER BY updated_at DESC
                 LIMIT ?4",
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![
                    &pattern,
                    &query.indexer,
                    query.media_type.map(|m| m.as_str()),
                    query.limit as i64
                ],
                Self::row_to_cached_release,
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| CatalogError::Database(e.to_string()))?;
            results.push(Self::decode(raw)?.descriptor);
        }
        Ok(results)
    }

    fn get(&self, info_hash: &str) -> Result<CachedRelease, CatalogError> {
        let conn = self.lock()?;
        let info_hash = info_hash.to_lowercase();

        let raw = conn
            .query_row(
                "SELECT descriptor, first_seen_at, updated_at FROM public_releases WHERE info_hash = ?",
                params![&info_hash],
                Self::row_to_cached_release,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound(info_hash.clone()),
                _ => CatalogError::Database(e.to_string()),
            })?;

        Self::decode(raw)
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let conn = self.lock()?;

        let count_where = |clause: &str| -> Result<u64, CatalogError> {
            conn.query_row(
                &format!("SELECT COUNT(*) FROM public_releases {}", clause),
                [],
                |row| row.get(0),
            )
            .map_err(|e| CatalogError::Database(e.to_string()))
        };

        let total_releases = count_where("")?;
        let movies = count_where("WHERE media_type = 'movie'")?;
        let series = count_where("WHERE media_type = 'series'")?;

        let total_size_bytes: i64 = conn
            .query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM public_releases",
                [],
                |row| row.get(0),
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let unique_indexers: u32 = conn
            .query_row(
                "SELECT COUNT(DISTINCT indexer) FROM public_releases",
                [],
                |row| row.get(0),
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let oldest_entry: Option<DateTime<Utc>> = conn
            .query_row("SELECT MIN(first_seen_at) FROM public_releases", [], |row| {
                let s: Option<String> = row.get(0)?;
                Ok(s)
            })
            .map_err(|e| CatalogError::Database(e.to_string()))?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let newest_entry: Option<DateTime<Utc>> = conn
            .query_row("SELECT MAX(updated_at) FROM public_releases", [], |row| {
                let s: Option<String> = row.get(0)?;
                Ok(s)
            })
            .map_err(|e| CatalogError::Database(e.to_string()))?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(CatalogStats {
            total_releases,
            movies,
            series,
            total_size_bytes: total_size_bytes as u64,
            unique_indexers,
            oldest_entry,
            newest_entry,
        })
    }

    fn exists(&self, info_hash: &str) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        let info_hash = info_hash.to_lowercase();

        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM public_releases WHERE info_hash = ?",
                params![&info_hash],
                |_| Ok(true),
            )
            .unwrap_or(false);

        Ok(exists)
    }

    fn remove(&self, info_hash: &str) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        let info_hash = info_hash.to_lowercase();

        let rows_affected = conn
            .execute(
                "DELETE FROM public_releases WHERE info_hash = ?",
                params![&info_hash],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows_affected == 0 {
            return Err(CatalogError::NotFound(info_hash));
        }

        Ok(())
    }

    fn clear(&self) -> Result<(), CatalogError> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM public_releases", [])
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }
}

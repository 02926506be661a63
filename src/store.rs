//! The persisted season catalog.
//!
//! [`CatalogStore`] owns the in-memory [`Catalog`] and the JSON file backing
//! it. Producers hand it one entry at a time through [`CatalogStore::record`],
//! which merges the entry and rewrites the file.
//!
//! # Merge rules
//!
//! - Entries without a `cat_id` are never stored
//! - An entry whose `cat_id` already exists in the bucket replaces it in place
//! - Anything else is appended
//!
//! # File format
//!
//! Pretty-printed JSON, two-space indent, non-ASCII written as-is. Buckets are
//! sorted by title when written; the in-memory order is left untouched.
//!
//! # Concurrency
//!
//! The catalog sits behind a mutex and file writes behind a second, async one,
//! so a shared `Arc<CatalogStore>` can take entries from several tasks. The
//! snapshot for a write is taken while holding the write lock, so a later
//! flush never gets overwritten by an earlier one.

use crate::models::{Catalog, CatalogEntry, entry_count};
use crate::season::Season;
use crate::utils::ensure_parent_dir;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// What [`CatalogStore::merge`] did with an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    /// The entry had no id.
    Skipped,
}

#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    catalog: Mutex<Catalog>,
    write_lock: tokio::sync::Mutex<()>,
}

/// Read the catalog at `path`.
///
/// A missing file, or one that is not valid UTF-8 JSON, gives an empty
/// catalog and the crawl starts over from scratch. Any other I/O error is
/// returned, since writing over a file that could not be read would lose it.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load(path: &Path) -> Result<Catalog, Box<dyn Error>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No catalog file yet; starting empty");
            return Ok(Catalog::new());
        }
        Err(e) => {
            error!(error = %e, "Could not read catalog");
            return Err(e.into());
        }
    };

    let raw = match String::from_utf8(bytes) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Catalog file is not UTF-8; starting empty");
            return Ok(Catalog::new());
        }
    };

    match serde_json::from_str::<Catalog>(&raw) {
        Ok(catalog) => {
            info!(entries = entry_count(&catalog), years = catalog.len(), "Loaded catalog");
            Ok(catalog)
        }
        Err(e) => {
            warn!(error = %e, "Catalog file is malformed; starting empty");
            Ok(Catalog::new())
        }
    }
}

/// Merge `entry` into `catalog` under `(year, season)`.
pub fn merge_into(catalog: &mut Catalog, year: i32, season: Season, entry: CatalogEntry) -> MergeOutcome {
    let Some(id) = entry.id() else {
        return MergeOutcome::Skipped;
    };

    let bucket = catalog.entry(year).or_default().entry(season).or_default();
    match bucket.iter().position(|existing| existing.id() == Some(id)) {
        Some(idx) => {
            bucket[idx] = entry;
            MergeOutcome::Updated
        }
        None => {
            bucket.push(entry);
            MergeOutcome::Inserted
        }
    }
}

/// Copy of `catalog` with every bucket stably sorted by title.
pub fn sorted_for_disk(catalog: &Catalog) -> Catalog {
    let mut sorted = catalog.clone();
    for bucket in sorted.values_mut().flat_map(|seasons| seasons.values_mut()) {
        bucket.sort_by(|a, b| a.title.cmp(&b.title));
    }
    sorted
}

impl CatalogStore {
    /// Prepare the output directory and load whatever is already on disk.
    ///
    /// Fails if the directory cannot be created or an existing catalog cannot
    /// be read. Malformed content is not an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let path = path.into();
        ensure_parent_dir(&path).await?;
        let catalog = load(&path).await?;
        Ok(Self::with_catalog(path, catalog))
    }

    pub fn with_catalog(path: PathBuf, catalog: Catalog) -> Self {
        Self {
            path,
            catalog: Mutex::new(catalog),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        // poisoning carries no partial state here
        self.catalog.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Merge one entry into the in-memory catalog without writing it out.
    pub fn merge(&self, year: i32, season: Season, entry: CatalogEntry) -> MergeOutcome {
        let title = entry.title.clone();
        let outcome = merge_into(&mut self.lock(), year, season, entry);
        match outcome {
            MergeOutcome::Inserted => info!(year, %season, %title, "Added entry"),
            MergeOutcome::Updated => info!(year, %season, %title, "Updated entry"),
            MergeOutcome::Skipped => debug!(year, %season, %title, "Skipped entry without id"),
        }
        outcome
    }

    /// Write the whole catalog to disk, buckets sorted by title.
    ///
    /// The document goes to a sibling `.tmp` file first and is then renamed
    /// over the catalog, so readers see either the old or the new version.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn flush(&self) -> Result<(), Box<dyn Error>> {
        let _guard = self.write_lock.lock().await;

        let sorted = sorted_for_disk(&self.lock());
        let json = serde_json::to_string_pretty(&sorted)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json.as_bytes()).await?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(bytes = json.len(), entries = entry_count(&sorted), "Wrote catalog");
        Ok(())
    }

    /// Merge one entry and write the catalog out.
    ///
    /// A failed write is logged; the merged entry stays in memory and goes out
    /// with the next successful flush.
    pub async fn record(&self, year: i32, season: Season, entry: CatalogEntry) -> MergeOutcome {
        let outcome = self.merge(year, season, entry);
        if outcome != MergeOutcome::Skipped {
            if let Err(e) = self.flush().await {
                error!(path = %self.path.display(), error = %e, "Failed to write catalog");
            }
        }
        outcome
    }

    /// Whether the file on disk exists, parses and holds at least one entry.
    pub async fn exists_and_nonempty(&self) -> bool {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return false,
        };
        match serde_json::from_str::<Catalog>(&raw) {
            Ok(catalog) => entry_count(&catalog) > 0,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Catalog file is not valid");
                false
            }
        }
    }

    /// A copy of the current in-memory catalog.
    #[cfg(test)]
    pub fn snapshot(&self) -> Catalog {
        self.lock().clone()
    }

    pub fn entry_count(&self) -> usize {
        entry_count(&self.lock())
    }
}

//! Data models for the season catalog.
//!
//! - [`CatalogEntry`]: one title scraped from a season listing
//! - [`SeasonBucket`]: all entries of one `(year, season)`
//! - [`Catalog`]: the whole dataset, as persisted to disk
//!
//! On disk the catalog is a JSON object keyed by year, then by season name:
//!
//! ```json
//! {
//!   "2024": {
//!     "winter": [ { "title": "...", "cat_id": "1234" } ]
//!   }
//! }
//! ```

use crate::season::Season;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single title scraped from a season listing.
///
/// `cat_id` is the site's category identifier and the entry's identity inside
/// a bucket. Entries without one are reported by the scraper but never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Link text as shown on the listing page.
    pub title: String,
    /// Identifier taken from the link's `?cat=` query.
    pub cat_id: Option<String>,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, cat_id: Option<String>) -> Self {
        Self {
            title: title.into(),
            cat_id,
        }
    }

    /// The identifier, if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.cat_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Entries of one season, unique by `cat_id`.
pub type SeasonBucket = Vec<CatalogEntry>;

/// Year -> season -> bucket.
///
/// `serde_json` writes the integer year keys as strings and reads them back.
pub type Catalog = BTreeMap<i32, BTreeMap<Season, SeasonBucket>>;

/// Total number of entries across all buckets.
pub fn entry_count(catalog: &Catalog) -> usize {
    catalog
        .values()
        .flat_map(|seasons| seasons.values())
        .map(Vec::len)
        .sum()
}

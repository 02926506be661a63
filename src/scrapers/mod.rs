//! Season listing scrapers.
//!
//! Each scraper turns one `(year, season)` into the entries listed on the
//! source's season page:
//!
//! 1. **Addressing**: build the page URL for the season
//! 2. **Fetching**: retrieve the page through a [`crate::client::PageSource`]
//! 3. **Parsing**: extract `(title, cat_id)` pairs from the listing table
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Anime1 | [`anime1`] | HTML table scraping | One weekday table per season page |

pub mod anime1;

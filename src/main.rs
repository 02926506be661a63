//! # Anime Season Catalog
//!
//! Crawls the seasonal anime listings on Anime1 and keeps a JSON catalog of
//! every title, keyed by year and season.
//!
//! ## Usage
//!
//! ```sh
//! anime_season_catalog                       # crawl into docs/anime_data.json
//! anime_season_catalog -o data/catalog.json  # different output file
//! ```
//!
//! ## Architecture
//!
//! 1. **Decide**: a missing or empty catalog triggers a backfill from the
//!    start year; otherwise only the most recent seasons are refreshed
//! 2. **Fetch**: each season page is downloaded with randomized pauses and
//!    linear-backoff retries
//! 3. **Parse**: titles and category ids are read from the listing table
//! 4. **Store**: each entry is merged by id and the catalog is rewritten,
//!    sorted by title

use clap::Parser;
use std::error::Error;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod client;
mod config;
mod crawler;
mod models;
mod scrapers;
mod season;
mod store;
mod utils;

use cli::Cli;
use client::{HttpPage, RetryFetch};
use config::Settings;
use crawler::Crawler;
use scrapers::anime1::SeasonFetcher;
use store::CatalogStore;

/// Console logging, plus a plain-text copy to `settings.log_file` when set.
fn init_tracing(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = tfmt::layer()
        .with_target(false)
        .with_timer(UtcTime::rfc_3339());

    let file = match &settings.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tfmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let settings = args.settings()?;
    init_tracing(&settings)?;

    info!(
        output = %settings.output_path.display(),
        base_url = %settings.base_url,
        "anime_season_catalog starting up"
    );

    let store = match CatalogStore::open(&settings.output_path).await {
        Ok(store) => {
            info!(path = %store.path().display(), entries = store.entry_count(), "Catalog ready");
            Arc::new(store)
        }
        Err(e) => {
            error!(path = %settings.output_path.display(), error = %e, "Cannot prepare catalog storage");
            return Err(e);
        }
    };

    let pages = RetryFetch::new(
        HttpPage::new(&settings)?,
        settings.retry_attempts,
        settings.retry_delay(),
    );
    let fetcher = SeasonFetcher::new(pages, &settings);
    let crawler = Crawler::new(fetcher, store, &settings);

    crawler.run().await;
    Ok(())
}

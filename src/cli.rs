//! Command-line interface definitions.
//!
//! Every flag is optional: running the binary with no arguments performs one
//! crawl with the default [`Settings`]. Flags can also be given through
//! environment variables.

use crate::config::Settings;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

/// Command-line arguments for the season catalog crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl with defaults into docs/anime_data.json
/// anime_season_catalog
///
/// # Different output and a YAML settings file
/// anime_season_catalog -c crawler.yaml -o data/catalog.json
///
/// # Refresh the last four seasons and keep a log file
/// anime_season_catalog --recent-seasons 4 --log-file crawler.log
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML settings file
    #[arg(short, long, env = "CATALOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Catalog JSON file to read and update
    #[arg(short, long, env = "CATALOG_OUTPUT")]
    pub output: Option<PathBuf>,

    /// First year crawled when the catalog is empty
    #[arg(long, env = "CATALOG_START_YEAR")]
    pub start_year: Option<i32>,

    /// Number of recent seasons refreshed when the catalog already has data
    #[arg(long, env = "CATALOG_RECENT_SEASONS")]
    pub recent_seasons: Option<usize>,

    /// Origin of the season listing pages
    #[arg(long, env = "CATALOG_BASE_URL")]
    pub base_url: Option<String>,

    /// Attempts per page before giving up
    #[arg(long, env = "CATALOG_RETRY_ATTEMPTS")]
    pub retry_attempts: Option<usize>,

    /// Base backoff between attempts, in seconds
    #[arg(long, env = "CATALOG_RETRY_DELAY")]
    pub retry_delay: Option<f64>,

    /// Also append log output to this file
    #[arg(long, env = "CATALOG_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Resolve the effective settings: defaults, then the YAML file, then flags.
    pub fn settings(&self) -> Result<Settings, Box<dyn Error>> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_yaml_file(path)?,
            None => Settings::default(),
        };

        if let Some(output) = &self.output {
            settings.output_path = output.clone();
        }
        if let Some(year) = self.start_year {
            settings.start_year = year;
        }
        if let Some(count) = self.recent_seasons {
            settings.recent_seasons_count = count;
        }
        if let Some(url) = &self.base_url {
            settings.base_url = url.clone();
        }
        if let Some(attempts) = self.retry_attempts {
            settings.retry_attempts = attempts;
        }
        if let Some(delay) = self.retry_delay {
            settings.retry_delay_secs = delay;
        }
        if let Some(log_file) = &self.log_file {
            settings.log_file = Some(log_file.clone());
        }

        settings.validate()?;
        Ok(settings)
    }
}

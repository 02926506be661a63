//! Crawler settings.
//!
//! Settings start from [`Settings::default`], may be replaced by a YAML file
//! and are finally overridden by command-line flags or their environment
//! variables (see [`crate::cli`]). The resulting value is passed to each
//! component's constructor; nothing reads configuration from global state.
//!
//! ```yaml
//! output_path: docs/anime_data.json
//! start_year: 2017
//! recent_seasons_count: 3
//! retry_attempts: 3
//! retry_delay_secs: 2
//! request_delay: { min_secs: 1, max_secs: 3 }
//! season_delay: { min_secs: 3, max_secs: 5 }
//! skip_titles: ["Anime1.me"]
//! base_url: https://anime1.me
//! ```

use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A closed range of seconds from which a random pause is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// No pause at all.
    #[cfg(test)]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Draw a uniformly random duration from the range.
    pub fn sample(&self) -> Duration {
        if self.max_secs <= self.min_secs {
            return Duration::from_secs_f64(self.min_secs.max(0.0));
        }
        Duration::from_secs_f64(rng().random_range(self.min_secs..=self.max_secs))
    }

    fn is_valid(&self) -> bool {
        is_duration_secs(self.min_secs)
            && is_duration_secs(self.max_secs)
            && self.min_secs <= self.max_secs
    }
}

/// Whether `secs` converts to a `Duration` (non-negative, finite, in range).
fn is_duration_secs(secs: f64) -> bool {
    Duration::try_from_secs_f64(secs).is_ok()
}

/// Everything the crawler can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the catalog JSON lives.
    pub output_path: PathBuf,
    /// First year crawled when the catalog is empty.
    pub start_year: i32,
    /// How many recent seasons an incremental run refreshes.
    pub recent_seasons_count: usize,
    /// Total attempts per page, including the first.
    pub retry_attempts: usize,
    /// Base of the linear backoff between attempts.
    pub retry_delay_secs: f64,
    /// Pause before each HTTP request.
    pub request_delay: DelayRange,
    /// Pause between two seasons.
    pub season_delay: DelayRange,
    /// Link titles that are not anime (site logo and the like).
    pub skip_titles: Vec<String>,
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Optional file that receives a copy of the log.
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("docs/anime_data.json"),
            start_year: 2017,
            recent_seasons_count: 3,
            retry_attempts: 3,
            retry_delay_secs: 2.0,
            request_delay: DelayRange::new(1.0, 3.0),
            season_delay: DelayRange::new(3.0, 5.0),
            skip_titles: vec!["Anime1.me".to_string()],
            base_url: "https://anime1.me".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
            log_file: None,
        }
    }
}

/// A setting that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl Error for ConfigError {}

impl Settings {
    /// Read settings from a YAML file. Missing keys keep their defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn from_yaml_file(path: &Path) -> Result<Self, Box<dyn Error>> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&raw)?;
        info!("Loaded settings file");
        Ok(settings)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs.max(0.0))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject settings the crawler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError("retry_attempts must be at least 1".into()));
        }
        if !is_duration_secs(self.retry_delay_secs) {
            return Err(ConfigError("retry_delay_secs must be a non-negative number".into()));
        }
        if !self.request_delay.is_valid() {
            return Err(ConfigError(format!("bad request_delay range {:?}", self.request_delay)));
        }
        if !self.season_delay.is_valid() {
            return Err(ConfigError(format!("bad season_delay range {:?}", self.season_delay)));
        }
        if self.recent_seasons_count == 0 {
            return Err(ConfigError("recent_seasons_count must be at least 1".into()));
        }
        if let Err(e) = url::Url::parse(&self.base_url) {
            return Err(ConfigError(format!("base_url {:?}: {e}", self.base_url)));
        }
        Ok(())
    }
}

//! Small helpers shared by the fetcher, the store and the crawler.
//!
//! - Randomized pauses between requests
//! - Extracting the category id from listing links
//! - Log-friendly string truncation
//! - Creating the catalog's parent directory

use crate::config::DelayRange;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

/// Sleep for a random duration drawn from `range`.
pub async fn pause(range: DelayRange) {
    let delay = range.sample();
    if delay.is_zero() {
        return;
    }
    debug!(?delay, "Pausing");
    sleep(delay).await;
}

/// Category id carried by a listing link.
///
/// The id is everything after the first `?cat=` in `href`. Links without the
/// marker, or with nothing after it, have no id.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(extract_cat_id("/?cat=1234"), Some("1234".to_string()));
/// assert_eq!(extract_cat_id("/2024/01/post"), None);
/// ```
pub fn extract_cat_id(href: &str) -> Option<String> {
    href.split_once("?cat=")
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Truncate a string for logging purposes.
///
/// Strings longer than `max` bytes are cut on a character boundary with an
/// ellipsis and the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Create the directory that will hold `path`, if it has one.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).await?;
            info!(dir = %dir.display(), "Output directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}

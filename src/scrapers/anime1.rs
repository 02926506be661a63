//! Anime1 season listing scraper.
//!
//! Each season has a page titled `"{year}年{label}季新番"` (for example
//! `2024年春季新番`) under the site root. The page holds a weekday table: the
//! first row names the days, every other cell links to one show's category
//! page, `https://anime1.me/?cat=1234`.

use crate::client::PageSource;
use crate::config::Settings;
use crate::models::CatalogEntry;
use crate::season::Season;
use crate::utils::{extract_cat_id, truncate_for_log};
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};

/// Address of the listing page for `(year, season)` under `base_url`.
pub fn season_url(base_url: &str, year: i32, season: Season) -> String {
    let phrase = format!("{}年{}季新番", year, season.label());
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(&phrase)
    )
}

/// Extract every linked title from the first table in `html`.
///
/// The first row is the weekday header and is skipped. Titles listed in
/// `skip_titles` are dropped. Entries whose link has no `?cat=` id are kept
/// with `cat_id: None`. A page without any table yields `None`.
pub fn parse_listing(
    html: &str,
    skip_titles: &[String],
) -> Result<Option<Vec<CatalogEntry>>, Box<dyn Error>> {
    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table")?;
    let row_selector = Selector::parse("tr")?;
    let cell_selector = Selector::parse("td")?;
    let link_selector = Selector::parse("a")?;

    let Some(table) = document.select(&table_selector).next() else {
        return Ok(None);
    };

    let mut entries = Vec::new();
    for row in table.select(&row_selector).skip(1) {
        for cell in row.select(&cell_selector) {
            if let Some(link) = cell.select(&link_selector).next() {
                if let Some(entry) = entry_from_link(link, skip_titles) {
                    entries.push(entry);
                }
            }
        }
    }
    Ok(Some(entries))
}

fn entry_from_link(link: ElementRef<'_>, skip_titles: &[String]) -> Option<CatalogEntry> {
    let title = link.text().collect::<String>().trim().to_string();
    if skip_titles.iter().any(|skip| *skip == title) {
        return None;
    }
    let href = link.value().attr("href").unwrap_or_default();
    Some(CatalogEntry::new(title, extract_cat_id(href)))
}

/// Fetches and parses season listings from one origin.
#[derive(Debug)]
pub struct SeasonFetcher<P> {
    source: P,
    base_url: String,
    skip_titles: Vec<String>,
}

impl<P> SeasonFetcher<P>
where
    P: PageSource,
{
    pub fn new(source: P, settings: &Settings) -> Self {
        Self {
            source,
            base_url: settings.base_url.clone(),
            skip_titles: settings.skip_titles.clone(),
        }
    }

    /// All entries listed for `(year, season)`, id-less ones included.
    ///
    /// Fetch errors (after the source's own retries) are returned; a page
    /// without a listing table is not an error.
    #[instrument(level = "info", skip(self, season), fields(%season))]
    pub async fn fetch(&self, year: i32, season: Season) -> Result<Vec<CatalogEntry>, Box<dyn Error>> {
        let url = season_url(&self.base_url, year, season);
        let html = self.source.get_page(&url).await?;

        match parse_listing(&html, &self.skip_titles)? {
            Some(entries) => {
                let with_id = entries.iter().filter(|e| e.id().is_some()).count();
                info!(count = entries.len(), with_id, %url, "Parsed season listing");
                debug!(entries = ?entries, "Season entries");
                Ok(entries)
            }
            None => {
                warn!(%url, preview = %truncate_for_log(&html, 200), "No table found on season page");
                Ok(Vec::new())
            }
        }
    }
}

//! Crawl orchestration.
//!
//! A run goes through these steps:
//!
//! 1. **Decide**: an empty or missing catalog means a full backfill, anything
//!    else an incremental refresh of the most recent seasons
//! 2. **Plan**: list the `(year, season)` pairs to visit
//! 3. **Crawl**: fetch each season in turn and record every entry that has an
//!    id, pausing between seasons
//!
//! A season that fails to fetch is logged and skipped; the run always
//! finishes.

use crate::client::PageSource;
use crate::config::{DelayRange, Settings};
use crate::scrapers::anime1::SeasonFetcher;
use crate::season::{Season, backfill_seasons, recent_seasons};
use crate::store::{CatalogStore, MergeOutcome};
use crate::utils::pause;
use chrono::{Local, NaiveDate};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlMode {
    /// Every season from the configured start year.
    Backfill,
    /// Only the most recent seasons.
    Incremental,
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlMode::Backfill => f.write_str("backfill"),
            CrawlMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: CrawlMode,
    pub seasons_planned: usize,
    pub seasons_failed: usize,
    /// Entries returned by the fetcher, id-less ones included.
    pub entries_seen: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn new(mode: CrawlMode, seasons_planned: usize) -> Self {
        Self {
            mode,
            seasons_planned,
            seasons_failed: 0,
            entries_seen: 0,
            inserted: 0,
            updated: 0,
            skipped: 0,
        }
    }

    fn count(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct Crawler<P> {
    fetcher: SeasonFetcher<P>,
    store: Arc<CatalogStore>,
    start_year: i32,
    recent_seasons_count: usize,
    season_delay: DelayRange,
}

impl<P> Crawler<P>
where
    P: PageSource,
{
    pub fn new(fetcher: SeasonFetcher<P>, store: Arc<CatalogStore>, settings: &Settings) -> Self {
        Self {
            fetcher,
            store,
            start_year: settings.start_year,
            recent_seasons_count: settings.recent_seasons_count,
            season_delay: settings.season_delay,
        }
    }

    pub async fn decide_mode(&self) -> CrawlMode {
        if self.store.exists_and_nonempty().await {
            CrawlMode::Incremental
        } else {
            CrawlMode::Backfill
        }
    }

    /// Seasons to visit for `mode`, in crawl order.
    pub fn plan(&self, mode: CrawlMode, today: NaiveDate) -> Vec<(i32, Season)> {
        match mode {
            CrawlMode::Backfill => backfill_seasons(self.start_year, today),
            CrawlMode::Incremental => recent_seasons(self.recent_seasons_count, today),
        }
    }

    /// One full decide-and-crawl cycle as of the local date.
    pub async fn run(&self) -> RunSummary {
        self.run_at(Local::now().date_naive()).await
    }

    #[instrument(level = "info", skip(self))]
    pub async fn run_at(&self, today: NaiveDate) -> RunSummary {
        let t0 = Instant::now();
        let mode = self.decide_mode().await;
        let seasons = self.plan(mode, today);
        match mode {
            CrawlMode::Backfill => info!(
                start_year = self.start_year,
                seasons = seasons.len(),
                "Catalog missing or empty; crawling every season"
            ),
            CrawlMode::Incremental => info!(
                plan = ?seasons,
                "Catalog has data; refreshing recent seasons"
            ),
        }

        let mut summary = RunSummary::new(mode, seasons.len());
        for (i, &(year, season)) in seasons.iter().enumerate() {
            if i > 0 {
                pause(self.season_delay).await;
            }
            self.crawl_season(year, season, &mut summary).await;
        }

        info!(
            %mode,
            planned = summary.seasons_planned,
            failed = summary.seasons_failed,
            seen = summary.entries_seen,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            total_entries = self.store.entry_count(),
            elapsed_secs = t0.elapsed().as_secs(),
            "Crawl complete"
        );
        summary
    }

    async fn crawl_season(&self, year: i32, season: Season, summary: &mut RunSummary) {
        info!(year, %season, "Crawling season");
        let entries = match self.fetcher.fetch(year, season).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(year, %season, error = %e, "Failed to crawl season; moving on");
                summary.seasons_failed += 1;
                return;
            }
        };

        summary.entries_seen += entries.len();
        for entry in entries {
            if entry.id().is_none() {
                summary.count(MergeOutcome::Skipped);
                continue;
            }
            let outcome = self.store.record(year, season, entry).await;
            summary.count(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::StubPages;
    use crate::models::CatalogEntry;
    use crate::scrapers::anime1::season_url;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_settings(dir: &TempDir) -> Settings {
        Settings {
            output_path: dir.path().join("anime_data.json"),
            request_delay: DelayRange::zero(),
            season_delay: DelayRange::zero(),
            retry_delay_secs: 0.0,
            ..Settings::default()
        }
    }

    fn listing(rows: &[(&str, &str)]) -> String {
        let cells: String = rows
            .iter()
            .map(|(title, href)| format!(r#"<tr><td><a href="{href}">{title}</a></td></tr>"#))
            .collect();
        format!("<table><tr><th>一</th></tr>{cells}</table>")
    }

    async fn crawler(settings: &Settings, pages: StubPages) -> Crawler<StubPages> {
        let store = Arc::new(CatalogStore::open(&settings.output_path).await.unwrap());
        Crawler::new(SeasonFetcher::new(pages, settings), store, settings)
    }

    #[tokio::test]
    async fn test_empty_catalog_backfills() {
        let dir = TempDir::new().unwrap();
        let mut settings = test_settings(&dir);
        settings.start_year = 2024;
        let base = settings.base_url.clone();

        let pages = StubPages::new()
            .with_page(
                &season_url(&base, 2024, Season::Winter),
                &listing(&[("Frieren", "/?cat=1"), ("News", "/news")]),
            )
            .with_page(
                &season_url(&base, 2024, Season::Spring),
                &listing(&[("Dungeon Meshi", "/?cat=2")]),
            );
        let crawler = crawler(&settings, pages).await;

        assert_eq!(crawler.decide_mode().await, CrawlMode::Backfill);
        let summary = crawler.run_at(date(2024, 5, 20)).await;

        assert_eq!(summary.mode, CrawlMode::Backfill);
        assert_eq!(summary.seasons_planned, 2);
        assert_eq!(summary.seasons_failed, 0);
        assert_eq!(summary.entries_seen, 3);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped, 1);

        let catalog = crawler.store.snapshot();
        assert_eq!(catalog[&2024][&Season::Winter], vec![CatalogEntry::new("Frieren", Some("1".into()))]);
        assert_eq!(crawler.decide_mode().await, CrawlMode::Incremental);
    }

    #[tokio::test]
    async fn test_failed_season_does_not_stop_run() {
        let dir = TempDir::new().unwrap();
        let mut settings = test_settings(&dir);
        settings.start_year = 2023;
        let base = settings.base_url.clone();

        // only fall 2023 is served; every other season fails
        let pages = StubPages::new().with_page(
            &season_url(&base, 2023, Season::Fall),
            &listing(&[("Spy x Family", "/?cat=9")]),
        );
        let crawler = crawler(&settings, pages).await;
        let summary = crawler.run_at(date(2024, 2, 1)).await;

        assert_eq!(summary.seasons_planned, 5);
        assert_eq!(summary.seasons_failed, 4);
        assert_eq!(summary.inserted, 1);
        assert_eq!(crawler.store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_existing_catalog_refreshes_recent_seasons() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        std::fs::write(
            &settings.output_path,
            r#"{"2024": {"spring": [{"title": "Old name", "cat_id": "2"}]}}"#,
        )
        .unwrap();
        let base = settings.base_url.clone();

        let pages = StubPages::new().with_page(
            &season_url(&base, 2024, Season::Spring),
            &listing(&[("New name", "/?cat=2"), ("Another", "/?cat=3")]),
        );
        let crawler = crawler(&settings, pages).await;
        let summary = crawler.run_at(date(2024, 7, 10)).await;

        assert_eq!(summary.mode, CrawlMode::Incremental);
        assert_eq!(summary.seasons_planned, 3);
        assert_eq!(summary.seasons_failed, 2);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.inserted, 1);

        let on_disk: crate::models::Catalog =
            serde_json::from_str(&std::fs::read_to_string(&settings.output_path).unwrap()).unwrap();
        let titles: Vec<_> = on_disk[&2024][&Season::Spring].iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Another", "New name"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_only_between_seasons() {
        let dir = TempDir::new().unwrap();
        let mut settings = test_settings(&dir);
        settings.start_year = 2024;
        settings.season_delay = DelayRange::new(3.0, 3.0);
        let base = settings.base_url.clone();

        let mut pages = StubPages::new();
        for season in [Season::Winter, Season::Spring, Season::Summer] {
            pages = pages.with_page(&season_url(&base, 2024, season), "<table></table>");
        }
        let crawler = crawler(&settings, pages).await;

        let t0 = tokio::time::Instant::now();
        let summary = crawler.run_at(date(2024, 8, 1)).await;
        let elapsed = t0.elapsed();

        assert_eq!(summary.seasons_planned, 3);
        assert_eq!(summary.seasons_failed, 0);
        // two gaps between three seasons, none before the first or after the last
        assert!(elapsed >= std::time::Duration::from_secs(6));
        assert!(elapsed < std::time::Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_plan_matches_mode() {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(&dir);
        let crawler = crawler(&settings, StubPages::new()).await;

        let incremental = crawler.plan(CrawlMode::Incremental, date(2024, 7, 1));
        assert_eq!(
            incremental,
            vec![(2024, Season::Summer), (2024, Season::Spring), (2024, Season::Winter)]
        );

        let backfill = crawler.plan(CrawlMode::Backfill, date(2024, 3, 1));
        assert_eq!(backfill.len(), 29);
    }
}

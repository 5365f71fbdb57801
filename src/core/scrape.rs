//! The public iteration contract: a lazy, finite, non-restartable sequence
//! of deduplicated, optionally detail-enriched project records.

use crate::config::ScrapeConfig;
use crate::core::extract::Extractor;
use crate::core::fetch::{FetchError, Fetcher};
use crate::core::paginate::{PageOutcome, Paginator};
use crate::domain::{ProjectDetail, ProjectListing};
use crate::utils::error::Result;
use crate::utils::text::extract_project_id;
use std::collections::{HashSet, VecDeque};

/// Counters for end-of-run reporting; the sequence itself never raises for
/// conditions it can degrade from, so the CLI reads these instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrapeStats {
    pub pages_scraped: u32,
    pub projects_found: u32,
    pub details_fetched: u32,
    pub errors: u32,
}

/// Drives the paginator and extractor into a pull-driven record sequence.
///
/// The caller owns the pace: each [`next`] call may block on network I/O and
/// the rate limiter, and at most one request is in flight at any time.
/// Dropping the orchestrator is the cancellation primitive.
///
/// [`next`]: ScrapeOrchestrator::next
pub struct ScrapeOrchestrator {
    fetcher: Fetcher,
    extractor: Extractor,
    paginator: Paginator,
    base_url: String,
    include_details: bool,
    seen: HashSet<String>,
    buffer: VecDeque<ProjectListing>,
    finished: bool,
    abort_cause: Option<FetchError>,
    stats: ScrapeStats,
}

impl ScrapeOrchestrator {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        Ok(Self::from_parts(
            Fetcher::new(config)?,
            Extractor::new(&config.base_url)?,
            Paginator::new(&config.listing_url, config.start_page, config.max_pages),
            &config.base_url,
            config.include_details,
        ))
    }

    /// Assemble from explicit parts, e.g. a fetcher over custom transports.
    pub fn from_parts(
        fetcher: Fetcher,
        extractor: Extractor,
        paginator: Paginator,
        base_url: &str,
        include_details: bool,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            paginator,
            base_url: base_url.trim_end_matches('/').to_string(),
            include_details,
            seen: HashSet::new(),
            buffer: VecDeque::new(),
            finished: false,
            abort_cause: None,
            stats: ScrapeStats::default(),
        }
    }

    /// Pull the next record, or `None` when the sequence has ended.
    ///
    /// Records sharing a `project_id` with an earlier one (pagination
    /// overlap) are dropped silently; the first occurrence wins.
    pub async fn next(&mut self) -> Option<ProjectDetail> {
        loop {
            if let Some(listing) = self.buffer.pop_front() {
                if !self.seen.insert(listing.project_id.clone()) {
                    tracing::debug!(project_id = %listing.project_id, "dropping duplicate record");
                    continue;
                }
                self.stats.projects_found += 1;
                let mut record = ProjectDetail::from(listing);
                if self.include_details {
                    self.enrich(&mut record).await;
                }
                return Some(record);
            }

            if self.finished {
                return None;
            }

            match self
                .paginator
                .next_batch(&mut self.fetcher, &self.extractor)
                .await
            {
                PageOutcome::Batch(records) => {
                    self.stats.pages_scraped += 1;
                    self.buffer.extend(records);
                }
                PageOutcome::Exhausted => {
                    self.finished = true;
                }
                PageOutcome::Aborted(err) => {
                    self.stats.errors += 1;
                    self.abort_cause = Some(err);
                    self.finished = true;
                }
            }
        }
    }

    /// One detail round trip; failure degrades to listing-only fields.
    async fn enrich(&mut self, record: &mut ProjectDetail) {
        let Some(url) = record.listing.detail_url.clone() else {
            tracing::debug!(project_id = %record.listing.project_id, "no detail url to enrich from");
            return;
        };
        match self.fetcher.fetch(&url).await {
            Ok(page) => {
                self.extractor.parse_detail(&page.body).apply(record);
                self.stats.details_fetched += 1;
            }
            Err(err) => {
                self.stats.errors += 1;
                tracing::warn!(
                    project_id = %record.listing.project_id,
                    error = %err,
                    "detail fetch failed, keeping listing fields"
                );
            }
        }
    }

    /// Collect the whole sequence. Memory-bound by the result set; prefer
    /// [`next`](Self::next) for large runs.
    pub async fn scrape_all(&mut self) -> Vec<ProjectDetail> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await {
            records.push(record);
        }
        records
    }

    /// Fetch and parse a single project's detail page by id.
    pub async fn scrape_single(&mut self, project_id: &str) -> Option<ProjectDetail> {
        let url = format!("{}/projects/{}", self.base_url, project_id);
        match self.fetcher.fetch(&url).await {
            Ok(page) => {
                let fields = self.extractor.parse_detail(&page.body);
                let id = extract_project_id(&url).unwrap_or_else(|| project_id.to_string());
                self.stats.details_fetched += 1;
                Some(fields.into_detail(&id, &url))
            }
            Err(err) => {
                self.stats.errors += 1;
                tracing::error!(%project_id, error = %err, "failed to scrape project");
                None
            }
        }
    }

    pub fn stats(&self) -> ScrapeStats {
        self.stats
    }

    /// The terminal failure that ended the run early, if any.
    pub fn abort_cause(&self) -> Option<&FetchError> {
        self.abort_cause.as_ref()
    }
}

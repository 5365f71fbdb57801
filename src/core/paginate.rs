//! Pagination over listing pages.

use crate::core::extract::Extractor;
use crate::core::fetch::{FetchError, Fetcher};
use crate::domain::ProjectListing;
use url::Url;

/// Pagination state. `Aborted` is entered on a terminal fetch failure and
/// surfaced exactly once; pages already yielded stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Fetching,
    Exhausted,
    Aborted,
}

/// Result of pulling one listing page.
#[derive(Debug)]
pub enum PageOutcome {
    Batch(Vec<ProjectListing>),
    Exhausted,
    Aborted(FetchError),
}

/// Walks listing pages by integer cursor until an empty page, the page
/// limit, or a terminal failure. The cursor is owned here, never shared,
/// and never decreases; no page is fetched twice in one run.
pub struct Paginator {
    listing_url: String,
    cursor: u32,
    pages_walked: u32,
    max_pages: u32,
    state: PageState,
}

impl Paginator {
    /// `max_pages` of 0 means no explicit limit; rely on empty-page
    /// termination alone.
    pub fn new(listing_url: &str, start_page: u32, max_pages: u32) -> Self {
        Self {
            listing_url: listing_url.to_string(),
            cursor: start_page.max(1),
            pages_walked: 0,
            max_pages,
            state: PageState::Fetching,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn pages_walked(&self) -> u32 {
        self.pages_walked
    }

    /// Fetch and parse the page at the cursor, advancing on success.
    pub async fn next_batch(
        &mut self,
        fetcher: &mut Fetcher,
        extractor: &Extractor,
    ) -> PageOutcome {
        if self.state != PageState::Fetching {
            return PageOutcome::Exhausted;
        }
        if self.max_pages > 0 && self.pages_walked >= self.max_pages {
            tracing::info!(max_pages = self.max_pages, "reached page limit");
            self.state = PageState::Exhausted;
            return PageOutcome::Exhausted;
        }

        let url = page_url(&self.listing_url, self.cursor);
        tracing::info!(page = self.cursor, %url, "scraping listing page");

        match fetcher.fetch(&url).await {
            Ok(page) => {
                let records = extractor.parse_listing(&page.body);
                if records.is_empty() {
                    tracing::info!(page = self.cursor, "no more projects found, stopping");
                    self.state = PageState::Exhausted;
                    PageOutcome::Exhausted
                } else {
                    self.cursor += 1;
                    self.pages_walked += 1;
                    PageOutcome::Batch(records)
                }
            }
            Err(err) => {
                tracing::error!(page = self.cursor, error = %err, "stopping pagination");
                self.state = PageState::Aborted;
                PageOutcome::Aborted(err)
            }
        }
    }
}

/// Listing URL for a 1-indexed cursor. The site paginates with a 0-indexed
/// `page` query parameter.
fn page_url(listing_url: &str, cursor: u32) -> String {
    let page = cursor.saturating_sub(1);
    match Url::parse(listing_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("page", &page.to_string());
            url.into()
        }
        Err(_) => format!("{}?page={}", listing_url, page),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_is_zero_indexed() {
        assert_eq!(
            page_url("https://www.adb.org/projects", 1),
            "https://www.adb.org/projects?page=0"
        );
        assert_eq!(
            page_url("https://www.adb.org/projects", 4),
            "https://www.adb.org/projects?page=3"
        );
    }

    #[test]
    fn page_url_preserves_existing_query() {
        assert_eq!(
            page_url("https://www.adb.org/projects?status=active", 2),
            "https://www.adb.org/projects?status=active&page=1"
        );
    }

    #[test]
    fn new_paginator_starts_fetching_at_the_start_page() {
        let paginator = Paginator::new("https://www.adb.org/projects", 3, 0);
        assert_eq!(paginator.state(), PageState::Fetching);
        assert_eq!(paginator.cursor, 3);
        assert_eq!(paginator.pages_walked(), 0);
    }
}

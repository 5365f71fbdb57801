// Core pipeline: pacing, fetching, strategy selection, pagination,
// extraction, orchestration.

pub mod extract;
pub mod fetch;
pub mod paginate;
pub mod rate_limit;
pub mod scrape;
pub mod strategy;

pub use extract::Extractor;
pub use fetch::{FetchError, Fetcher, PageContent};
pub use paginate::{PageOutcome, PageState, Paginator};
pub use rate_limit::RateLimiter;
pub use scrape::{ScrapeOrchestrator, ScrapeStats};
pub use strategy::{HttpTransport, StrategyKind, StrategyMode, StrategySelector, StrategySet};

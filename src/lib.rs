pub mod config;
pub mod core;
pub mod domain;
pub mod export;
pub mod utils;

pub use config::{CliConfig, ScrapeConfig};
pub use core::{
    Extractor, FetchError, Fetcher, Paginator, ScrapeOrchestrator, ScrapeStats, StrategyMode,
    StrategySet,
};
pub use domain::{DocumentLink, ProjectDetail, ProjectListing};
pub use export::OutputFormat;
pub use utils::error::{Result, ScrapeError};

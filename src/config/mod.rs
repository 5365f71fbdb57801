use crate::core::strategy::StrategyMode;
use crate::export::OutputFormat;
use crate::utils::error::{Result, ScrapeError};
use crate::utils::validation::{validate_positive_number, validate_range, validate_url, Validate};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "adb-scrape")]
#[command(about = "Scrape project records from the ADB website")]
pub struct CliConfig {
    /// Maximum number of listing pages to scrape (0 = walk until exhausted)
    #[arg(long, short = 'p', default_value = "1")]
    pub pages: u32,

    /// Starting page number (1-indexed)
    #[arg(long, default_value = "1")]
    pub start_page: u32,

    /// Fetch the detail page for each project (slower)
    #[arg(long, short = 'd')]
    pub include_details: bool,

    /// Scrape a single project by id (e.g. 55220-001) instead of listings
    #[arg(long)]
    pub project_id: Option<String>,

    /// Output file path
    #[arg(long, short = 'o', default_value = "projects.json")]
    pub output: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Minimum delay between requests, in seconds
    #[arg(long, default_value = "1.5")]
    pub delay: f64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Maximum attempts per fetch, including the first
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Base backoff between retries, in seconds
    #[arg(long, default_value = "2.0")]
    pub backoff: f64,

    /// Proxy endpoint (http://host:port)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Fetch strategy: direct, bypass, browser or hybrid
    #[arg(long, default_value = "hybrid")]
    pub strategy: StrategyMode,

    /// Site base URL
    #[arg(long, default_value = "https://www.adb.org")]
    pub base_url: String,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,
}

impl CliConfig {
    pub fn scrape_config(&self) -> ScrapeConfig {
        let base_url = self.base_url.trim_end_matches('/').to_string();
        ScrapeConfig {
            listing_url: format!("{}/projects", base_url),
            base_url,
            delay: Duration::from_secs_f64(self.delay.max(0.0)),
            timeout: Duration::from_secs(self.timeout),
            max_retries: self.max_retries,
            base_backoff: Duration::from_secs_f64(self.backoff.max(0.0)),
            jitter: 0.5,
            proxy: self.proxy.clone(),
            strategy: self.strategy,
            max_pages: self.pages,
            start_page: self.start_page,
            include_details: self.include_details,
            rotate_user_agent: true,
        }
    }
}

/// Immutable configuration record consumed by the core pipeline.
/// Built once (from the CLI or by hand) and passed by reference; no
/// component holds process-wide mutable defaults.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub listing_url: String,
    /// Minimum spacing between outbound requests. Zero disables pacing.
    pub delay: Duration,
    pub timeout: Duration,
    /// Total attempts per logical fetch, including the first.
    pub max_retries: u32,
    pub base_backoff: Duration,
    /// Jitter fraction applied on top of the exponential backoff, in [0, 1].
    pub jitter: f64,
    pub proxy: Option<String>,
    pub strategy: StrategyMode,
    /// 0 means no explicit limit; rely on empty-page termination.
    pub max_pages: u32,
    pub start_page: u32,
    pub include_details: bool,
    pub rotate_user_agent: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.adb.org".to_string(),
            listing_url: "https://www.adb.org/projects".to_string(),
            delay: Duration::from_secs_f64(1.5),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_backoff: Duration::from_secs(2),
            jitter: 0.5,
            proxy: None,
            strategy: StrategyMode::Hybrid,
            max_pages: 0,
            start_page: 1,
            include_details: false,
            rotate_user_agent: true,
        }
    }
}

impl Validate for ScrapeConfig {
    fn validate(&self) -> Result<()> {
        validate_url("base_url", &self.base_url)?;
        validate_url("listing_url", &self.listing_url)?;
        if let Some(proxy) = &self.proxy {
            validate_url("proxy", proxy)?;
        }
        validate_positive_number("max_retries", u64::from(self.max_retries), 1)?;
        validate_positive_number("start_page", u64::from(self.start_page), 1)?;
        validate_range("jitter", self.jitter, 0.0, 1.0)?;
        if !self.delay.as_secs_f64().is_finite() {
            return Err(ScrapeError::InvalidConfigValue {
                field: "delay".to_string(),
                value: format!("{:?}", self.delay),
                reason: "delay must be finite".to_string(),
            });
        }
        Ok(())
    }
}

//! One logical HTTP GET: strategy dispatch, failure classification,
//! retry with exponential backoff, and request pacing.
//!
//! Network and HTTP errors never escape this module unclassified. A fetch
//! either returns page content or a single terminal [`FetchError`]; the
//! retryable kinds are consumed internally by the retry loop.

use crate::config::ScrapeConfig;
use crate::core::rate_limit::RateLimiter;
use crate::core::strategy::{StrategySelector, StrategySet};
use crate::domain::RawResponse;
use crate::utils::error::Result;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Body markers that, combined with a 403/503 status, identify a
/// bot-protection block rather than an ordinary server error. Observed on
/// the target site; revise against live responses if the challenge page
/// changes.
const BOT_PROTECTION_MARKERS: &[&str] = &[
    "Checking your browser",
    "Just a moment",
    "cf-browser-verification",
    "challenge-platform",
    "Cloudflare Ray ID",
];

/// Backoff never grows past this, whatever the attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Classified fetch failure.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection error, timeout, or 5xx response. Retryable.
    #[error("transient network error: {0}")]
    Transient(String),

    /// 429 response. Retryable; a server-directed `Retry-After` value
    /// replaces the computed backoff.
    #[error("rate limited by server")]
    RateLimited { retry_after: Option<u64> },

    /// 403/503 carrying bot-protection markers. Retryable, and signals the
    /// strategy selector to escalate.
    #[error("blocked by bot protection (status {status})")]
    BotBlocked { status: u16 },

    /// Any other 4xx. Terminal for this fetch.
    #[error("client error (status {status})")]
    Client { status: u16 },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Client { .. })
    }
}

/// Successfully fetched page content. Transient; never persisted.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub body: String,
    pub status: u16,
}

/// Sort a raw response into success or a classified failure.
fn classify(raw: RawResponse) -> std::result::Result<PageContent, FetchError> {
    match raw.status {
        200..=299 => Ok(PageContent {
            body: raw.body,
            status: raw.status,
        }),
        429 => Err(FetchError::RateLimited {
            retry_after: raw.retry_after,
        }),
        status @ (403 | 503) if looks_bot_blocked(&raw.body) => {
            Err(FetchError::BotBlocked { status })
        }
        status @ 500..=599 => Err(FetchError::Transient(format!(
            "server error (status {})",
            status
        ))),
        status => Err(FetchError::Client { status }),
    }
}

fn looks_bot_blocked(body: &str) -> bool {
    BOT_PROTECTION_MARKERS
        .iter()
        .any(|marker| body.contains(marker))
}

/// Wait before attempt `failed_attempt + 1`, given that 1-indexed attempt
/// `failed_attempt` just failed: `base * 2^(failed_attempt - 1)`, capped,
/// with a multiplicative jitter of up to `1 + jitter`.
fn backoff_delay(base: Duration, failed_attempt: u32, jitter: f64, jitter_unit: f64) -> Duration {
    let exponential = base.as_secs_f64() * 2f64.powi(failed_attempt.saturating_sub(1) as i32);
    let capped = exponential.min(MAX_BACKOFF.as_secs_f64());
    Duration::from_secs_f64(capped * (1.0 + jitter * jitter_unit))
}

/// Performs one logical fetch per call, owning the pacing and retry state.
pub struct Fetcher {
    max_retries: u32,
    base_backoff: Duration,
    jitter: f64,
    limiter: RateLimiter,
    selector: StrategySelector,
    strategies: StrategySet,
}

impl Fetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        Ok(Self::with_strategies(
            config,
            StrategySet::from_config(config)?,
        ))
    }

    /// Build a fetcher over an explicit strategy set (tests, or a custom
    /// browser capability).
    pub fn with_strategies(config: &ScrapeConfig, strategies: StrategySet) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            base_backoff: config.base_backoff,
            jitter: config.jitter,
            limiter: RateLimiter::new(config.delay),
            selector: StrategySelector::new(config.strategy),
            strategies,
        }
    }

    /// Fetch `url`, retrying transient failures with exponential backoff.
    ///
    /// Issues at most `max_retries` transport calls; every attempt first
    /// pays the rate-limit delay. The returned error is terminal: either a
    /// non-retryable failure or the last failure after retries ran out.
    pub async fn fetch(&mut self, url: &str) -> std::result::Result<PageContent, FetchError> {
        self.selector.reset();
        let mut last_failure: Option<FetchError> = None;

        for attempt in 1..=self.max_retries {
            self.limiter.wait().await;
            let strategy = self.selector.select(attempt, last_failure.as_ref());
            tracing::debug!(%url, attempt, %strategy, "fetching");

            let failure = match self.strategies.transport(strategy).perform(url).await {
                Ok(raw) => match classify(raw) {
                    Ok(page) => {
                        tracing::debug!(%url, status = page.status, "fetch succeeded");
                        return Ok(page);
                    }
                    Err(failure) => failure,
                },
                Err(err) => FetchError::Transient(err.to_string()),
            };

            if !failure.is_retryable() {
                tracing::debug!(%url, error = %failure, "non-retryable failure");
                return Err(failure);
            }

            if attempt < self.max_retries {
                let pause = match &failure {
                    FetchError::RateLimited {
                        retry_after: Some(seconds),
                    } => Duration::from_secs(*seconds),
                    _ => backoff_delay(
                        self.base_backoff,
                        attempt,
                        self.jitter,
                        rand::thread_rng().gen::<f64>(),
                    ),
                };
                tracing::warn!(%url, attempt, error = %failure, ?pause, "retrying");
                sleep(pause).await;
            }
            last_failure = Some(failure);
        }

        tracing::error!(%url, attempts = self.max_retries, "retries exhausted");
        Err(last_failure
            .unwrap_or_else(|| FetchError::Transient("no fetch attempts were made".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::strategy::StrategyMode;
    use crate::domain::{Transport, TransportError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    type Scripted = std::result::Result<RawResponse, String>;

    /// Transport that replays a scripted response sequence and counts calls.
    #[derive(Clone)]
    struct ScriptedTransport {
        responses: Arc<Mutex<VecDeque<Scripted>>>,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Scripted>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn unused() -> Self {
            Self::new(Vec::new())
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn perform(&self, _url: &str) -> std::result::Result<RawResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(Ok(raw)) => Ok(raw),
                Some(Err(message)) => Err(TransportError::new(message)),
                None => panic!("transport called more times than scripted"),
            }
        }
    }

    fn ok_page(body: &str) -> Scripted {
        Ok(RawResponse {
            status: 200,
            retry_after: None,
            body: body.to_string(),
        })
    }

    fn status(status: u16) -> Scripted {
        Ok(RawResponse {
            status,
            retry_after: None,
            body: String::new(),
        })
    }

    fn test_config(mode: StrategyMode, max_retries: u32) -> ScrapeConfig {
        ScrapeConfig {
            delay: Duration::ZERO,
            base_backoff: Duration::from_millis(10),
            jitter: 0.0,
            max_retries,
            strategy: mode,
            ..Default::default()
        }
    }

    fn fetcher_with(
        mode: StrategyMode,
        max_retries: u32,
        direct: &ScriptedTransport,
        bypass: &ScriptedTransport,
        browser: &ScriptedTransport,
    ) -> Fetcher {
        let set = StrategySet::custom(
            Box::new(direct.clone()),
            Box::new(bypass.clone()),
            Box::new(browser.clone()),
        );
        Fetcher::with_strategies(&test_config(mode, max_retries), set)
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_issues_one_call() {
        let direct = ScriptedTransport::new(vec![ok_page("<html>ok</html>")]);
        let bypass = ScriptedTransport::unused();
        let browser = ScriptedTransport::unused();
        let mut fetcher = fetcher_with(StrategyMode::Direct, 3, &direct, &bypass, &browser);

        let page = fetcher.fetch("https://example.org/projects").await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(direct.calls(), 1);
        assert_eq!(bypass.calls(), 0);
        assert_eq!(browser.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failures_then_success_within_budget() {
        let direct = ScriptedTransport::new(vec![
            status(500),
            Err("connection reset".to_string()),
            ok_page("ok"),
        ]);
        let bypass = ScriptedTransport::unused();
        let browser = ScriptedTransport::unused();
        let mut fetcher = fetcher_with(StrategyMode::Direct, 3, &direct, &bypass, &browser);

        let result = fetcher.fetch("https://example.org/projects").await;
        assert!(result.is_ok());
        assert_eq!(direct.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted_returns_last_failure() {
        let direct = ScriptedTransport::new(vec![status(502), status(503), status(500)]);
        let bypass = ScriptedTransport::unused();
        let browser = ScriptedTransport::unused();
        let mut fetcher = fetcher_with(StrategyMode::Direct, 3, &direct, &bypass, &browser);

        let err = fetcher.fetch("https://example.org/projects").await.unwrap_err();
        assert!(matches!(err, FetchError::Transient(_)));
        assert_eq!(direct.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_is_not_retried() {
        let direct = ScriptedTransport::new(vec![status(404)]);
        let bypass = ScriptedTransport::unused();
        let browser = ScriptedTransport::unused();
        let mut fetcher = fetcher_with(StrategyMode::Direct, 3, &direct, &bypass, &browser);

        let err = fetcher.fetch("https://example.org/projects").await.unwrap_err();
        assert!(matches!(err, FetchError::Client { status: 404 }));
        assert_eq!(direct.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_header_overrides_backoff() {
        let direct = ScriptedTransport::new(vec![
            Ok(RawResponse {
                status: 429,
                retry_after: Some(7),
                body: String::new(),
            }),
            ok_page("ok"),
        ]);
        let bypass = ScriptedTransport::unused();
        let browser = ScriptedTransport::unused();
        let mut fetcher = fetcher_with(StrategyMode::Direct, 3, &direct, &bypass, &browser);

        let start = Instant::now();
        let result = fetcher.fetch("https://example.org/projects").await;
        assert!(result.is_ok());
        assert_eq!(direct.calls(), 2);
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn bot_block_escalates_to_browser_exactly_once() {
        let blocked = Ok(RawResponse {
            status: 503,
            retry_after: None,
            body: "<html>Just a moment...</html>".to_string(),
        });
        let direct = ScriptedTransport::unused();
        let bypass = ScriptedTransport::new(vec![blocked]);
        let browser = ScriptedTransport::new(vec![ok_page("<html>projects</html>")]);
        let mut fetcher = fetcher_with(StrategyMode::Hybrid, 3, &direct, &bypass, &browser);

        let result = fetcher.fetch("https://example.org/projects").await;
        assert!(result.is_ok());
        assert_eq!(bypass.calls(), 1);
        assert_eq!(browser.calls(), 1);
        assert_eq!(direct.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn escalated_strategy_handles_all_remaining_attempts() {
        let blocked = || {
            Ok(RawResponse {
                status: 403,
                retry_after: None,
                body: "Checking your browser".to_string(),
            })
        };
        let direct = ScriptedTransport::unused();
        let bypass = ScriptedTransport::new(vec![blocked()]);
        let browser = ScriptedTransport::new(vec![blocked(), ok_page("ok")]);
        let mut fetcher = fetcher_with(StrategyMode::Hybrid, 3, &direct, &bypass, &browser);

        let result = fetcher.fetch("https://example.org/projects").await;
        assert!(result.is_ok());
        assert_eq!(bypass.calls(), 1);
        assert_eq!(browser.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn selector_resets_between_logical_fetches() {
        let blocked = Ok(RawResponse {
            status: 503,
            retry_after: None,
            body: "challenge-platform".to_string(),
        });
        let direct = ScriptedTransport::unused();
        let bypass = ScriptedTransport::new(vec![blocked, ok_page("first")]);
        let browser = ScriptedTransport::new(vec![ok_page("escalated")]);
        let mut fetcher = fetcher_with(StrategyMode::Hybrid, 3, &direct, &bypass, &browser);

        fetcher.fetch("https://example.org/projects?page=0").await.unwrap();
        // Second fetch starts back at the bypass strategy.
        fetcher.fetch("https://example.org/projects?page=1").await.unwrap();
        assert_eq!(bypass.calls(), 2);
        assert_eq!(browser.calls(), 1);
    }

    #[test]
    fn plain_403_is_a_client_error_not_a_bot_block() {
        let raw = RawResponse {
            status: 403,
            retry_after: None,
            body: "<html>Forbidden</html>".to_string(),
        };
        assert!(matches!(
            classify(raw),
            Err(FetchError::Client { status: 403 })
        ));
    }

    #[test]
    fn bot_marked_503_is_retryable_and_escalating() {
        let raw = RawResponse {
            status: 503,
            retry_after: None,
            body: "<title>Just a moment...</title>".to_string(),
        };
        let err = classify(raw).unwrap_err();
        assert!(matches!(err, FetchError::BotBlocked { status: 503 }));
        assert!(err.is_retryable());
    }

    #[test]
    fn backoff_is_exponential_and_bounded() {
        let base = Duration::from_secs(2);
        let jitter = 0.5;
        for n in 2u32..=6 {
            let failed_attempt = n - 1;
            let floor = Duration::from_secs_f64(2.0 * 2f64.powi(n as i32 - 2));
            let ceiling =
                Duration::from_secs_f64(2.0 * 2f64.powi(n as i32 - 1) * (1.0 + jitter));
            for unit in [0.0, 0.5, 0.999] {
                let delay = backoff_delay(base, failed_attempt, jitter, unit);
                assert!(delay >= floor, "attempt {} unit {}: {:?}", n, unit, delay);
                assert!(delay <= ceiling, "attempt {} unit {}: {:?}", n, unit, delay);
            }
        }
    }

    #[test]
    fn backoff_delays_are_non_decreasing() {
        let base = Duration::from_millis(500);
        let mut previous = Duration::ZERO;
        for failed_attempt in 1u32..=8 {
            let delay = backoff_delay(base, failed_attempt, 0.0, 0.0);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn backoff_respects_the_cap() {
        let delay = backoff_delay(Duration::from_secs(10), 12, 0.0, 0.0);
        assert_eq!(delay, MAX_BACKOFF);
    }
}

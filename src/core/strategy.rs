//! Fetch strategies and strategy selection.
//!
//! Three transport profiles are available: a plain direct client, a
//! bypass-capable client with a full browser fingerprint, and a
//! browser-capable client (the strongest, costliest profile). The selector
//! decides which one a fetch attempt uses and escalates after a
//! bot-protection block; it never inspects how a transport gets through.

use crate::config::ScrapeConfig;
use crate::core::fetch::FetchError;
use crate::domain::{RawResponse, Transport, TransportError};
use crate::utils::error::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The strategy an individual attempt goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Direct,
    Bypass,
    Browser,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Bypass => "bypass",
            Self::Browser => "browser",
        };
        write!(f, "{}", name)
    }
}

/// Configuration-selected strategy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyMode {
    /// Plain requests only, bot-protection bypass disabled.
    Direct,
    /// Bypass-capable client only.
    Bypass,
    /// Browser-capable client only.
    Browser,
    /// Start with the bypass client, escalate to the browser client after a
    /// bot-protection block. The default.
    Hybrid,
}

impl FromStr for StrategyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "bypass" => Ok(Self::Bypass),
            "browser" => Ok(Self::Browser),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!(
                "unknown strategy `{}` (expected direct, bypass, browser or hybrid)",
                other
            )),
        }
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Bypass => "bypass",
            Self::Browser => "browser",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{}", name)
    }
}

/// Picks the strategy for each attempt of one logical fetch.
///
/// Escalation is sticky for the remainder of the fetch; [`reset`] puts the
/// selector back to its starting strategy for the next logical fetch.
///
/// [`reset`]: StrategySelector::reset
#[derive(Debug)]
pub struct StrategySelector {
    mode: StrategyMode,
    escalated: bool,
}

impl StrategySelector {
    pub fn new(mode: StrategyMode) -> Self {
        Self {
            mode,
            escalated: false,
        }
    }

    pub fn reset(&mut self) {
        self.escalated = false;
    }

    pub fn select(&mut self, attempt: u32, prior_failure: Option<&FetchError>) -> StrategyKind {
        if matches!(prior_failure, Some(FetchError::BotBlocked { .. })) && !self.escalated {
            self.escalated = true;
            tracing::info!(attempt, "bot protection detected, escalating to browser strategy");
        }
        match self.mode {
            StrategyMode::Direct => StrategyKind::Direct,
            StrategyMode::Bypass => StrategyKind::Bypass,
            StrategyMode::Browser => StrategyKind::Browser,
            StrategyMode::Hybrid => {
                if self.escalated {
                    StrategyKind::Browser
                } else {
                    StrategyKind::Bypass
                }
            }
        }
    }
}

/// User agents rotated across requests to avoid trivial blocks.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert("DNT", HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers
}

/// A reqwest-backed transport profile.
pub struct HttpTransport {
    client: reqwest::Client,
    rotate_user_agent: bool,
}

impl HttpTransport {
    fn build(
        config: &ScrapeConfig,
        headers: HeaderMap,
        cookies: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .cookie_store(cookies);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            rotate_user_agent: config.rotate_user_agent,
        })
    }

    /// Plain client: no fingerprinting beyond a rotated user agent.
    pub fn direct(config: &ScrapeConfig) -> Result<Self> {
        Self::build(config, HeaderMap::new(), false, config.timeout)
    }

    /// Bypass profile: browser fingerprint headers plus a cookie jar, so
    /// clearance cookies issued after a challenge persist across requests.
    pub fn bypass(config: &ScrapeConfig) -> Result<Self> {
        Self::build(config, browser_headers(), true, config.timeout)
    }

    /// Browser profile: the fullest emulation this crate ships, with an
    /// extended timeout to ride out challenge interstitials. The
    /// [`Transport`] trait is the seam for swapping in a real headless
    /// browser.
    pub fn browser(config: &ScrapeConfig) -> Result<Self> {
        Self::build(config, browser_headers(), true, config.timeout * 2)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(&self, url: &str) -> std::result::Result<RawResponse, TransportError> {
        let mut request = self.client.get(url);
        if self.rotate_user_agent {
            request = request.header(header::USER_AGENT, random_user_agent());
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let body = response.text().await?;
        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// The three transports a fetcher can route an attempt through.
pub struct StrategySet {
    direct: Box<dyn Transport>,
    bypass: Box<dyn Transport>,
    browser: Box<dyn Transport>,
}

impl StrategySet {
    pub fn from_config(config: &ScrapeConfig) -> Result<Self> {
        Ok(Self {
            direct: Box::new(HttpTransport::direct(config)?),
            bypass: Box::new(HttpTransport::bypass(config)?),
            browser: Box::new(HttpTransport::browser(config)?),
        })
    }

    /// Assemble a set from arbitrary transports. This is how tests inject
    /// scripted responses, and how a real headless-browser capability would
    /// be plugged in.
    pub fn custom(
        direct: Box<dyn Transport>,
        bypass: Box<dyn Transport>,
        browser: Box<dyn Transport>,
    ) -> Self {
        Self {
            direct,
            bypass,
            browser,
        }
    }

    pub fn transport(&self, kind: StrategyKind) -> &dyn Transport {
        match kind {
            StrategyKind::Direct => self.direct.as_ref(),
            StrategyKind::Bypass => self.bypass.as_ref(),
            StrategyKind::Browser => self.browser.as_ref(),
        }
    }
}

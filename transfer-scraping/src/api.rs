use std::time::Duration;

use log::{debug, warn};
use rand::{seq::SliceRandom, Rng};
use reqwest::{header, StatusCode};
use thiserror::Error;
use tokio::{
    sync::{AcquireError, Semaphore},
    time::sleep,
};
use url::Url;

use crate::{
    config::FetchSettings,
    rate_limit::RateLimiter,
    schema::{SeasonYear, Window},
};

// Only the international version of the site is scraped.
pub const URL_BASE: &str = "https://www.transfermarkt.com";

const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/115.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15) Firefox/113.0",
    "Mozilla/5.0 (X11; Linux x86_64) Chrome/113.0.0.0",
];

// URL query keys are in German.
const QUERY_SEASON_ID: &str = "saison_id";
const QUERY_WINDOW: &str = "s_w";
const QUERY_LOANS: &str = "leihe";
const QUERY_INTERNAL_MOVEMENTS: &str = "intern";

/// Transfer listing page of one club for one (season, window).
pub fn club_transfers_url(
    club_slug: &str,
    club_id: u32,
    season: SeasonYear,
    window: Window,
) -> Result<Url, FetchError> {
    let url = format!(
        "{URL_BASE}/{club_slug}/transfers/verein/{club_id}/plus/\
         ?{QUERY_SEASON_ID}={season}&{QUERY_WINDOW}={}&{QUERY_LOANS}=3&{QUERY_INTERNAL_MOVEMENTS}=0",
        window.query_value(),
    );
    Ok(Url::parse(&url)?)
}

/// A successfully fetched listing page, body undecoded beyond UTF-8.
#[derive(Clone, Debug)]
pub struct RawPage {
    pub url: Url,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-retriable response; the club/season is skipped and logged.
    #[error("Terminal HTTP status {status} fetching {url}")]
    Terminal { status: StatusCode, url: Url },
    /// Transient failures persisted through every allowed attempt.
    #[error("Giving up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: Url,
        attempts: u32,
        last_error: String,
    },
    #[error("Invalid transfer page URL: {0}")]
    BadUrl(#[from] url::ParseError),
    #[error("Fetch pool closed: {0}")]
    PoolClosed(#[from] AcquireError),
    #[error("Failed to construct HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

enum AttemptError {
    Transient(String),
    RateLimited(Duration),
    Terminal(StatusCode),
}

// A host that keeps answering 429 is suspended and resumed, not skipped;
// only this many suspensions for one page count as a failure.
const MAX_RATE_LIMIT_SUSPENSIONS: u32 = 32;

/// Transient failures and rate-limit suspensions draw on separate budgets:
/// being told to slow down is not evidence that the page is unfetchable.
struct RetryBudget {
    transient: u32,
    max_transient: u32,
    suspensions: u32,
}

impl RetryBudget {
    fn new(max_transient: u32) -> Self {
        Self {
            transient: 0,
            max_transient,
            suspensions: 0,
        }
    }

    /// Records a transient failure; returns false once the budget is spent.
    fn record_transient(&mut self) -> bool {
        self.transient += 1;
        self.transient < self.max_transient
    }

    /// Records a rate-limit suspension; returns false once the cap is hit.
    fn record_suspension(&mut self) -> bool {
        self.suspensions += 1;
        self.suspensions < MAX_RATE_LIMIT_SUSPENSIONS
    }

    fn attempts(&self) -> u32 {
        self.transient + self.suspensions
    }
}

/// HTTP client wrapper owning the politeness state: per-host rate limiter
/// plus a cap on concurrent in-flight requests, independent of queue depth.
pub struct TransferClient {
    client: reqwest::Client,
    limiter: RateLimiter,
    in_flight: Semaphore,
    settings: FetchSettings,
}

impl TransferClient {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self {
            client,
            limiter: RateLimiter::new(settings.min_delay()),
            in_flight: Semaphore::new(settings.max_in_flight),
            settings,
        })
    }

    /// Fetches one listing page, retrying transient failures with exponential
    /// backoff and jitter.  Rate-limit responses suspend the host via the
    /// shared limiter instead of backing off locally.
    pub async fn fetch(&self, url: Url) -> Result<RawPage, FetchError> {
        let host = url.host_str().unwrap_or_default().to_owned();
        let mut budget = RetryBudget::new(self.settings.max_attempts);
        let mut last_error;
        loop {
            // Permit scope covers only the request itself, not backoff sleeps.
            let outcome = {
                let _permit = self.in_flight.acquire().await?;
                self.limiter.acquire(&host).await;
                self.try_fetch(&url).await
            };
            match outcome {
                Ok(page) => return Ok(page),
                Err(AttemptError::Terminal(status)) => {
                    return Err(FetchError::Terminal { status, url })
                }
                Err(AttemptError::RateLimited(cooldown)) => {
                    warn!("Rate limited by {host}; suspending requests for {cooldown:?}");
                    self.limiter.cooldown(&host, cooldown).await;
                    last_error = "rate limited".to_owned();
                    if !budget.record_suspension() {
                        break;
                    }
                }
                Err(AttemptError::Transient(error)) => {
                    last_error = error;
                    if !budget.record_transient() {
                        break;
                    }
                    let delay = backoff_delay(budget.transient, self.settings.backoff_base());
                    debug!(
                        "Attempt {} for {url} failed ({last_error}); retrying in {delay:?}",
                        budget.transient,
                    );
                    sleep(delay).await;
                }
            }
        }
        Err(FetchError::Exhausted {
            url,
            attempts: budget.attempts(),
            last_error,
        })
    }

    async fn try_fetch(&self, url: &Url) -> Result<RawPage, AttemptError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, random_user_agent())
            .send()
            .await
            .map_err(|e| AttemptError::Transient(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let cooldown = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after)
                .unwrap_or_else(|| self.settings.default_cooldown());
            return Err(AttemptError::RateLimited(cooldown));
        }
        if status.is_server_error() {
            return Err(AttemptError::Transient(format!("server error {status}")));
        }
        if !status.is_success() {
            return Err(AttemptError::Terminal(status));
        }
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transient(e.to_string()))?;
        // A listing page always closes its document; anything shorter was cut off.
        if !body.contains("</html>") {
            return Err(AttemptError::Transient("truncated response body".to_owned()));
        }
        Ok(RawPage {
            url: url.clone(),
            body,
        })
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let exponential = base.saturating_mul(1 << attempt.min(6));
    let jitter = rand::thread_rng().gen_range(0..=base.as_millis().max(1) as u64 / 2);
    exponential + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn club_url_carries_season_and_window_queries() {
        let url = club_transfers_url(
            "chelsea-fc",
            631,
            SeasonYear::from(2024),
            Window::Winter,
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("www.transfermarkt.com"));
        assert_eq!(
            url.query(),
            Some("saison_id=2024&s_w=w&leihe=3&intern=0")
        );
        assert!(url.path().starts_with("/chelsea-fc/transfers/verein/631"));
    }

    #[test]
    fn retry_after_header_parses_to_seconds() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }

    #[test]
    fn rate_limit_suspensions_do_not_consume_the_transient_budget() {
        let mut budget = RetryBudget::new(4);
        for _ in 0..8 {
            assert!(budget.record_suspension());
        }
        // Three more transient failures are still allowed after that.
        assert!(budget.record_transient());
        assert!(budget.record_transient());
        assert!(budget.record_transient());
        assert!(!budget.record_transient());
        assert_eq!(budget.attempts(), 12);
    }

    #[test]
    fn persistent_rate_limiting_is_eventually_bounded() {
        let mut budget = RetryBudget::new(4);
        for _ in 0..MAX_RATE_LIMIT_SUSPENSIONS - 1 {
            assert!(budget.record_suspension());
        }
        assert!(!budget.record_suspension());
    }

    #[test]
    fn backoff_grows_and_stays_within_jitter_bounds() {
        let base = Duration::from_millis(100);
        for attempt in 1..5 {
            let delay = backoff_delay(attempt, base);
            let exponential = base * (1 << attempt);
            assert!(delay >= exponential);
            assert!(delay <= exponential + base / 2);
        }
    }
}

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use rand::Rng;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::fetch::{Endpoint, Fetch, FetchError, Params, provider_error, response_items};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const API_KEY_HEADER: &str = "x-apisports-key";
const MAX_ERROR_BODY: usize = 300;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// Spaces request starts at least `min_interval` apart, across threads.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Reserves the next slot and returns how long the caller must wait for it.
    pub fn reserve(&self) -> Duration {
        let mut guard = self.next_slot.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();
        let slot = guard.map_or(now, |next| next.max(now));
        *guard = Some(slot + self.min_interval);
        slot.saturating_duration_since(now)
    }

    pub fn wait(&self) {
        let delay = self.reserve();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

pub struct ApiFootballClient {
    client: &'static Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    retry_base: Duration,
    max_pages: u32,
    limiter: RateLimiter,
}

impl ApiFootballClient {
    pub fn new(cfg: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            max_retries: cfg.max_retries,
            retry_base: cfg.retry_base,
            max_pages: cfg.max_pages.max(1),
            limiter: RateLimiter::new(cfg.min_interval),
        })
    }

    fn get_once(&self, endpoint: Endpoint, params: &Params) -> Result<Value, FetchError> {
        self.limiter.wait();
        let url = format!("{}/{}", self.base_url, endpoint.path());
        debug!(%endpoint, %params, "GET");

        let resp = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(params.pairs())
            .send()
            .map_err(|err| FetchError::Transport {
                endpoint,
                message: err.to_string(),
            })?;
        let status = resp.status();
        let body = resp.text().map_err(|err| FetchError::Transport {
            endpoint,
            message: format!("failed reading body: {err}"),
        })?;
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint,
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let value: Value =
            serde_json::from_str(body.trim()).map_err(|err| FetchError::Decode {
                endpoint,
                message: err.to_string(),
            })?;
        if let Some(message) = provider_error(&value) {
            return Err(FetchError::Api { endpoint, message });
        }
        Ok(value)
    }

    fn get_with_retry(&self, endpoint: Endpoint, params: &Params) -> Result<Value, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.get_once(endpoint, params) {
                Ok(v) => return Ok(v),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff(self.retry_base, attempt);
                    warn!(
                        %endpoint,
                        %params,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request: {err}"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Fetch for ApiFootballClient {
    fn fetch(&self, endpoint: Endpoint, params: &Params) -> Result<Value, FetchError> {
        let mut first = self.get_with_retry(endpoint, params)?;
        let total = paging_total(&first);
        // Explicit page requests are the caller's business.
        if total <= 1 || params.get("page").is_some() {
            return Ok(first);
        }

        let last = total.min(self.max_pages);
        if last < total {
            warn!(%endpoint, %params, total, kept = last, "truncating paged response");
        }
        let mut items = response_items(&first).to_vec();
        for page in 2..=last {
            let next = self.get_with_retry(endpoint, &params.clone().with("page", page))?;
            items.extend(response_items(&next).iter().cloned());
        }
        if let Some(obj) = first.as_object_mut() {
            obj.insert("response".to_string(), Value::Array(items));
        }
        Ok(first)
    }
}

fn paging_total(v: &Value) -> u32 {
    v.get("paging")
        .and_then(|p| p.get("total"))
        .and_then(|x| x.as_u64())
        .unwrap_or(1) as u32
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(1u32 << attempt.min(6));
    let jitter_cap = (base.as_millis() as u64 / 2).max(1);
    let jitter = rand::thread_rng().gen_range(0..=jitter_cap);
    exp + Duration::from_millis(jitter)
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn limiter_spaces_reservations() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        assert!(limiter.reserve().is_zero());
        let second = limiter.reserve();
        assert!(second > Duration::from_millis(100));
        assert!(second <= Duration::from_millis(200));
    }

    #[test]
    fn zero_interval_never_waits() {
        let limiter = RateLimiter::new(Duration::ZERO);
        for _ in 0..5 {
            assert!(limiter.reserve().is_zero());
        }
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let base = Duration::from_millis(100);
        let first = backoff(base, 0);
        let third = backoff(base, 2);
        assert!(first >= base && first <= Duration::from_millis(150));
        assert!(third >= Duration::from_millis(400));
    }

    #[test]
    fn paging_total_defaults_to_one() {
        assert_eq!(paging_total(&json!({"response": []})), 1);
        assert_eq!(
            paging_total(&json!({"paging": {"current": 1, "total": 3}})),
            3
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "é".repeat(10);
        let out = truncate(&s, 5);
        assert!(out.ends_with("..."));
    }
}

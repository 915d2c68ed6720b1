//! Remote export fetching
//!
//! The remote tier asks an export service for the exports of one object
//! path. The call blocks until the response arrives or the agent's global
//! timeout elapses.

use crate::cache::FetchCache;
use kiln_core::{KilnError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const EXPORT_ENDPOINT: &str = "/api/v1/export";
const MAX_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;

/// What the export service returned for one path
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResponse {
    /// An export envelope, usable as a one-off batch
    Exports(Value),
    /// Raw payload bytes such as texel or audio data
    Binary(Vec<u8>),
    NotFound,
}

/// Source of exports for objects that exist nowhere locally
pub trait RemoteFetcher: Send {
    /// Fetcher name for logs (e.g. "http", "mock")
    fn name(&self) -> &str;

    /// Request the exports of `object_path` (`/Game/Tex.Tex`)
    fn fetch(&self, object_path: &str) -> Result<FetchResponse>;
}

/// Fetcher backed by an HTTP export service
pub struct HttpFetcher {
    base_url: String,
    timeout: Duration,
    cache: Option<FetchCache>,
}

impl HttpFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: FetchCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_agent(&self) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build();
        config.into()
    }

    /// GET the export endpoint. `Ok(None)` is a 404.
    fn get_with_retry(&self, object_path: &str) -> Result<Option<Vec<u8>>> {
        let url = format!("{}{}", self.base_url, EXPORT_ENDPOINT);
        for attempt in 0..MAX_RETRIES {
            let agent = self.build_agent();
            let response = agent
                .get(&url)
                .query("raw", "false")
                .query("path", object_path)
                .call();

            match response {
                Ok(ok) => {
                    let mut reader = ok.into_body().into_reader();
                    let mut bytes = Vec::new();
                    std::io::Read::read_to_end(&mut reader, &mut bytes).map_err(|e| {
                        KilnError::FetchError(format!("Failed to read response for {}: {}", object_path, e))
                    })?;
                    return Ok(Some(bytes));
                }
                Err(ureq::Error::StatusCode(404)) => return Ok(None),
                Err(ureq::Error::Timeout(_)) => return Err(KilnError::FetchTimeout(self.timeout)),
                Err(e) => {
                    if attempt + 1 < MAX_RETRIES && is_retryable_error(&e) {
                        sleep_backoff(attempt);
                        continue;
                    }
                    return Err(KilnError::FetchError(format!(
                        "Export request for {} failed: {}",
                        object_path, e
                    )));
                }
            }
        }

        Err(KilnError::FetchError(format!(
            "Export request for {} failed after retries",
            object_path
        )))
    }
}

impl RemoteFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(&self, object_path: &str) -> Result<FetchResponse> {
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get_json(object_path) {
                tracing::debug!(path = object_path, "remote export served from cache");
                return Ok(classify_json(value));
            }
        }

        let Some(bytes) = self.get_with_retry(object_path)? else {
            return Ok(FetchResponse::NotFound);
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => {
                let response = classify_json(value);
                if let (Some(cache), FetchResponse::Exports(value)) = (&self.cache, &response) {
                    if let Err(e) = cache.put_json(object_path, value) {
                        tracing::warn!(path = object_path, error = %e, "failed to cache remote export");
                    }
                }
                Ok(response)
            }
            Err(_) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.put_binary(object_path, &bytes) {
                        tracing::warn!(path = object_path, error = %e, "failed to cache remote payload");
                    }
                }
                Ok(FetchResponse::Binary(bytes))
            }
        }
    }
}

/// Sort a JSON response into exports or a miss
fn classify_json(value: Value) -> FetchResponse {
    if value.get("errored").is_some() {
        return FetchResponse::NotFound;
    }
    let has_exports = value.is_array()
        || value.get("jsonOutput").map(Value::is_array).unwrap_or(false)
        || value.get("data").map(Value::is_array).unwrap_or(false);
    if has_exports {
        FetchResponse::Exports(value)
    } else {
        FetchResponse::NotFound
    }
}

fn is_retryable_error(e: &ureq::Error) -> bool {
    match e {
        ureq::Error::Io(_) => true,
        ureq::Error::StatusCode(code) => matches!(code, 429 | 502 | 503 | 504),
        _ => false,
    }
}

fn sleep_backoff(attempt: usize) {
    let delay_ms = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt);
    std::thread::sleep(Duration::from_millis(delay_ms));
}

/// Requests seen by a [`MockFetcher`], shared with whoever holds a clone
#[derive(Debug, Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<String>>>);

impl RequestLog {
    pub fn requests(&self) -> Vec<String> {
        self.0.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.requests().len()
    }

    fn record(&self, object_path: &str) {
        if let Ok(mut log) = self.0.lock() {
            log.push(object_path.to_string());
        }
    }
}

/// In-memory fetcher serving canned responses, no network calls
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: HashMap<String, FetchResponse>,
    log: RequestLog,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exports(mut self, object_path: &str, exports: Value) -> Self {
        self.responses
            .insert(object_path.to_string(), FetchResponse::Exports(exports));
        self
    }

    pub fn with_binary(mut self, object_path: &str, bytes: Vec<u8>) -> Self {
        self.responses
            .insert(object_path.to_string(), FetchResponse::Binary(bytes));
        self
    }

    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }
}

impl RemoteFetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(&self, object_path: &str) -> Result<FetchResponse> {
        self.log.record(object_path);
        Ok(self
            .responses
            .get(object_path)
            .cloned()
            .map(|response| match response {
                FetchResponse::Exports(value) => classify_json(value),
                other => other,
            })
            .unwrap_or(FetchResponse::NotFound))
    }
}

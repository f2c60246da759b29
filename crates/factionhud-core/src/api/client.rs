//! Rate-limited, caching client for the Torn API.
//!
//! Every Torn call in the application goes through one `NetworkClient`, so
//! the response cache and the per-minute call budget are shared by the roster
//! poller, the target list and anything else holding a clone.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::rate_limit::{RateLimitLog, RateStatus};
use super::transport::{HttpTransport, Transport};
use super::ApiError;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::utils::{lock, read, write};

// ============================================================================
// Constants
// ============================================================================

/// Tag appended to every request so the key owner can see where calls came from
const REQUEST_COMMENT: &str = "factionhud";

const USER_SELECTIONS: &str = "basic,profile,personalstats";
const USER_STATS_SELECTIONS: &str = "basic,profile,personalstats,battlestats";
const FACTION_SELECTIONS: &str = "basic,members";
const FACTION_WAR_SELECTIONS: &str = "basic,members,wars";
const ATTACKS_SELECTIONS: &str = "attacks";
const ATTACKS_FULL_SELECTIONS: &str = "attacksfull";

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip the cache lookup. The response is still cached afterwards.
    pub bypass_cache: bool,
}

impl FetchOptions {
    pub fn fresh() -> Self {
        Self { bypass_cache: true }
    }
}

/// Result of probing a candidate API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyCheck {
    Valid {
        user_id: i64,
        name: String,
        level: i64,
    },
    Invalid {
        code: i64,
        message: String,
    },
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: RwLock<Option<String>>,
    cache: Mutex<ResponseCache>,
    rate_log: Mutex<RateLimitLog>,
    cooldown: Duration,
    retry_delay: Duration,
    max_retries: u32,
}

/// Torn API client. Clone is cheap and clones share cache and rate budget.
#[derive(Clone)]
pub struct NetworkClient {
    inner: Arc<ClientInner>,
}

impl NetworkClient {
    /// Create a client over the reqwest transport
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config.request_timeout())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                base_url: config.torn_api_url.trim_end_matches('/').to_string(),
                api_key: RwLock::new(None),
                cache: Mutex::new(ResponseCache::new(config.cache_duration())),
                rate_log: Mutex::new(RateLimitLog::new(config.api_rate_limit)),
                cooldown: config.rate_limit_cooldown(),
                retry_delay: config.retry_delay(),
                max_retries: config.max_retries,
            }),
        }
    }

    /// Set (or clear) the API key used for every request
    pub fn set_api_key(&self, key: Option<String>) {
        let key = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        *write(&self.inner.api_key) = key;
    }

    pub fn has_api_key(&self) -> bool {
        read(&self.inner.api_key).is_some()
    }

    fn api_key(&self) -> Option<String> {
        read(&self.inner.api_key).clone()
    }

    fn build_url(&self, endpoint: &str, id: &str, selections: &str, key: &str, comment: &str) -> String {
        let id_part = if id.is_empty() {
            String::new()
        } else {
            format!("/{}", id)
        };
        format!(
            "{}/{}{}?selections={}&key={}&comment={}",
            self.inner.base_url, endpoint, id_part, selections, key, comment
        )
    }

    /// Fetch `selections` for `endpoint`/`id`, serving from cache when possible.
    ///
    /// Lookup order: cache, admission control, dispatch, cache write. A
    /// "too many requests" response is retried after `retry_delay`, at most
    /// `max_retries` times.
    pub async fn fetch(
        &self,
        endpoint: &str,
        selections: &str,
        id: &str,
        options: FetchOptions,
    ) -> Result<Arc<Value>, ApiError> {
        let key = self.api_key().ok_or(ApiError::NotConfigured)?;
        let cache_key = ResponseCache::cache_key(endpoint, id, selections);

        if !options.bypass_cache {
            if let Some(hit) = lock(&self.inner.cache).get(&cache_key) {
                debug!(key = %cache_key, "Cache hit");
                return Ok(hit);
            }
        }

        let url = self.build_url(endpoint, id, selections, &key, REQUEST_COMMENT);
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.admit().await;
            debug!(endpoint, id, selections, attempt = attempts, "API request");

            match self.dispatch(&url).await {
                Ok(payload) => {
                    let payload = Arc::new(payload);
                    lock(&self.inner.cache).insert(cache_key.clone(), Arc::clone(&payload));
                    debug!(key = %cache_key, "API response cached");
                    return Ok(payload);
                }
                Err(ApiError::RateLimited) => {
                    if attempts > self.inner.max_retries {
                        warn!(endpoint, id, attempts, "Rate limit retries exhausted");
                        return Err(ApiError::RetryBudgetExhausted { attempts });
                    }
                    warn!(
                        endpoint,
                        id,
                        retry = attempts,
                        delay_ms = self.inner.retry_delay.as_millis() as u64,
                        "Too many requests, backing off"
                    );
                    tokio::time::sleep(self.inner.retry_delay).await;
                }
                Err(e) => {
                    warn!(endpoint, id, error = %e, "API request failed");
                    return Err(e);
                }
            }
        }
    }

    /// Wait until the trailing-minute budget has room, then log the call.
    ///
    /// A full window first costs one cool-down; if the window is still full
    /// after that, the caller waits for the oldest call to age out so the
    /// budget is never exceeded.
    async fn admit(&self) {
        {
            let mut log = lock(&self.inner.rate_log);
            let now = Instant::now();
            log.prune(now);
            if !log.is_full() {
                log.record(now);
                return;
            }
        }

        debug!("Rate limit reached, waiting...");
        tokio::time::sleep(self.inner.cooldown).await;

        loop {
            let wait = {
                let mut log = lock(&self.inner.rate_log);
                let now = Instant::now();
                log.prune(now);
                if !log.is_full() {
                    log.record(now);
                    return;
                }
                log.time_until_slot(now)
            };
            debug!(wait_ms = wait.as_millis() as u64, "Rate window still full");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Issue one request and unwrap the Torn error envelope.
    async fn dispatch(&self, url: &str) -> Result<Value, ApiError> {
        let payload = self.inner.transport.get_json(url).await?;

        if let Some((code, message)) = error_envelope(&payload) {
            return Err(ApiError::from_envelope(code, &message));
        }
        if !payload.is_object() {
            return Err(ApiError::InvalidResponse("expected a JSON object".to_string()));
        }
        Ok(payload)
    }

    // ===== Field presets =====

    pub async fn get_user(&self, user_id: &str) -> Result<Arc<Value>, ApiError> {
        self.fetch("user", USER_SELECTIONS, user_id, FetchOptions::default()).await
    }

    /// User data including battle stats (only visible for the key owner)
    pub async fn get_user_with_stats(&self, user_id: &str) -> Result<Arc<Value>, ApiError> {
        self.fetch("user", USER_STATS_SELECTIONS, user_id, FetchOptions::default()).await
    }

    pub async fn get_faction(&self, faction_id: &str) -> Result<Arc<Value>, ApiError> {
        self.fetch("faction", FACTION_SELECTIONS, faction_id, FetchOptions::default()).await
    }

    pub async fn get_faction_war(&self, faction_id: &str) -> Result<Arc<Value>, ApiError> {
        self.fetch("faction", FACTION_WAR_SELECTIONS, faction_id, FetchOptions::default()).await
    }

    pub async fn get_attacks(&self, user_id: &str) -> Result<Arc<Value>, ApiError> {
        self.fetch("user", ATTACKS_SELECTIONS, user_id, FetchOptions::default()).await
    }

    pub async fn get_attacks_full(&self, user_id: &str) -> Result<Arc<Value>, ApiError> {
        self.fetch("user", ATTACKS_FULL_SELECTIONS, user_id, FetchOptions::default()).await
    }

    /// Probe a candidate key without touching the configured one or the cache.
    /// Error envelopes become `KeyCheck::Invalid`; transport failures are errors.
    pub async fn validate_key(&self, candidate: &str) -> Result<KeyCheck, ApiError> {
        let url = self.build_url("user", "", "basic", candidate.trim(), "factionhud-test");
        self.admit().await;
        let payload = self.inner.transport.get_json(&url).await?;

        if let Some((code, message)) = error_envelope(&payload) {
            return Ok(KeyCheck::Invalid { code, message });
        }

        Ok(KeyCheck::Valid {
            user_id: payload.get("player_id").and_then(Value::as_i64).unwrap_or_default(),
            name: payload
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            level: payload.get("level").and_then(Value::as_i64).unwrap_or_default(),
        })
    }

    pub fn clear_cache(&self) {
        lock(&self.inner.cache).clear();
        debug!("API cache cleared");
    }

    /// Current use of the trailing-minute budget
    pub fn rate_status(&self) -> RateStatus {
        lock(&self.inner.rate_log).status(Instant::now())
    }
}

/// Extract `(code, message)` from a Torn error envelope, if present.
fn error_envelope(payload: &Value) -> Option<(i64, String)> {
    let error = payload.get("error")?;
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
    let message = error
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    Some((code, message))
}

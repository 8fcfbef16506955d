// ── Player configuration and the configuration cache ──
//
// The configuration document is remote state with an explicit refresh
// lifecycle: fetched at most once per interval, shared by every caller,
// retained across failed refreshes. The cache is the only component
// allowed to mutate the value.

use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use marquee_api::PullClient;

/// Only fetch a new configuration if more than 5 minutes have passed.
const CONFIG_FETCH_INTERVAL: Duration = Duration::from_secs(5 * 60);

// ── Configuration document ───────────────────────────────────────────

/// The remote configuration document consumed by the player.
///
/// Immutable once fetched; replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConfig {
    /// Base endpoint all content IRIs resolve against.
    pub api_endpoint: Url,

    /// Which sync strategy to run, and how.
    #[serde(default)]
    pub data_strategy: DataStrategy,

    /// All remaining fields of the document.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Sync strategy selection plus its strategy-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStrategy {
    /// Strategy discriminator (`"pull"` today).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub config: StrategyConfig,
}

/// Strategy-specific settings from the configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    /// Default screen path to synchronize when no override is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,

    /// Poll interval in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,

    /// All remaining strategy settings.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Errors ───────────────────────────────────────────────────────────

/// Configuration load failure.
///
/// `Clone` so a single failed fetch can resolve every waiter sharing the
/// in-flight load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration fetch failed: {message}")]
    Fetch { message: String },

    #[error("configuration document invalid: {message}")]
    Invalid { message: String },
}

// ── Fetcher contract ─────────────────────────────────────────────────

/// Source of the raw configuration document.
///
/// Injectable so tests can count fetches and script failures.
pub trait ConfigFetcher: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<PlayerConfig, ConfigError>> + Send;
}

/// Fetches `config.json` from the player's own origin.
#[derive(Clone)]
pub struct HttpConfigFetcher {
    client: PullClient,
    path: String,
}

impl HttpConfigFetcher {
    pub fn new(client: PullClient) -> Self {
        Self {
            client,
            path: "/client/config.json".to_owned(),
        }
    }

    pub fn with_path(client: PullClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

impl ConfigFetcher for HttpConfigFetcher {
    async fn fetch(&self) -> Result<PlayerConfig, ConfigError> {
        match self.client.get::<PlayerConfig>(&self.path).await {
            Ok(config) => Ok(config),
            Err(marquee_api::Error::Deserialization { message, .. }) => {
                Err(ConfigError::Invalid { message })
            }
            Err(e) => Err(ConfigError::Fetch {
                message: e.to_string(),
            }),
        }
    }
}

// ── Cache ────────────────────────────────────────────────────────────

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<PlayerConfig>, ConfigError>>>;

/// Time-boxed, single-flight cache of the configuration document.
///
/// Concurrent callers of [`load`](Self::load) share one in-flight fetch;
/// within the freshness window the cached value is returned without any
/// network access; a failed refresh falls back to the last good value.
pub struct ConfigCache<F> {
    inner: Arc<CacheInner<F>>,
}

impl<F> Clone for ConfigCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CacheInner<F> {
    fetcher: F,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    value: Option<Arc<PlayerConfig>>,
    /// Timestamp of the start of the last successful fetch. Freshness is
    /// measured from request start, not completion.
    fetched_at: Option<Instant>,
    inflight: Option<SharedLoad>,
}

impl<F: ConfigFetcher> ConfigCache<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                fetcher,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Load the configuration, fetching at most once per interval.
    pub async fn load(&self) -> Result<Arc<PlayerConfig>, ConfigError> {
        let shared = {
            let mut state = self.inner.state.lock().await;

            if let Some(inflight) = &state.inflight {
                debug!("configuration load already in flight; joining");
                inflight.clone()
            } else {
                if let (Some(value), Some(fetched_at)) = (&state.value, state.fetched_at) {
                    if Instant::now().duration_since(fetched_at) <= CONFIG_FETCH_INTERVAL {
                        return Ok(Arc::clone(value));
                    }
                }

                let load = Self::fetch_and_apply(Arc::clone(&self.inner)).boxed().shared();
                state.inflight = Some(load.clone());
                load
            }
        };

        shared.await
    }

    /// The last good value, if any, without triggering a fetch.
    pub async fn latest(&self) -> Option<Arc<PlayerConfig>> {
        self.inner.state.lock().await.value.clone()
    }

    /// Drop the cached value so the next [`load`](Self::load) refetches.
    ///
    /// An in-flight load is left to complete; its result repopulates the
    /// cache as usual.
    pub async fn invalidate(&self) {
        let mut state = self.inner.state.lock().await;
        state.value = None;
        state.fetched_at = None;
    }

    async fn fetch_and_apply(inner: Arc<CacheInner<F>>) -> Result<Arc<PlayerConfig>, ConfigError> {
        let started_at = Instant::now();
        let result = inner.fetcher.fetch().await;

        let mut state = inner.state.lock().await;
        state.inflight = None;

        match result {
            Ok(config) => {
                let config = Arc::new(config);
                state.value = Some(Arc::clone(&config));
                state.fetched_at = Some(started_at);
                debug!("configuration refreshed");
                Ok(config)
            }
            Err(err) => match &state.value {
                Some(stale) => {
                    warn!(error = %err, "configuration refresh failed; keeping last good value");
                    Ok(Arc::clone(stale))
                }
                None => Err(err),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    fn config(endpoint: &str) -> PlayerConfig {
        PlayerConfig {
            api_endpoint: Url::parse(endpoint).unwrap(),
            data_strategy: DataStrategy::default(),
            extra: serde_json::Map::new(),
        }
    }

    struct ScriptedFetcher {
        calls: AtomicUsize,
        fail: AtomicBool,
        delay: Duration,
    }

    impl ScriptedFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay: Duration::from_millis(50),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ConfigFetcher for Arc<ScriptedFetcher> {
        async fn fetch(&self) -> Result<PlayerConfig, ConfigError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                Err(ConfigError::Fetch {
                    message: "connection refused".into(),
                })
            } else {
                Ok(config("https://display.example.com/api/"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_loads_share_one_fetch() {
        let fetcher = ScriptedFetcher::new();
        let cache = ConfigCache::new(Arc::clone(&fetcher));

        let loads: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.load().await })
            })
            .collect();
        for load in loads {
            let result = load.await.unwrap().unwrap();
            assert_eq!(result.api_endpoint.host_str(), Some("display.example.com"));
        }

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_window_returns_cached_value() {
        let fetcher = ScriptedFetcher::new();
        let cache = ConfigCache::new(Arc::clone(&fetcher));

        cache.load().await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        cache.load().await.unwrap();

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_window_refetches() {
        let fetcher = ScriptedFetcher::new();
        let cache = ConfigCache::new(Arc::clone(&fetcher));

        cache.load().await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        cache.load().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_falls_back_to_stale_value() {
        let fetcher = ScriptedFetcher::new();
        let cache = ConfigCache::new(Arc::clone(&fetcher));

        let first = cache.load().await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;

        fetcher.fail.store(true, Ordering::SeqCst);
        let second = cache.load().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(first.api_endpoint, second.api_endpoint);
    }

    #[tokio::test(start_paused = true)]
    async fn first_load_failure_propagates_then_clears() {
        let fetcher = ScriptedFetcher::new();
        let cache = ConfigCache::new(Arc::clone(&fetcher));

        fetcher.fail.store(true, Ordering::SeqCst);
        let err = cache.load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Fetch { .. }));

        // The in-flight marker is cleared, so a later call may retry.
        fetcher.fail.store(false, Ordering::SeqCst);
        cache.load().await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_refetch() {
        let fetcher = ScriptedFetcher::new();
        let cache = ConfigCache::new(Arc::clone(&fetcher));

        cache.load().await.unwrap();
        cache.invalidate().await;
        cache.load().await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }
}

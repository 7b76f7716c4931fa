//! The `ExternalReasoner` seam: a prompt-in, text-out collaborator with its
//! own timeout/retry budget, plus an optional per-prompt response cache.

use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A reasoning backend: a function from (system instructions, prompt) to
/// text, enforcing its own timeout.
#[async_trait]
pub trait ExternalReasoner: Send + Sync {
    async fn think(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Run `operation` with exponential backoff, bounded by `config.timeout`
/// on every individual attempt. Retries transient failures (the operation
/// returning `Err`); the caller is expected to classify permanent
/// failures (malformed/auth) by not retrying at a higher layer if needed.
pub async fn with_retry<F, Fut>(config: &RetryConfig, label: &str, operation: F) -> anyhow::Result<String>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<String>>,
{
    let mut delay = config.initial_delay;
    let mut last_error = None;

    for attempt in 1..=config.max_attempts {
        match tokio::time::timeout(config.timeout, operation()).await {
            Ok(Ok(response)) => {
                if attempt > 1 {
                    tracing::info!("{label} succeeded on attempt {attempt}");
                }
                return Ok(response);
            }
            Ok(Err(e)) => {
                tracing::warn!("{label} failed on attempt {attempt}/{}: {e}", config.max_attempts);
                last_error = Some(e.to_string());
            }
            Err(_) => {
                tracing::warn!(
                    "{label} timed out after {:?} on attempt {attempt}/{}",
                    config.timeout,
                    config.max_attempts
                );
                last_error = Some(format!("timed out after {:?}", config.timeout));
            }
        }

        if attempt < config.max_attempts {
            tokio::time::sleep(delay).await;
            delay = Duration::from_secs_f64(
                (delay.as_secs_f64() * config.backoff_factor).min(config.max_delay.as_secs_f64()),
            );
        }
    }

    anyhow::bail!(
        "{label}: all {} retry attempts exhausted. Last error: {}",
        config.max_attempts,
        last_error.unwrap_or_else(|| "unknown".to_string())
    )
}

fn prompt_key(system: &str, prompt: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    system.hash(&mut hasher);
    prompt.hash(&mut hasher);
    hasher.finish()
}

/// Small mutex-guarded cache of recent (system, prompt) -> response pairs,
/// used to avoid re-querying the reasoner for an identical think cycle
/// within the TTL window.
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<u64, (Instant, String)>>,
}

impl ResponseCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, system: &str, prompt: &str) -> Option<String> {
        let key = prompt_key(system, prompt);
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&key) {
            Some((stamped, response)) if stamped.elapsed() < self.ttl => Some(response.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, system: &str, prompt: &str, response: String) {
        let key = prompt_key(system, prompt);
        self.entries.lock().unwrap().insert(key, (Instant::now(), response));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_without_retry_on_first_success() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            timeout: Duration::from_secs(1),
        };
        let result = with_retry(&config, "test", || async { Ok("ok".to_string()) }).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let config = RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            timeout: Duration::from_secs(1),
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result = with_retry(&config, "test", move || {
            let attempts = attempts_clone.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 1 {
                    anyhow::bail!("transient failure");
                }
                Ok("recovered".to_string())
            }
        })
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausts_retries_and_reports_last_error() {
        let config = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
            timeout: Duration::from_secs(1),
        };
        let result = with_retry(&config, "test", || async { anyhow::bail!("always fails") }).await;
        assert!(result.is_err());
    }

    #[test]
    fn cache_returns_none_before_any_put() {
        let cache = ResponseCache::new(60);
        assert!(cache.get("sys", "prompt").is_none());
    }

    #[test]
    fn cache_round_trips_within_ttl() {
        let cache = ResponseCache::new(60);
        cache.put("sys", "prompt", "response".to_string());
        assert_eq!(cache.get("sys", "prompt"), Some("response".to_string()));
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub reasoner: ReasonerConfig,
    pub memory: MemoryConfig,
    pub rate_limit: RateLimitConfig,
    pub maintenance: MaintenanceConfig,
    pub brain: BrainConfig,
}

impl CoreConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: CoreConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults with
    /// env overrides applied.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REASONER_MODEL") {
            self.reasoner.model = v;
        }
        if let Ok(v) = std::env::var("REASONER_BASE_URL") {
            self.reasoner.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("REX_LOCAL_ONLY") {
            self.reasoner.local_only = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("REX_DB_PATH") {
            self.memory.db_path = v;
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    pub model: String,
    pub base_url: Option<String>,
    /// When true, the remote reasoner is never consulted and every think
    /// cycle falls back to the local behavior tree.
    pub local_only: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_secs: f64,
    pub max_backoff_secs: f64,
    pub backoff_factor: f64,
    pub response_cache_ttl_secs: u64,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            model: "claude-4-5-sonnet-20250929".to_string(),
            base_url: None,
            local_only: false,
            timeout_secs: 30,
            max_retries: 3,
            initial_backoff_secs: 1.0,
            max_backoff_secs: 30.0,
            backoff_factor: 2.0,
            response_cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub db_path: String,
    pub personality_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: "rex.db".to_string(),
            personality_path: "personality.toml".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_calls_per_minute: u32,
    pub min_interval_secs: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls_per_minute: 5,
            min_interval_secs: 30.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub interval_hours: f64,
    pub initial_delay_minutes: f64,
    pub busy_retry_minutes: f64,
    pub max_memories: usize,
    pub min_importance: f32,
    pub decay_rate_per_day: f32,
    pub decay_tolerance: f32,
    pub access_protection_days: i64,
    pub consolidation_batch_size: usize,
    pub consolidation_delay_secs: f64,
    pub face_distance_threshold: f32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_hours: 6.0,
            initial_delay_minutes: 5.0,
            busy_retry_minutes: 5.0,
            max_memories: 500,
            min_importance: 0.2,
            decay_rate_per_day: 0.01,
            decay_tolerance: 0.001,
            access_protection_days: 7,
            consolidation_batch_size: 20,
            consolidation_delay_secs: 1.0,
            face_distance_threshold: 0.4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Main loop tick period; defaults to 10 Hz (0.1 s).
    pub tick_interval_secs: f64,
    pub observation_queue_capacity: usize,
    pub greeting_cooldown_secs: i64,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 0.1,
            observation_queue_capacity: 100,
            greeting_cooldown_secs: 60,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.rate_limit.max_calls_per_minute, 5);
        assert_eq!(cfg.maintenance.max_memories, 500);
        assert!(!cfg.reasoner.local_only);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[reasoner]
model = "claude-4-5-haiku"
"#;
        let cfg: CoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.reasoner.model, "claude-4-5-haiku");
        // Defaults for unspecified fields
        assert_eq!(cfg.reasoner.max_retries, 3);
        assert_eq!(cfg.memory.db_path, "rex.db");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[reasoner]
model = "gpt-4"
base_url = "https://api.example.com/v1"
local_only = true
timeout_secs = 15
max_retries = 5

[memory]
db_path = "data/rex.db"
personality_path = "data/personality.toml"

[rate_limit]
max_calls_per_minute = 10
min_interval_secs = 10.0

[maintenance]
max_memories = 1000
min_importance = 0.1

[brain]
tick_interval_secs = 1
observation_queue_capacity = 32
"#;
        let cfg: CoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.reasoner.model, "gpt-4");
        assert!(cfg.reasoner.local_only);
        assert_eq!(cfg.memory.db_path, "data/rex.db");
        assert_eq!(cfg.rate_limit.max_calls_per_minute, 10);
        assert_eq!(cfg.maintenance.max_memories, 1000);
        assert_eq!(cfg.brain.tick_interval_secs, 1);
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        std::env::set_var("REASONER_MODEL", "local-test-model");
        std::env::set_var("REX_LOCAL_ONLY", "true");

        let mut cfg = CoreConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.reasoner.model, "local-test-model");
        assert!(cfg.reasoner.local_only);

        std::env::remove_var("REASONER_MODEL");
        std::env::remove_var("REX_LOCAL_ONLY");

        let cfg = CoreConfig::load_or_default("/nonexistent/path.toml");
        assert_eq!(cfg.memory.db_path, "rex.db");
    }
}

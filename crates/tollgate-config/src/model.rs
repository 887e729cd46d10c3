// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tollgate dispatch layer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tollgate_core::{ClassificationLevel, Tier};

/// Top-level Tollgate configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TollgateConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Classification defaults and cloud policy.
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Cost ledger persistence settings.
    #[serde(default)]
    pub cost: CostConfig,

    /// Session idle timeout and autosave settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Local (on-box) inference backend.
    #[serde(default)]
    pub local: LocalConfig,

    /// Cloud inference backend.
    #[serde(default)]
    pub cloud: CloudConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in logs and the shell prompt.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "tollgate".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Classification defaults and deployment-wide cloud policy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationConfig {
    /// Level applied to queries that carry no explicit marking.
    #[serde(default)]
    pub default_level: ClassificationLevel,

    /// Never route to a cloud tier, whatever the classification.
    #[serde(default)]
    pub paranoid: bool,

    /// Most capable tier any query may use. `None` means no cap.
    #[serde(default)]
    pub max_tier: Option<Tier>,
}

/// Result cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Enable the result cache.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Lifetime of a cached answer in seconds. Zero keeps entries until invalidated.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Allow near-duplicate queries to reuse a cached answer.
    #[serde(default = "default_semantic_enabled")]
    pub semantic_enabled: bool,

    /// Minimum token-set similarity for a semantic hit, in (0, 1].
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,

    /// Maximum number of entries held in memory.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
            semantic_enabled: default_semantic_enabled(),
            semantic_threshold: default_semantic_threshold(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}

fn default_semantic_enabled() -> bool {
    true
}

fn default_semantic_threshold() -> f64 {
    0.92
}

fn default_max_entries() -> usize {
    10_000
}

/// Cost ledger persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CostConfig {
    /// How often the live session record and pending audit events are flushed.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Persisted session records older than this are purged at startup. Zero disables.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_flush_interval_secs() -> u64 {
    60
}

fn default_retention_days() -> u32 {
    90
}

/// What renewed activity does to an expired session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Expired is terminal. The caller ends the session and starts a new one.
    #[default]
    Terminate,
    /// Activity after expiry reactivates the same session.
    Resume,
}

/// Session idle timeout and autosave configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Idle time after which the session expires.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long before expiry the warning fires.
    #[serde(default = "default_warning_lead_secs")]
    pub warning_lead_secs: u64,

    /// Save dirty session state periodically.
    #[serde(default = "default_autosave_enabled")]
    pub autosave_enabled: bool,

    /// Minimum time between autosaves.
    #[serde(default = "default_autosave_interval_secs")]
    pub autosave_interval_secs: u64,

    /// Tick period for the lifetime check, in milliseconds.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Whether activity may revive an expired session.
    #[serde(default)]
    pub expiry_policy: ExpiryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            warning_lead_secs: default_warning_lead_secs(),
            autosave_enabled: default_autosave_enabled(),
            autosave_interval_secs: default_autosave_interval_secs(),
            check_interval_ms: default_check_interval_ms(),
            expiry_policy: ExpiryPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn warning_lead(&self) -> Duration {
        Duration::from_secs(self.warning_lead_secs)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

fn default_timeout_secs() -> u64 {
    15 * 60
}

fn default_warning_lead_secs() -> u64 {
    2 * 60
}

fn default_autosave_enabled() -> bool {
    true
}

fn default_autosave_interval_secs() -> u64 {
    30
}

fn default_check_interval_ms() -> u64 {
    1000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tollgate").join("tollgate.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tollgate.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Local inference backend (Ollama-compatible).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LocalConfig {
    /// Base URL of the local inference server.
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    /// Model name served for the local tier.
    #[serde(default = "default_local_model")]
    pub model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_local_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_base_url(),
            model: default_local_model(),
            timeout_secs: default_local_timeout_secs(),
        }
    }
}

fn default_local_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_local_model() -> String {
    "qwen2.5-coder:7b".to_string()
}

fn default_local_timeout_secs() -> u64 {
    120
}

/// Cloud inference backend (Anthropic Messages API).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CloudConfig {
    /// API key. `None` falls back to the `ANTHROPIC_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// API version header value.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Model served for the cloud-fast tier.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Model served for the cloud-balanced tier.
    #[serde(default = "default_balanced_model")]
    pub balanced_model: String,

    /// Model served for the cloud-best tier.
    #[serde(default = "default_best_model")]
    pub best_model: String,

    /// Maximum output tokens per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_version: default_api_version(),
            fast_model: default_fast_model(),
            balanced_model: default_balanced_model(),
            best_model: default_best_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl CloudConfig {
    /// Model configured for a cloud tier. `None` for local tiers.
    pub fn model_for(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::CloudFast => Some(&self.fast_model),
            Tier::CloudBalanced => Some(&self.balanced_model),
            Tier::CloudBest => Some(&self.best_model),
            Tier::Cache | Tier::Local => None,
        }
    }
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_fast_model() -> String {
    "claude-3-5-haiku-20241022".to_string()
}

fn default_balanced_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_best_model() -> String {
    "claude-opus-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

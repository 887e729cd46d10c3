// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks relationships serde cannot express, such as the warning lead being
//! shorter than the timeout it warns about.

use tollgate_core::Tier;

use crate::diagnostic::ConfigError;
use crate::model::TollgateConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &TollgateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        fail(format!(
            "agent.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.agent.log_level
        ));
    }

    if config.classification.max_tier == Some(Tier::Cache) {
        fail("classification.max_tier cannot be `cache`: no backend executes on it".to_string());
    }

    let session = &config.session;
    if session.timeout_secs == 0 {
        fail("session.timeout_secs must be greater than zero".to_string());
    } else if session.warning_lead_secs >= session.timeout_secs {
        fail(format!(
            "session.warning_lead_secs ({}) must be less than session.timeout_secs ({})",
            session.warning_lead_secs, session.timeout_secs
        ));
    }

    if session.check_interval_ms == 0 {
        fail("session.check_interval_ms must be greater than zero".to_string());
    }

    if session.autosave_enabled && session.autosave_interval_secs == 0 {
        fail("session.autosave_interval_secs must be greater than zero when autosave is enabled".to_string());
    }

    let threshold = config.cache.semantic_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        fail(format!(
            "cache.semantic_threshold must be in (0, 1], got {threshold}"
        ));
    }

    if config.cache.max_entries == 0 {
        fail("cache.max_entries must be at least 1".to_string());
    }

    if config.cost.flush_interval_secs == 0 {
        fail("cost.flush_interval_secs must be greater than zero".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.local.base_url.trim().is_empty() {
        fail("local.base_url must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &TollgateConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        let config = TollgateConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn warning_lead_must_be_shorter_than_timeout() {
        let mut config = TollgateConfig::default();
        config.session.timeout_secs = 60;
        config.session.warning_lead_secs = 60;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("warning_lead_secs")));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = TollgateConfig::default();
        config.session.timeout_secs = 0;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("timeout_secs must be greater")));
    }

    #[test]
    fn semantic_threshold_range() {
        let mut config = TollgateConfig::default();
        config.cache.semantic_threshold = 0.0;
        assert!(messages(&config).iter().any(|m| m.contains("semantic_threshold")));

        config.cache.semantic_threshold = 1.0;
        assert!(validate_config(&config).is_ok());

        config.cache.semantic_threshold = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn cache_tier_cannot_be_the_cap() {
        let mut config = TollgateConfig::default();
        config.classification.max_tier = Some(Tier::Cache);
        assert!(messages(&config).iter().any(|m| m.contains("max_tier")));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = TollgateConfig::default();
        config.agent.log_level = "verbose".into();
        assert!(messages(&config).iter().any(|m| m.contains("log_level")));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = TollgateConfig::default();
        config.session.check_interval_ms = 0;
        config.cache.max_entries = 0;
        config.storage.database_path = "  ".into();
        assert_eq!(messages(&config).len(), 3);
    }
}

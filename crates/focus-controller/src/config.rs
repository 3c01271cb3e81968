//! Focus controller configuration.
//!
//! Configuration is loaded from environment variables. Values that are
//! absent fall back to defaults; values that are present but malformed
//! are rejected so a typo never silently changes bridge behaviour.

use crate::colibri::ColibriSettings;
use common::config::ObservabilityConfig;
use common::types::BridgeAddress;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default bound on every awaited bridge request, in milliseconds.
pub const DEFAULT_BRIDGE_REPLY_TIMEOUT_MS: u64 = 15_000;

/// Default focus instance ID prefix.
pub const DEFAULT_FOCUS_ID_PREFIX: &str = "focus";

/// Focus controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this focus instance.
    pub focus_id: String,

    /// How long allocate and source-update requests wait for the bridge.
    pub bridge_reply_timeout: Duration,

    /// Bridge preferred by the selector while it is operational.
    pub preferred_bridge: Option<BridgeAddress>,

    /// Last-N value stamped on allocated video channels.
    pub channel_last_n: Option<u32>,

    /// Adaptive last-N flag stamped on allocated video channels.
    pub adaptive_last_n: bool,

    /// Adaptive simulcast flag stamped on allocated video channels.
    pub adaptive_simulcast: bool,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bridge_reply_timeout_ms: u64 =
            parse_optional(vars, "FOCUS_BRIDGE_REPLY_TIMEOUT_MS")?
                .unwrap_or(DEFAULT_BRIDGE_REPLY_TIMEOUT_MS);
        if bridge_reply_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "FOCUS_BRIDGE_REPLY_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        let preferred_bridge = vars
            .get("FOCUS_PREFERRED_BRIDGE")
            .filter(|s| !s.is_empty())
            .map(|s| BridgeAddress::new(s.clone()));

        let channel_last_n = parse_optional(vars, "FOCUS_CHANNEL_LAST_N")?;
        let adaptive_last_n = parse_optional(vars, "FOCUS_ADAPTIVE_LAST_N")?.unwrap_or(false);
        let adaptive_simulcast =
            parse_optional(vars, "FOCUS_ADAPTIVE_SIMULCAST")?.unwrap_or(false);

        let observability = ObservabilityConfig::from_vars(vars)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        // Generate focus instance ID
        let focus_id = vars.get("FOCUS_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_FOCUS_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            focus_id,
            bridge_reply_timeout: Duration::from_millis(bridge_reply_timeout_ms),
            preferred_bridge,
            channel_last_n,
            adaptive_last_n,
            adaptive_simulcast,
            observability,
        })
    }

    /// Settings handed to every colibri conference created by this focus.
    #[must_use]
    pub fn colibri_settings(&self) -> ColibriSettings {
        ColibriSettings {
            reply_timeout: self.bridge_reply_timeout,
            channel_last_n: self.channel_last_n,
            adaptive_last_n: self.adaptive_last_n,
            adaptive_simulcast: self.adaptive_simulcast,
        }
    }
}

fn parse_optional<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    vars.get(key)
        .map(|raw| {
            raw.parse()
                .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw}")))
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config =
            Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(
            config.bridge_reply_timeout,
            Duration::from_millis(DEFAULT_BRIDGE_REPLY_TIMEOUT_MS)
        );
        assert_eq!(config.preferred_bridge, None);
        assert_eq!(config.channel_last_n, None);
        assert!(!config.adaptive_last_n);
        assert!(!config.adaptive_simulcast);
        assert_eq!(config.observability, ObservabilityConfig::default());
        // Focus ID should be auto-generated
        assert!(config.focus_id.starts_with("focus-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            ("FOCUS_ID".to_string(), "focus-custom-001".to_string()),
            (
                "FOCUS_BRIDGE_REPLY_TIMEOUT_MS".to_string(),
                "2500".to_string(),
            ),
            (
                "FOCUS_PREFERRED_BRIDGE".to_string(),
                "jvb1.example.com".to_string(),
            ),
            ("FOCUS_CHANNEL_LAST_N".to_string(), "5".to_string()),
            ("FOCUS_ADAPTIVE_LAST_N".to_string(), "true".to_string()),
            ("FOCUS_ADAPTIVE_SIMULCAST".to_string(), "true".to_string()),
            ("FOCUS_LOG_LEVEL".to_string(), "debug".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.focus_id, "focus-custom-001");
        assert_eq!(config.bridge_reply_timeout, Duration::from_millis(2500));
        assert_eq!(
            config.preferred_bridge,
            Some(BridgeAddress::new("jvb1.example.com"))
        );
        assert_eq!(config.channel_last_n, Some(5));
        assert!(config.adaptive_last_n);
        assert!(config.adaptive_simulcast);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let vars = HashMap::from([(
            "FOCUS_CHANNEL_LAST_N".to_string(),
            "many".to_string(),
        )]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(v)) if v == "FOCUS_CHANNEL_LAST_N=many")
        );
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let vars = HashMap::from([(
            "FOCUS_BRIDGE_REPLY_TIMEOUT_MS".to_string(),
            "0".to_string(),
        )]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_colibri_settings_projection() {
        let vars = HashMap::from([
            ("FOCUS_CHANNEL_LAST_N".to_string(), "3".to_string()),
            ("FOCUS_ADAPTIVE_SIMULCAST".to_string(), "true".to_string()),
        ]);
        let settings = Config::from_vars(&vars).unwrap().colibri_settings();

        assert_eq!(settings.channel_last_n, Some(3));
        assert!(settings.adaptive_simulcast);
        assert!(!settings.adaptive_last_n);
        assert_eq!(
            settings.reply_timeout,
            Duration::from_millis(DEFAULT_BRIDGE_REPLY_TIMEOUT_MS)
        );
    }
}

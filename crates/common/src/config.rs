//! Common configuration types for the conference focus components.

use crate::error::CommonError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default fallback log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is unset
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Load observability settings from a variable map.
    ///
    /// Reads `FOCUS_LOG_LEVEL` and `FOCUS_JSON_LOGS`.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::Configuration` if `FOCUS_JSON_LOGS` is not a boolean.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, CommonError> {
        let log_level = vars
            .get("FOCUS_LOG_LEVEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let json_logs = match vars.get("FOCUS_JSON_LOGS") {
            Some(value) => value.parse().map_err(|_| {
                CommonError::Configuration(format!("FOCUS_JSON_LOGS must be a boolean, got {value}"))
            })?,
            None => false,
        };

        Ok(Self {
            log_level,
            json_logs,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ObservabilityConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, ObservabilityConfig::default());
    }

    #[test]
    fn test_custom_values() {
        let vars = HashMap::from([
            ("FOCUS_LOG_LEVEL".to_string(), "debug".to_string()),
            ("FOCUS_JSON_LOGS".to_string(), "true".to_string()),
        ]);
        let config = ObservabilityConfig::from_vars(&vars).unwrap();
        assert_eq!(config.log_level, "debug");
        assert!(config.json_logs);
    }

    #[test]
    fn test_invalid_json_flag() {
        let vars = HashMap::from([("FOCUS_JSON_LOGS".to_string(), "yes".to_string())]);
        let result = ObservabilityConfig::from_vars(&vars);
        assert!(matches!(result, Err(CommonError::Configuration(_))));
    }
}

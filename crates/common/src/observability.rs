//! Tracing initialisation shared by every process embedding the focus.

use crate::config::ObservabilityConfig;
use crate::error::CommonError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config.log_level` is used as the filter.
/// JSON output is enabled with `config.json_logs` for log shippers.
///
/// # Errors
///
/// Returns `CommonError::Configuration` if a global subscriber is already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), CommonError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| CommonError::Configuration(format!("Failed to install tracing: {e}")))
}

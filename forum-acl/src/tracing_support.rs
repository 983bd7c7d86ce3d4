//! Tracing and logging support.
//!
//! Registries, the resolver, and the manifest watcher log through `tracing`.
//! This module installs a subscriber for applications that do not bring
//! their own.

pub use tracing::{self, debug, error, info, instrument, trace, warn};

#[cfg(feature = "tracing")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable format with colors (default for development).
    Pretty,

    /// Compact single-line format.
    Compact,

    /// JSON format (recommended for production).
    Json,
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter.
    ///
    /// If None, uses RUST_LOG environment variable or defaults to "info".
    pub level: Option<tracing::Level>,

    /// Output format.
    pub format: TracingFormat,

    /// Include timestamps in output.
    pub timestamps: bool,

    /// Include target module names in output.
    pub target: bool,

    /// Include thread IDs in output.
    pub thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Pretty,
            timestamps: true,
            target: true,
            thread_ids: false,
        }
    }
}

impl TracingConfig {
    /// JSON lines with thread ids, for log shippers
    pub fn production() -> Self {
        Self {
            format: TracingFormat::Json,
            thread_ids: true,
            ..Default::default()
        }
    }
}

/// Initialize tracing subscriber with default settings.
///
/// # Environment Variables
///
/// - `RUST_LOG=debug` - Also log unresolved-permission fallbacks
/// - `RUST_LOG=forum_acl_host=debug,info` - Per-module filtering
#[cfg(feature = "tracing")]
pub fn init_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize tracing subscriber with custom configuration.
///
/// # Example
///
/// ```ignore
/// use forum_acl::tracing_support::{init_subscriber_with_config, TracingConfig};
///
/// init_subscriber_with_config(TracingConfig::production());
/// ```
#[cfg(feature = "tracing")]
pub fn init_subscriber_with_config(config: TracingConfig) {
    let filter = match config.level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.target)
        .with_thread_ids(config.thread_ids);
    let registry = tracing_subscriber::registry().with(filter);

    match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => registry.with(layer.pretty()).init(),
        (TracingFormat::Pretty, false) => registry.with(layer.pretty().without_time()).init(),
        (TracingFormat::Compact, true) => registry.with(layer.compact()).init(),
        (TracingFormat::Compact, false) => registry.with(layer.compact().without_time()).init(),
        (TracingFormat::Json, true) => registry.with(layer.json()).init(),
        (TracingFormat::Json, false) => registry.with(layer.json().without_time()).init(),
    }
}

// Fallback when tracing feature is disabled
#[cfg(not(feature = "tracing"))]
pub fn init_subscriber() {}

#[cfg(not(feature = "tracing"))]
pub fn init_subscriber_with_config(_config: TracingConfig) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.format, TracingFormat::Pretty);
        assert!(config.timestamps);
        assert!(config.target);
        assert!(!config.thread_ids);
    }

    #[test]
    fn test_production_config() {
        let config = TracingConfig::production();
        assert_eq!(config.format, TracingFormat::Json);
        assert!(config.thread_ids);
        assert!(config.level.is_none());
    }
}

//! Service configuration
//!
//! Configuration can come from a JSON file, from [`AclConfigBuilder`], or
//! from one of the [`AclPresets`].
//!
//! ```json
//! {
//!   "app_name": "forum",
//!   "manifest_dirs": ["/var/lib/forum/plugins"],
//!   "watch": true,
//!   "debounce_ms": 250,
//!   "audit": { "kind": "file", "path": "/var/log/forum/permissions.jsonl" }
//! }
//! ```

use forum_acl_host::audit::{AuditSink, FileAuditSink, MemoryAuditSink, NullAuditSink};
use forum_acl_host::discovery::default_manifest_dirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_APP_NAME: &str = "forum";

/// Error type for configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to open audit log: {0}")]
    Audit(#[from] forum_acl_host::audit::AuditError),
}

/// Where audit events go
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AuditConfig {
    /// Discard audit events
    #[default]
    Null,
    /// Keep the most recent events in memory
    Memory { capacity: usize },
    /// Append JSON lines to a file
    File { path: PathBuf },
}

impl AuditConfig {
    /// Build the configured sink
    pub fn build_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        Ok(match self {
            Self::Null => Arc::new(NullAuditSink),
            Self::Memory { capacity } => Arc::new(MemoryAuditSink::with_capacity(*capacity)),
            Self::File { path } => Arc::new(FileAuditSink::new(path)?),
        })
    }
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclConfig {
    /// Application name, used for default directories
    pub app_name: String,

    /// Directories scanned for plugin permission manifests.
    /// Empty means the platform defaults for `app_name`.
    pub manifest_dirs: Vec<PathBuf>,

    /// Register manifests already present at startup
    pub load_existing: bool,

    /// Keep watching manifest directories for changes
    pub watch: bool,

    /// Debounce for file events, in milliseconds
    pub debounce_ms: u64,

    pub audit: AuditConfig,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            manifest_dirs: Vec::new(),
            load_existing: true,
            watch: false,
            debounce_ms: 500,
            audit: AuditConfig::default(),
        }
    }
}

impl AclConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Manifest directories with defaults applied
    pub fn effective_manifest_dirs(&self) -> Vec<PathBuf> {
        if self.manifest_dirs.is_empty() {
            default_manifest_dirs(&self.app_name)
        } else {
            self.manifest_dirs.clone()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Builder for service configurations
#[derive(Debug, Clone, Default)]
pub struct AclConfigBuilder {
    config: AclConfig,
}

impl AclConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name (used for default paths)
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = name.into();
        self
    }

    /// Add a manifest directory
    pub fn manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.manifest_dirs.push(dir.into());
        self
    }

    pub fn load_existing(mut self, load: bool) -> Self {
        self.config.load_existing = load;
        self
    }

    /// Watch manifest directories with the given debounce
    pub fn watch(mut self, debounce: Duration) -> Self {
        self.config.watch = true;
        self.config.debounce_ms = debounce.as_millis() as u64;
        self
    }

    pub fn audit(mut self, audit: AuditConfig) -> Self {
        self.config.audit = audit;
        self
    }

    pub fn build(self) -> AclConfig {
        self.config
    }
}

/// Pre-configured setups for common use cases
pub struct AclPresets;

impl AclPresets {
    /// No manifest directories, in-memory audit
    pub fn testing() -> AclConfig {
        AclConfig {
            app_name: "forum-test".to_string(),
            manifest_dirs: Vec::new(),
            load_existing: false,
            watch: false,
            debounce_ms: 50,
            audit: AuditConfig::Memory { capacity: 1000 },
        }
    }

    /// Watch the default directories and audit to a file
    pub fn production(app_name: &str, audit_log: impl Into<PathBuf>) -> AclConfig {
        AclConfigBuilder::new()
            .app_name(app_name)
            .watch(Duration::from_millis(500))
            .audit(AuditConfig::File {
                path: audit_log.into(),
            })
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AclConfig::default();
        assert_eq!(config.app_name, "forum");
        assert!(config.load_existing);
        assert!(!config.watch);
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert!(!config.effective_manifest_dirs().is_empty());
    }

    #[test]
    fn test_from_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acl.json");
        std::fs::write(
            &path,
            r#"{"manifest_dirs":["/srv/plugins"],"watch":true,"audit":{"kind":"memory","capacity":10}}"#,
        )
        .unwrap();

        let config = AclConfig::from_file(&path).unwrap();
        assert_eq!(config.app_name, "forum");
        assert!(config.watch);
        assert_eq!(
            config.effective_manifest_dirs(),
            vec![PathBuf::from("/srv/plugins")]
        );
        assert_eq!(config.audit, AuditConfig::Memory { capacity: 10 });
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AclConfig::from_file(dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"audit":{"kind":"carrier-pigeon"}}"#).unwrap();
        assert!(matches!(
            AclConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_builder_and_presets() {
        let config = AclConfigBuilder::new()
            .app_name("board")
            .manifest_dir("plugins")
            .watch(Duration::from_millis(100))
            .build();
        assert_eq!(config.app_name, "board");
        assert!(config.watch);
        assert_eq!(config.debounce_ms, 100);

        let testing = AclPresets::testing();
        assert!(!testing.load_existing);

        let production = AclPresets::production("board", "/var/log/board/acl.jsonl");
        assert!(production.watch);
        assert!(matches!(production.audit, AuditConfig::File { .. }));
    }

    #[test]
    fn test_build_sink() {
        let dir = tempfile::tempdir().unwrap();
        let file = AuditConfig::File {
            path: dir.path().join("audit.jsonl"),
        };
        assert!(file.build_sink().unwrap().is_healthy());
        assert!(AuditConfig::Null.build_sink().is_ok());
    }
}

//! Manifest discovery and directory scanning
//!
//! Plugins ship their permission sets as manifest files next to the plugin:
//! `<name>.perm.json` (JSON) or `<name>.perm.msgpack` (MessagePack).

use forum_acl_api::{PermissionError, PluginPermissionSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

const JSON_SUFFIX: &str = ".perm.json";
const MSGPACK_SUFFIX: &str = ".perm.msgpack";

/// Errors that can occur during manifest discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read directory: {0}")]
    ReadDirectory(#[source] std::io::Error),

    #[error("Failed to read manifest {path}: {source}")]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {source}")]
    InvalidManifest {
        path: PathBuf,
        #[source]
        source: PermissionError,
    },

    #[error("Not a permission manifest: {0}")]
    UnknownFormat(PathBuf),
}

/// On-disk manifest encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    MessagePack,
}

impl ManifestFormat {
    /// Detect the format from a file name
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(JSON_SUFFIX) {
            Some(Self::Json)
        } else if name.ends_with(MSGPACK_SUFFIX) {
            Some(Self::MessagePack)
        } else {
            None
        }
    }
}

/// Whether `path` looks like a permission manifest
pub fn is_manifest_file(path: &Path) -> bool {
    ManifestFormat::from_path(path).is_some()
}

/// Read and decode a single manifest file
pub fn load_manifest(path: &Path) -> Result<PluginPermissionSet, DiscoveryError> {
    let format =
        ManifestFormat::from_path(path).ok_or_else(|| DiscoveryError::UnknownFormat(path.into()))?;

    let bytes = std::fs::read(path).map_err(|source| DiscoveryError::ReadManifest {
        path: path.to_path_buf(),
        source,
    })?;

    let decoded = match format {
        ManifestFormat::Json => std::str::from_utf8(&bytes)
            .map_err(|e| PermissionError::Decode(e.to_string()))
            .and_then(PluginPermissionSet::from_json),
        ManifestFormat::MessagePack => PluginPermissionSet::from_msgpack(&bytes),
    };

    decoded.map_err(|source| DiscoveryError::InvalidManifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Result of manifest discovery
#[derive(Debug, Default)]
pub struct DiscoveryResult {
    /// Successfully decoded manifests with their source files
    pub manifests: Vec<(PathBuf, PluginPermissionSet)>,

    /// Manifests that failed to load (with errors)
    pub failures: Vec<(PathBuf, DiscoveryError)>,
}

impl DiscoveryResult {
    /// Returns true if all manifests loaded successfully
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of manifest files found
    pub fn total_found(&self) -> usize {
        self.manifests.len() + self.failures.len()
    }
}

/// Manifest directory scanner
///
/// Every decoded manifest is validated, so a scan only returns sets the
/// plugin registry can accept on their own.
#[derive(Debug, Clone, Default)]
pub struct ManifestScanner;

impl ManifestScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan a directory for manifest files
    pub fn scan_directory(&self, dir: impl AsRef<Path>) -> Result<DiscoveryResult, DiscoveryError> {
        let dir = dir.as_ref();

        if !dir.is_dir() {
            return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
        }

        let entries = std::fs::read_dir(dir).map_err(DiscoveryError::ReadDirectory)?;

        let mut paths = Vec::new();
        let mut result = DiscoveryResult::default();

        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_manifest_file(&path) {
                        paths.push(path);
                    }
                }
                Err(e) => result
                    .failures
                    .push((dir.to_path_buf(), DiscoveryError::ReadDirectory(e))),
            }
        }

        // Directory iteration order is platform dependent
        paths.sort();

        for path in paths {
            match self.load(&path) {
                Ok(set) => result.manifests.push((path, set)),
                Err(e) => result.failures.push((path, e)),
            }
        }

        Ok(result)
    }

    /// Scan multiple directories
    pub fn scan_directories(
        &self,
        dirs: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> DiscoveryResult {
        let mut all = DiscoveryResult::default();

        for dir in dirs {
            match self.scan_directory(dir.as_ref()) {
                Ok(result) => {
                    all.manifests.extend(result.manifests);
                    all.failures.extend(result.failures);
                }
                Err(e) => all.failures.push((dir.as_ref().to_path_buf(), e)),
            }
        }

        all
    }

    fn load(&self, path: &Path) -> Result<PluginPermissionSet, DiscoveryError> {
        let set = load_manifest(path)?;
        set.validate()
            .map_err(|source| DiscoveryError::InvalidManifest {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(set)
    }
}

/// Default manifest directories for an application
pub fn default_manifest_dirs(app_name: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Some(data_dir) = dirs::data_local_dir() {
        dirs.push(data_dir.join(app_name).join("plugins"));
    }

    dirs.push(PathBuf::from("plugins"));

    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn kudos() -> PluginPermissionSet {
        PluginPermissionSet::new("kudos").permission("KUDOS_GIVE", 1u32 << 24)
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ManifestFormat::from_path(Path::new("a/kudos.perm.json")),
            Some(ManifestFormat::Json)
        );
        assert_eq!(
            ManifestFormat::from_path(Path::new("kudos.perm.msgpack")),
            Some(ManifestFormat::MessagePack)
        );
        assert!(!is_manifest_file(Path::new("kudos.json")));
        assert!(!is_manifest_file(Path::new("kudos.jar")));
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp = TempDir::new().unwrap();
        let result = ManifestScanner::new().scan_directory(temp.path()).unwrap();
        assert!(result.manifests.is_empty());
        assert!(result.is_success());
    }

    #[test]
    fn test_scan_nonexistent_directory() {
        let result = ManifestScanner::new().scan_directory("/nonexistent/path/to/plugins");
        assert!(matches!(result, Err(DiscoveryError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_scan_both_formats() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("kudos.perm.json"),
            kudos().to_json_pretty().unwrap(),
        )
        .unwrap();
        let poll = PluginPermissionSet::new("poll").permission("POLL_VOTE", 1u32 << 26);
        fs::write(
            temp.path().join("poll.perm.msgpack"),
            poll.to_msgpack().unwrap(),
        )
        .unwrap();
        fs::write(temp.path().join("readme.txt"), "ignored").unwrap();

        let result = ManifestScanner::new().scan_directory(temp.path()).unwrap();
        assert!(result.is_success());
        assert_eq!(result.total_found(), 2);
        let plugins: Vec<&str> = result
            .manifests
            .iter()
            .map(|(_, set)| set.plugin.as_str())
            .collect();
        assert_eq!(plugins, vec!["kudos", "poll"]);
    }

    #[test]
    fn test_scan_records_invalid_manifests() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("broken.perm.json"), "{not json").unwrap();
        let zero = PluginPermissionSet::new("zero").permission("ZERO", 0u32);
        fs::write(
            temp.path().join("zero.perm.json"),
            zero.to_json_pretty().unwrap(),
        )
        .unwrap();

        let result = ManifestScanner::new().scan_directory(temp.path()).unwrap();
        assert!(result.manifests.is_empty());
        assert_eq!(result.failures.len(), 2);
        assert!(result
            .failures
            .iter()
            .any(|(_, e)| matches!(e, DiscoveryError::InvalidManifest { .. })));
    }

    #[test]
    fn test_scan_directories_collects_missing() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("kudos.perm.json"),
            kudos().to_json_pretty().unwrap(),
        )
        .unwrap();

        let result = ManifestScanner::new()
            .scan_directories(vec![temp.path().to_path_buf(), PathBuf::from("/nonexistent")]);
        assert_eq!(result.manifests.len(), 1);
        assert_eq!(result.failures.len(), 1);
    }

    #[test]
    fn test_default_manifest_dirs() {
        let dirs = default_manifest_dirs("forum");
        assert!(dirs.iter().any(|d| d.ends_with("plugins")));
    }
}

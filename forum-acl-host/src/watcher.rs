//! Hot reload watcher for plugin permission manifests
//!
//! Watches manifest directories and turns file changes into lifecycle events:
//! a created or modified manifest enables its plugin, a deleted manifest
//! disables the plugin it had enabled.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::discovery::{is_manifest_file, load_manifest, ManifestScanner};
use crate::lifecycle::{LifecycleHandler, PluginEvent};

/// Configuration for the manifest watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for file events
    pub debounce: Duration,
    /// Whether to register existing manifests on start
    pub load_existing: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            load_existing: true,
        }
    }
}

/// Hot reload watcher for manifest directories
pub struct ManifestWatcher {
    handler: Arc<LifecycleHandler>,
    _watcher: RecommendedWatcher,
    shutdown_tx: mpsc::Sender<()>,
}

impl ManifestWatcher {
    /// Start watching the given directories
    pub async fn new(
        handler: Arc<LifecycleHandler>,
        directories: impl IntoIterator<Item = impl AsRef<Path>>,
        config: WatcherConfig,
    ) -> Result<Self, WatcherError> {
        let directories: Vec<PathBuf> = directories
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();

        // Which plugin each manifest file registered, for deletions
        let mut sources = if config.load_existing {
            register_existing(&handler, directories.iter().filter(|d| d.is_dir()))
        } else {
            HashMap::new()
        };

        let (event_tx, mut event_rx) = mpsc::channel::<Event>(100);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = event_tx.blocking_send(event);
            }
        })
        .map_err(WatcherError::WatcherInit)?;

        for dir in &directories {
            if dir.exists() {
                watcher
                    .watch(dir, RecursiveMode::NonRecursive)
                    .map_err(WatcherError::WatcherInit)?;
                tracing::info!(dir = %dir.display(), "Watching directory for permission manifests");
            } else {
                tracing::warn!(dir = %dir.display(), "Directory does not exist, skipping");
            }
        }

        let task_handler = Arc::clone(&handler);
        let debounce = config.debounce;
        tokio::spawn(async move {
            let mut pending: Vec<PathBuf> = Vec::new();
            let mut deadline: Option<tokio::time::Instant> = None;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Manifest watcher shutting down");
                        break;
                    }

                    Some(event) = event_rx.recv() => {
                        for path in event.paths {
                            if is_manifest_file(&path) {
                                if !pending.contains(&path) {
                                    pending.push(path);
                                }
                                deadline = Some(tokio::time::Instant::now() + debounce);
                            }
                        }
                    }

                    _ = async {
                        match deadline {
                            Some(deadline) => tokio::time::sleep_until(deadline).await,
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        for path in pending.drain(..) {
                            handle_file_change(&task_handler, &mut sources, &path);
                        }
                        deadline = None;
                    }
                }
            }
        });

        Ok(Self {
            handler,
            _watcher: watcher,
            shutdown_tx,
        })
    }

    pub fn handler(&self) -> &LifecycleHandler {
        &self.handler
    }

    /// Stop the watcher task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Register every valid manifest found in `dirs`.
///
/// Returns the plugin each manifest file registered.
pub fn register_existing(
    handler: &LifecycleHandler,
    dirs: impl IntoIterator<Item = impl AsRef<Path>>,
) -> HashMap<PathBuf, String> {
    let mut sources = HashMap::new();
    let result = ManifestScanner::new().scan_directories(dirs);

    for (path, error) in &result.failures {
        tracing::warn!(path = %path.display(), error = %error, "Failed to load permission manifest");
    }

    for (path, set) in result.manifests {
        let plugin = set.plugin.clone();
        match handler.handle(PluginEvent::Installed(set)) {
            Ok(_) => {
                tracing::info!(plugin = %plugin, path = %path.display(), "Loaded permission manifest");
                sources.insert(path, plugin);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to register permission manifest");
            }
        }
    }

    sources
}

fn handle_file_change(
    handler: &LifecycleHandler,
    sources: &mut HashMap<PathBuf, String>,
    path: &Path,
) {
    if !path.exists() {
        if let Some(plugin) = sources.remove(path) {
            retire_manifest(handler, sources, path, plugin);
        }
        return;
    }

    let set = match load_manifest(path) {
        Ok(set) => set,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to reload permission manifest");
            return;
        }
    };

    // The file now describes a different plugin; retire the old one first
    if let Some(previous) = sources.get(path) {
        if *previous != set.plugin {
            let previous = previous.clone();
            sources.remove(path);
            retire_manifest(handler, sources, path, previous);
        }
    }

    let plugin = set.plugin.clone();
    match handler.handle(PluginEvent::Enabled(set)) {
        Ok(change) => {
            tracing::info!(plugin = %plugin, path = %path.display(), effective = change.is_effective(), "Permission manifest reloaded");
            sources.insert(path.to_path_buf(), plugin);
        }
        Err(e) => {
            sources.remove(path);
            tracing::warn!(path = %path.display(), error = %e, "Failed to register permission manifest");
        }
    }
}

/// Drop `plugin` after `path` stopped declaring it.
///
/// Another manifest still on disk for the same plugin takes over instead.
fn retire_manifest(
    handler: &LifecycleHandler,
    sources: &mut HashMap<PathBuf, String>,
    path: &Path,
    plugin: String,
) {
    let mut fallbacks: Vec<PathBuf> = sources
        .iter()
        .filter(|(_, owner)| **owner == plugin)
        .map(|(other, _)| other.clone())
        .collect();
    fallbacks.sort();

    for other in fallbacks {
        let set = match load_manifest(&other) {
            Ok(set) if set.plugin == plugin => set,
            Ok(_) | Err(_) => {
                sources.remove(&other);
                continue;
            }
        };
        match handler.handle(PluginEvent::Enabled(set)) {
            Ok(_) => {
                tracing::info!(plugin = %plugin, path = %other.display(), replaced = %path.display(), "Plugin permissions taken over by another manifest");
                return;
            }
            Err(e) => {
                tracing::warn!(path = %other.display(), error = %e, "Failed to register permission manifest");
                sources.remove(&other);
            }
        }
    }

    let _ = handler.handle(PluginEvent::Disabled {
        plugin: plugin.clone(),
    });
    tracing::info!(plugin = %plugin, path = %path.display(), "Plugin permissions removed (manifest deleted)");
}

/// Errors that can occur during watching
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Failed to initialize watcher: {0}")]
    WatcherInit(#[source] notify::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NullAuditSink;
    use crate::registry::{PermissionSource, PluginRegistry};
    use forum_acl_api::{Mask, PluginPermissionSet};
    use std::fs;
    use tempfile::TempDir;

    fn kudos_json() -> String {
        PluginPermissionSet::new("kudos")
            .permission("KUDOS_GIVE", 1u32 << 24)
            .to_json_pretty()
            .unwrap()
    }

    fn handler() -> (Arc<LifecycleHandler>, PluginRegistry) {
        let registry = PluginRegistry::new();
        let handler = Arc::new(LifecycleHandler::new(
            registry.clone(),
            Arc::new(NullAuditSink),
        ));
        (handler, registry)
    }

    #[tokio::test]
    async fn test_watcher_loads_existing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("kudos.perm.json"), kudos_json()).unwrap();

        let (handler, registry) = handler();
        let _watcher = ManifestWatcher::new(handler, vec![temp.path()], WatcherConfig::default())
            .await
            .unwrap();

        assert!(registry.contains_plugin("kudos"));
    }

    #[tokio::test]
    async fn test_watcher_hot_reload() {
        let temp = TempDir::new().unwrap();

        let (handler, registry) = handler();
        let watcher = ManifestWatcher::new(
            handler,
            vec![temp.path()],
            WatcherConfig {
                debounce: Duration::from_millis(100),
                load_existing: true,
            },
        )
        .await
        .unwrap();

        assert!(!registry.contains_plugin("kudos"));

        let manifest = temp.path().join("kudos.perm.json");
        fs::write(&manifest, kudos_json()).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(registry.lookup_by_mask(Mask::new(1 << 24)).is_some());

        fs::remove_file(&manifest).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(registry.lookup_by_mask(Mask::new(1 << 24)).is_none());

        watcher.shutdown().await;
    }

    #[test]
    fn test_file_change_switching_plugin_id() {
        let temp = TempDir::new().unwrap();
        let (handler, registry) = handler();
        let mut sources = HashMap::new();

        let manifest = temp.path().join("thing.perm.json");
        fs::write(&manifest, kudos_json()).unwrap();
        handle_file_change(&handler, &mut sources, &manifest);
        assert!(registry.contains_plugin("kudos"));

        let poll = PluginPermissionSet::new("poll").permission("POLL_VOTE", 1u32 << 26);
        fs::write(&manifest, poll.to_json_pretty().unwrap()).unwrap();
        handle_file_change(&handler, &mut sources, &manifest);
        assert!(!registry.contains_plugin("kudos"));
        assert!(registry.contains_plugin("poll"));
        assert_eq!(sources.get(&manifest).map(String::as_str), Some("poll"));
    }

    #[test]
    fn test_deleting_one_of_two_manifests_keeps_plugin() {
        let temp = TempDir::new().unwrap();
        let (handler, registry) = handler();
        let mut sources = HashMap::new();

        let first = temp.path().join("a.perm.json");
        let second = temp.path().join("b.perm.json");
        fs::write(&first, kudos_json()).unwrap();
        let newer = PluginPermissionSet::new("kudos")
            .permission("KUDOS_GIVE", 1u32 << 24)
            .permission("KUDOS_REVOKE", 1u32 << 25);
        fs::write(&second, newer.to_json_pretty().unwrap()).unwrap();
        handle_file_change(&handler, &mut sources, &first);
        handle_file_change(&handler, &mut sources, &second);
        assert_eq!(registry.len(), 2);

        fs::remove_file(&second).unwrap();
        handle_file_change(&handler, &mut sources, &second);
        assert!(registry.contains_plugin("kudos"));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup_by_mask(Mask::new(1 << 25)).is_none());

        fs::remove_file(&first).unwrap();
        handle_file_change(&handler, &mut sources, &first);
        assert!(!registry.contains_plugin("kudos"));
        assert!(sources.is_empty());
    }
}

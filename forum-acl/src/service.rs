//! Service bootstrap
//!
//! [`AclService`] wires the built-in core registry, the plugin registry, the
//! audited lifecycle handler, and optionally the manifest watcher into one
//! handle that an application keeps for its lifetime.

use forum_acl_host::watcher::{register_existing, ManifestWatcher, WatcherConfig, WatcherError};
use forum_acl_host::{
    CoreRegistry, LifecycleHandler, PermissionResolver, PluginEvent, PluginRegistry,
    RegistryChange, RegistryError,
};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AclConfig, ConfigError};

/// Top-level error type
#[derive(Debug, Error)]
pub enum AclError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Running permission service
pub struct AclService {
    config: AclConfig,
    core: Arc<CoreRegistry>,
    plugins: PluginRegistry,
    resolver: PermissionResolver,
    lifecycle: Arc<LifecycleHandler>,
    watcher: Option<ManifestWatcher>,
}

impl AclService {
    /// Build registries, register existing manifests, and start watching if
    /// configured. Must be called within a tokio runtime when `watch` is set.
    pub async fn start(config: AclConfig) -> Result<Self, AclError> {
        let core = Arc::new(CoreRegistry::builtin());
        let plugins = PluginRegistry::new();
        let audit = config.audit.build_sink()?;
        let lifecycle = Arc::new(
            LifecycleHandler::new(plugins.clone(), audit).with_core(core.clone()),
        );
        let resolver = PermissionResolver::new(core.clone(), Arc::new(plugins.clone()));
        let dirs = config.effective_manifest_dirs();

        let watcher = if config.watch {
            let watcher_config = WatcherConfig {
                debounce: config.debounce(),
                load_existing: config.load_existing,
            };
            Some(ManifestWatcher::new(lifecycle.clone(), &dirs, watcher_config).await?)
        } else {
            if config.load_existing {
                register_existing(&lifecycle, dirs.iter().filter(|d| d.is_dir()));
            }
            None
        };

        tracing::info!(
            app = %config.app_name,
            core = core.len(),
            plugins = plugins.plugins().len(),
            watching = watcher.is_some(),
            "Permission service started"
        );

        Ok(Self {
            config,
            core,
            plugins,
            resolver,
            lifecycle,
            watcher,
        })
    }

    /// Resolver for the authorization layer. Cheap to clone.
    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn core(&self) -> &CoreRegistry {
        &self.core
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn lifecycle(&self) -> &LifecycleHandler {
        &self.lifecycle
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    /// Forward a plugin manager notification
    pub fn handle(&self, event: PluginEvent) -> Result<RegistryChange, AclError> {
        Ok(self.lifecycle.handle(event)?)
    }

    /// Stop watching and flush the audit trail
    pub async fn shutdown(self) {
        if let Some(watcher) = self.watcher {
            watcher.shutdown().await;
        }
        self.lifecycle.flush();
        tracing::info!(app = %self.config.app_name, "Permission service stopped");
    }
}

impl std::fmt::Debug for AclService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclService")
            .field("app", &self.config.app_name)
            .field("plugins", &self.plugins)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}

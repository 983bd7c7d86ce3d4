//! Plugin permission registry
//!
//! Readers load the current [`PluginSnapshot`] without locking. Writers are
//! serialized, build a complete new snapshot, and publish it with a single
//! pointer swap, so a reader sees a plugin's permission set either fully or
//! not at all.

use arc_swap::ArcSwap;
use forum_acl_api::{Mask, Permission, PluginPermissionSet};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use super::{PermissionSource, RegistryChange, RegistryError};
use crate::lifecycle::PluginEvent;

/// Permissions contributed by one plugin
#[derive(Debug)]
struct PluginEntry {
    version: Option<String>,
    fingerprint: String,
    permissions: Vec<Arc<Permission>>,
}

#[derive(Debug, Clone)]
struct Owned {
    permission: Arc<Permission>,
    plugin: Arc<str>,
}

/// Immutable view of all active plugin permissions
#[derive(Debug, Default)]
pub struct PluginSnapshot {
    generation: u64,
    plugins: BTreeMap<Arc<str>, Arc<PluginEntry>>,
    by_mask: HashMap<Mask, Owned>,
    by_name: HashMap<String, Owned>,
}

impl PluginSnapshot {
    fn build(generation: u64, plugins: BTreeMap<Arc<str>, Arc<PluginEntry>>) -> Self {
        let mut by_mask = HashMap::new();
        let mut by_name = HashMap::new();

        for (plugin, entry) in &plugins {
            for permission in &entry.permissions {
                let owned = Owned {
                    permission: Arc::clone(permission),
                    plugin: Arc::clone(plugin),
                };
                by_mask.insert(permission.mask(), owned.clone());
                by_name.insert(permission.name().to_string(), owned);
            }
        }

        Self {
            generation,
            plugins,
            by_mask,
            by_name,
        }
    }

    /// Number of updates published before this snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn lookup_by_mask(&self, mask: Mask) -> Option<Arc<Permission>> {
        self.by_mask.get(&mask).map(|o| Arc::clone(&o.permission))
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<Permission>> {
        self.by_name.get(name).map(|o| Arc::clone(&o.permission))
    }

    /// Plugin that contributed `mask`
    pub fn owner_of(&self, mask: Mask) -> Option<&str> {
        self.by_mask.get(&mask).map(|o| &*o.plugin)
    }

    /// Active plugin ids, sorted
    pub fn plugins(&self) -> Vec<String> {
        self.plugins.keys().map(|p| p.to_string()).collect()
    }

    /// Permissions of one plugin, in declaration order
    pub fn permissions_of(&self, plugin: &str) -> Vec<Arc<Permission>> {
        self.plugins
            .get(plugin)
            .map(|entry| entry.permissions.clone())
            .unwrap_or_default()
    }

    /// Declared version of one plugin
    pub fn version_of(&self, plugin: &str) -> Option<&str> {
        self.plugins
            .get(plugin)
            .and_then(|entry| entry.version.as_deref())
    }

    /// Total number of plugin permissions
    pub fn len(&self) -> usize {
        self.by_mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mask.is_empty()
    }
}

/// A thread-safe registry of plugin-contributed permissions
#[derive(Clone)]
pub struct PluginRegistry {
    current: Arc<ArcSwap<PluginSnapshot>>,
    writer: Arc<Mutex<()>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(PluginSnapshot::default())),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Current snapshot. Holding it keeps that view alive across updates.
    pub fn snapshot(&self) -> Arc<PluginSnapshot> {
        self.current.load_full()
    }

    /// Register a plugin's complete permission set, replacing any previous one.
    ///
    /// The update is applied whole or not at all.
    pub fn register(&self, set: PluginPermissionSet) -> Result<RegistryChange, RegistryError> {
        let permissions = set.validate()?;
        let fingerprint = set.fingerprint()?;
        let plugin = set.plugin;

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load_full();

        let previous = current.plugins.get(plugin.as_str());
        if let Some(previous) = previous {
            if previous.fingerprint == fingerprint {
                tracing::debug!(plugin = %plugin, "Permission set unchanged");
                return Ok(RegistryChange::Unchanged { plugin });
            }
        }

        for permission in &permissions {
            if let Some(owner) = current.by_mask.get(&permission.mask()) {
                if *owner.plugin != *plugin {
                    return Err(RegistryError::MaskConflict {
                        plugin,
                        mask: permission.mask(),
                        owner: owner.plugin.to_string(),
                    });
                }
            }
            if let Some(owner) = current.by_name.get(permission.name()) {
                if *owner.plugin != *plugin {
                    return Err(RegistryError::NameConflict {
                        plugin,
                        name: permission.name().to_string(),
                        owner: owner.plugin.to_string(),
                    });
                }
            }
        }

        let previous = previous.map(|entry| entry.permissions.len());
        let count = permissions.len();

        let mut plugins = current.plugins.clone();
        plugins.insert(
            Arc::from(plugin.as_str()),
            Arc::new(PluginEntry {
                version: set.version,
                fingerprint,
                permissions: permissions.into_iter().map(Arc::new).collect(),
            }),
        );
        self.publish(&current, plugins);

        let change = match previous {
            Some(previous) => RegistryChange::Replaced {
                plugin,
                previous,
                count,
            },
            None => RegistryChange::Registered { plugin, count },
        };
        tracing::info!(plugin = %change.plugin(), count, "Plugin permissions registered");
        Ok(change)
    }

    /// Remove every permission contributed by `plugin`
    pub fn unregister(&self, plugin: &str) -> RegistryChange {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load_full();

        if !current.plugins.contains_key(plugin) {
            return RegistryChange::Unchanged {
                plugin: plugin.to_string(),
            };
        }

        let mut plugins = current.plugins.clone();
        let count = plugins
            .remove(plugin)
            .map(|entry| entry.permissions.len())
            .unwrap_or_default();
        self.publish(&current, plugins);

        tracing::info!(plugin = %plugin, count, "Plugin permissions removed");
        RegistryChange::Removed {
            plugin: plugin.to_string(),
            count,
        }
    }

    /// Apply a lifecycle notification
    pub fn apply(&self, event: PluginEvent) -> Result<RegistryChange, RegistryError> {
        match event {
            PluginEvent::Installed(set) | PluginEvent::Enabled(set) => self.register(set),
            PluginEvent::Disabled { plugin } | PluginEvent::Removed { plugin } => {
                Ok(self.unregister(&plugin))
            }
        }
    }

    /// Active plugin ids, sorted
    pub fn plugins(&self) -> Vec<String> {
        self.current.load().plugins()
    }

    /// Permissions of one plugin, in declaration order
    pub fn permissions_of(&self, plugin: &str) -> Vec<Arc<Permission>> {
        self.current.load().permissions_of(plugin)
    }

    /// Whether `plugin` currently contributes permissions
    pub fn contains_plugin(&self, plugin: &str) -> bool {
        self.current.load().plugins.contains_key(plugin)
    }

    /// Generation of the current snapshot
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Total number of plugin permissions
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    // Caller must hold the writer lock.
    fn publish(&self, current: &PluginSnapshot, plugins: BTreeMap<Arc<str>, Arc<PluginEntry>>) {
        let next = PluginSnapshot::build(current.generation + 1, plugins);
        self.current.store(Arc::new(next));
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.current.load();
        f.debug_struct("PluginRegistry")
            .field("generation", &snapshot.generation)
            .field("plugins", &snapshot.plugins.len())
            .field("permissions", &snapshot.len())
            .finish()
    }
}

impl PermissionSource for PluginRegistry {
    fn label(&self) -> &'static str {
        "plugin"
    }

    fn lookup_by_mask(&self, mask: Mask) -> Option<Arc<Permission>> {
        self.current.load().lookup_by_mask(mask)
    }

    fn lookup_by_name(&self, name: &str) -> Option<Arc<Permission>> {
        self.current.load().lookup_by_name(name)
    }

    fn lookup_by_names(&self, names: &[String]) -> Vec<Arc<Permission>> {
        let snapshot = self.current.load();
        names
            .iter()
            .filter_map(|name| snapshot.lookup_by_name(name))
            .collect()
    }
}

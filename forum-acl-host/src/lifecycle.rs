//! Plugin lifecycle handling
//!
//! The plugin manager owns plugin state. Whenever a plugin is installed,
//! enabled, disabled, or removed it reports a [`PluginEvent`] carrying the
//! plugin's complete permission set (or just its id when it goes away).

use forum_acl_api::{Mask, PluginPermissionSet};
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditSink};
use crate::registry::{PermissionSource, PluginRegistry, RegistryChange, RegistryError};

/// Plugin state change as reported by the plugin manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    /// Plugin was installed and loaded
    Installed(PluginPermissionSet),
    /// Plugin was (re-)enabled
    Enabled(PluginPermissionSet),
    /// Plugin was disabled but stays installed
    Disabled { plugin: String },
    /// Plugin was uninstalled
    Removed { plugin: String },
}

impl PluginEvent {
    /// Plugin this event is about
    pub fn plugin(&self) -> &str {
        match self {
            Self::Installed(set) | Self::Enabled(set) => &set.plugin,
            Self::Disabled { plugin } | Self::Removed { plugin } => plugin,
        }
    }
}

/// Applies lifecycle events to a [`PluginRegistry`] and audits the outcome
pub struct LifecycleHandler {
    registry: PluginRegistry,
    core: Option<Arc<dyn PermissionSource>>,
    audit: Arc<dyn AuditSink>,
}

impl LifecycleHandler {
    pub fn new(registry: PluginRegistry, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            registry,
            core: None,
            audit,
        }
    }

    /// Report plugin permissions that the core namespace will shadow
    pub fn with_core(mut self, core: Arc<dyn PermissionSource>) -> Self {
        self.core = Some(core);
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Apply one event.
    ///
    /// Rejected updates leave the registry untouched and are audited before
    /// the error is returned. Core shadowing is only reported for sets that
    /// actually changed the registry.
    pub fn handle(&self, event: PluginEvent) -> Result<RegistryChange, RegistryError> {
        let plugin = event.plugin().to_string();
        let (fingerprint, shadowed) = match &event {
            PluginEvent::Installed(set) | PluginEvent::Enabled(set) => {
                (set.fingerprint().ok(), self.shadowed_by_core(set))
            }
            PluginEvent::Disabled { .. } | PluginEvent::Removed { .. } => (None, Vec::new()),
        };

        match self.registry.apply(event) {
            Ok(change) => {
                if let Some(audit_event) = AuditEvent::from_change(&change, fingerprint) {
                    self.record(audit_event);
                }
                if change.is_effective() {
                    for (name, mask) in shadowed {
                        tracing::warn!(
                            plugin = %plugin,
                            name = %name,
                            mask = %mask,
                            "Plugin permission collides with a core permission; core takes priority"
                        );
                        self.record(AuditEvent::core_shadowed(&plugin, name, mask));
                    }
                }
                Ok(change)
            }
            Err(e) => {
                tracing::warn!(plugin = %plugin, error = %e, "Plugin permission update rejected");
                self.record(AuditEvent::rejected(plugin, e.to_string()));
                Err(e)
            }
        }
    }

    fn shadowed_by_core(&self, set: &PluginPermissionSet) -> Vec<(String, Mask)> {
        let Some(core) = &self.core else {
            return Vec::new();
        };
        set.permissions
            .iter()
            .filter(|spec| {
                core.lookup_by_mask(spec.mask).is_some() || core.lookup_by_name(&spec.name).is_some()
            })
            .map(|spec| (spec.name.clone(), spec.mask))
            .collect()
    }

    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event) {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }

    /// Flush the audit sink
    pub fn flush(&self) {
        if let Err(e) = self.audit.flush() {
            tracing::warn!(error = %e, "Failed to flush audit sink");
        }
    }
}

impl std::fmt::Debug for LifecycleHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHandler")
            .field("registry", &self.registry)
            .field("core", &self.core.is_some())
            .finish_non_exhaustive()
    }
}

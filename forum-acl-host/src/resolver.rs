//! Permission resolution
//!
//! [`PermissionResolver`] is what the authorization layer talks to. It asks
//! the core namespace first, then the plugin namespace, and falls back to the
//! unresolved permission (mask 0) so that ACL entries written by a plugin
//! that is no longer active still resolve to a value that grants nothing.
//!
//! The batch form is deliberately different: names that match nothing are
//! dropped instead of being replaced by the sentinel.

use forum_acl_api::{unresolved, Mask, Permission};
use std::sync::Arc;

use crate::registry::{CoreRegistry, PermissionSource, PluginRegistry};

/// Lookup interface consumed by the authorization framework
///
/// Singular lookups always return a permission. Unknown identifiers resolve
/// to the unresolved permission, which carries no privilege.
pub trait ResolvePermission: Send + Sync {
    /// Resolve a mask read from an ACL entry
    fn resolve_by_mask(&self, mask: Mask) -> Arc<Permission>;

    /// Resolve a permission name
    fn resolve_by_name(&self, name: &str) -> Arc<Permission>;

    /// Resolve several names: core matches first, then plugin matches.
    /// Unknown names are omitted from the result.
    fn resolve_by_names(&self, names: &[String]) -> Vec<Arc<Permission>>;
}

/// Namespace a resolved permission came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Core,
    Plugin,
    Unresolved,
}

/// A resolved permission together with where it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub permission: Arc<Permission>,
    pub origin: Origin,
}

/// Two-tier resolver over a core and a plugin namespace
#[derive(Clone)]
pub struct PermissionResolver {
    core: Arc<dyn PermissionSource>,
    plugins: Arc<dyn PermissionSource>,
}

impl PermissionResolver {
    /// Create a resolver over arbitrary sources. `core` has priority.
    pub fn new(core: Arc<dyn PermissionSource>, plugins: Arc<dyn PermissionSource>) -> Self {
        Self { core, plugins }
    }

    /// Create a resolver over the built-in core permissions
    pub fn builtin(plugins: PluginRegistry) -> Self {
        Self::new(Arc::new(CoreRegistry::builtin()), Arc::new(plugins))
    }

    /// Resolve a mask and report which namespace answered
    pub fn resolve_mask_with_origin(&self, mask: Mask) -> Resolution {
        if let Some(permission) = self.core.lookup_by_mask(mask) {
            return Resolution {
                permission,
                origin: Origin::Core,
            };
        }
        if let Some(permission) = self.plugins.lookup_by_mask(mask) {
            return Resolution {
                permission,
                origin: Origin::Plugin,
            };
        }
        tracing::debug!(mask = %mask, "No permission for mask, using unresolved permission");
        Resolution {
            permission: unresolved(),
            origin: Origin::Unresolved,
        }
    }

    /// Resolve a name and report which namespace answered
    pub fn resolve_name_with_origin(&self, name: &str) -> Resolution {
        if let Some(permission) = self.core.lookup_by_name(name) {
            return Resolution {
                permission,
                origin: Origin::Core,
            };
        }
        if let Some(permission) = self.plugins.lookup_by_name(name) {
            return Resolution {
                permission,
                origin: Origin::Plugin,
            };
        }
        tracing::debug!(name = %name, "No permission for name, using unresolved permission");
        Resolution {
            permission: unresolved(),
            origin: Origin::Unresolved,
        }
    }
}

impl ResolvePermission for PermissionResolver {
    fn resolve_by_mask(&self, mask: Mask) -> Arc<Permission> {
        self.resolve_mask_with_origin(mask).permission
    }

    fn resolve_by_name(&self, name: &str) -> Arc<Permission> {
        self.resolve_name_with_origin(name).permission
    }

    fn resolve_by_names(&self, names: &[String]) -> Vec<Arc<Permission>> {
        let mut permissions = self.core.lookup_by_names(names);
        permissions.extend(self.plugins.lookup_by_names(names));
        permissions
    }
}

impl std::fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("core", &self.core.label())
            .field("plugins", &self.plugins.label())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CoreDefinition;
    use forum_acl_api::PluginPermissionSet;

    fn resolver() -> (PermissionResolver, PluginRegistry) {
        let core = CoreRegistry::from_definitions(&[
            CoreDefinition::new("READ", 0b1),
            CoreDefinition::new("WRITE", 0b10),
        ])
        .unwrap();
        let plugins = PluginRegistry::new();
        plugins
            .register(
                PluginPermissionSet::new("kudos")
                    .permission("KUDOS_GIVE", 0b100u32)
                    .permission("WRITE", 0b1000u32)
                    .permission("KUDOS_ALIAS", 0b1u32),
            )
            .unwrap();
        let resolver = PermissionResolver::new(Arc::new(core), Arc::new(plugins.clone()));
        (resolver, plugins)
    }

    #[test]
    fn test_core_then_plugin_then_unresolved() {
        let (resolver, _) = resolver();
        assert_eq!(
            resolver.resolve_mask_with_origin(Mask::new(0b1)).origin,
            Origin::Core
        );
        assert_eq!(
            resolver.resolve_mask_with_origin(Mask::new(0b100)).origin,
            Origin::Plugin
        );
        let missing = resolver.resolve_mask_with_origin(Mask::new(0b1_0000));
        assert_eq!(missing.origin, Origin::Unresolved);
        assert!(missing.permission.is_unresolved());
    }

    #[test]
    fn test_core_wins_collisions() {
        let (resolver, _) = resolver();
        let by_mask = resolver.resolve_by_mask(Mask::new(0b1));
        assert_eq!(by_mask.name(), "READ");

        let by_name = resolver.resolve_by_name("WRITE");
        assert_eq!(by_name.mask(), Mask::new(0b10));
    }

    #[test]
    fn test_unresolved_name() {
        let (resolver, _) = resolver();
        let first = resolver.resolve_by_name("REMOVED_PLUGIN_PERMISSION");
        let second = resolver.resolve_by_name("REMOVED_PLUGIN_PERMISSION");
        assert!(first.is_unresolved());
        assert_eq!(first, second);
        assert!(!first.name().is_empty());
    }

    #[test]
    fn test_resolve_by_names_orders_core_first() {
        let (resolver, _) = resolver();
        let names = vec![
            "KUDOS_GIVE".to_string(),
            "UNKNOWN".to_string(),
            "READ".to_string(),
        ];
        let resolved: Vec<String> = resolver
            .resolve_by_names(&names)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(resolved, vec!["READ", "KUDOS_GIVE"]);
    }

    #[test]
    fn test_resolve_by_names_keeps_both_tiers_for_shared_name() {
        let (resolver, _) = resolver();
        let resolved: Vec<Mask> = resolver
            .resolve_by_names(&["WRITE".to_string()])
            .iter()
            .map(|p| p.mask())
            .collect();
        assert_eq!(resolved, vec![Mask::new(0b10), Mask::new(0b1000)]);
        assert_eq!(resolver.resolve_by_name("WRITE").mask(), Mask::new(0b10));
    }

    #[test]
    fn test_disabled_plugin_mask_becomes_unresolved() {
        let (resolver, plugins) = resolver();
        assert_eq!(resolver.resolve_by_mask(Mask::new(0b100)).name(), "KUDOS_GIVE");

        plugins.unregister("kudos");
        assert!(resolver.resolve_by_mask(Mask::new(0b100)).is_unresolved());
        assert!(resolver.resolve_by_names(&["KUDOS_GIVE".to_string()]).is_empty());
    }
}

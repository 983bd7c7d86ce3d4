//! Permission registries
//!
//! Both namespaces implement [`PermissionSource`], which only reports strict
//! matches. Falling back to the unresolved permission is the resolver's job.
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────────────────────┐
//! │     CoreRegistry     │   │        PluginRegistry        │
//! │  built once, frozen  │   │  ArcSwap<PluginSnapshot>     │
//! │  BUILTIN_PERMISSIONS │   │  writers: Mutex + swap       │
//! └──────────┬───────────┘   └──────────────┬───────────────┘
//!            └──────── PermissionSource ────┘
//! ```

pub mod builtin;
pub mod plugin;

use forum_acl_api::{Mask, Permission, PermissionError};
use std::sync::Arc;
use thiserror::Error;

pub use builtin::{CoreDefinition, CoreRegistry, BUILTIN_PERMISSIONS};
pub use plugin::{PluginRegistry, PluginSnapshot};

/// Strict permission lookup over one namespace
pub trait PermissionSource: Send + Sync {
    /// Short label used in logs ("core", "plugin")
    fn label(&self) -> &'static str;

    /// Find a permission by mask
    fn lookup_by_mask(&self, mask: Mask) -> Option<Arc<Permission>>;

    /// Find a permission by name
    fn lookup_by_name(&self, name: &str) -> Option<Arc<Permission>>;

    /// Find all permissions matching `names`, in input order.
    ///
    /// Names without a match are skipped.
    fn lookup_by_names(&self, names: &[String]) -> Vec<Arc<Permission>> {
        names
            .iter()
            .filter_map(|name| self.lookup_by_name(name))
            .collect()
    }
}

/// Outcome of a plugin registry update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    /// A plugin without previous permissions was registered
    Registered { plugin: String, count: usize },
    /// A plugin's previous permission set was replaced
    Replaced {
        plugin: String,
        previous: usize,
        count: usize,
    },
    /// A plugin's permission set was removed
    Removed { plugin: String, count: usize },
    /// Nothing to do (identical set, or unknown plugin on removal)
    Unchanged { plugin: String },
}

impl RegistryChange {
    /// Plugin the change applies to
    pub fn plugin(&self) -> &str {
        match self {
            Self::Registered { plugin, .. }
            | Self::Replaced { plugin, .. }
            | Self::Removed { plugin, .. }
            | Self::Unchanged { plugin } => plugin,
        }
    }

    /// Whether a new snapshot was published
    pub fn is_effective(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

/// Errors that can occur while populating or updating a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid permission: {0}")]
    Invalid(#[from] PermissionError),

    #[error("Duplicate mask {mask} in core registry ({existing} and {name})")]
    DuplicateMask {
        mask: Mask,
        existing: String,
        name: String,
    },

    #[error("Duplicate name {0} in core registry")]
    DuplicateName(String),

    #[error("Plugin {plugin} declares mask {mask} already owned by plugin {owner}")]
    MaskConflict {
        plugin: String,
        mask: Mask,
        owner: String,
    },

    #[error("Plugin {plugin} declares name {name} already owned by plugin {owner}")]
    NameConflict {
        plugin: String,
        name: String,
        owner: String,
    },
}

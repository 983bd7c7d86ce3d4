//! Built-in forum permissions
//!
//! The core namespace ships with the forum and never changes at runtime.

use forum_acl_api::{Mask, Permission};
use std::collections::HashMap;
use std::sync::Arc;

use super::{PermissionSource, RegistryError};

/// Static definition of one core permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreDefinition {
    pub name: &'static str,
    pub mask: u32,
}

impl CoreDefinition {
    pub const fn new(name: &'static str, mask: u32) -> Self {
        Self { name, mask }
    }
}

/// Permissions compiled into the forum
pub const BUILTIN_PERMISSIONS: &[CoreDefinition] = &[
    // General
    CoreDefinition::new("ADMIN", 0b1_0000),
    // Branch
    CoreDefinition::new("VIEW_TOPICS", 1 << 6),
    CoreDefinition::new("CREATE_POSTS", 1 << 7),
    CoreDefinition::new("DELETE_OWN_POSTS", 1 << 8),
    CoreDefinition::new("DELETE_OTHERS_POSTS", 1 << 9),
    CoreDefinition::new("EDIT_OWN_POSTS", 1 << 10),
    CoreDefinition::new("EDIT_OTHERS_POSTS", 1 << 11),
    CoreDefinition::new("CREATE_ANNOUNCEMENTS", 1 << 12),
    CoreDefinition::new("CREATE_STICKED_TOPICS", 1 << 13),
    CoreDefinition::new("CLOSE_TOPICS", 1 << 14),
    CoreDefinition::new("MOVE_TOPICS", 1 << 15),
    CoreDefinition::new("SPLIT_TOPICS", 1 << 16),
    CoreDefinition::new("CREATE_POSTS_IN_CLOSED_TOPIC", 1 << 17),
    CoreDefinition::new("CREATE_CODE_REVIEW", 1 << 18),
    CoreDefinition::new("LEAVE_COMMENTS_IN_CODE_REVIEW", 1 << 19),
    CoreDefinition::new("MODERATE_BRANCH", 1 << 20),
    // Profile
    CoreDefinition::new("EDIT_OWN_PROFILE", 1 << 21),
    CoreDefinition::new("SEND_PRIVATE_MESSAGES", 1 << 22),
    CoreDefinition::new("CREATE_FORUM_FAQ", 1 << 23),
    // Group
    CoreDefinition::new("MANAGE_GROUP_MEMBERS", 1 << 30),
];

/// Immutable registry of core permissions
///
/// Lookups return clones of the same `Arc` for both indexes.
#[derive(Debug)]
pub struct CoreRegistry {
    ordered: Vec<Arc<Permission>>,
    by_mask: HashMap<Mask, Arc<Permission>>,
    by_name: HashMap<String, Arc<Permission>>,
}

impl CoreRegistry {
    /// Build from static definitions, rejecting invalid or duplicate entries
    pub fn from_definitions(definitions: &[CoreDefinition]) -> Result<Self, RegistryError> {
        let mut ordered = Vec::with_capacity(definitions.len());
        let mut by_mask: HashMap<Mask, Arc<Permission>> = HashMap::new();
        let mut by_name = HashMap::new();

        for definition in definitions {
            let permission = Arc::new(Permission::new(definition.name, definition.mask)?);

            if let Some(existing) = by_mask.get(&permission.mask()) {
                return Err(RegistryError::DuplicateMask {
                    mask: permission.mask(),
                    existing: existing.name().to_string(),
                    name: permission.name().to_string(),
                });
            }
            if by_name.contains_key(permission.name()) {
                return Err(RegistryError::DuplicateName(permission.name().to_string()));
            }

            by_mask.insert(permission.mask(), Arc::clone(&permission));
            by_name.insert(permission.name().to_string(), Arc::clone(&permission));
            ordered.push(permission);
        }

        tracing::debug!(count = ordered.len(), "Core permission registry built");
        Ok(Self {
            ordered,
            by_mask,
            by_name,
        })
    }

    /// Build from [`BUILTIN_PERMISSIONS`].
    ///
    /// # Panics
    /// Panics if the compiled-in table is invalid. The table is covered by
    /// tests, so this only fires on a broken build.
    pub fn builtin() -> Self {
        Self::from_definitions(BUILTIN_PERMISSIONS)
            .expect("built-in permission table must be valid")
    }

    /// Permissions in definition order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Permission>> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl Default for CoreRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PermissionSource for CoreRegistry {
    fn label(&self) -> &'static str {
        "core"
    }

    fn lookup_by_mask(&self, mask: Mask) -> Option<Arc<Permission>> {
        self.by_mask.get(&mask).cloned()
    }

    fn lookup_by_name(&self, name: &str) -> Option<Arc<Permission>> {
        self.by_name.get(name).cloned()
    }
}

//! Plugin permission manifests
//!
//! A plugin declares every permission it contributes in one
//! [`PluginPermissionSet`]. The host always receives the complete set, so a
//! new delivery replaces whatever the same plugin registered before.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Mask, Permission, PermissionError, API_VERSION};

/// Declaration of one plugin permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    /// Permission name (e.g. "KUDOS_GIVE")
    pub name: String,

    /// Mask, unique within the plugin registry
    pub mask: Mask,

    /// Optional pattern, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl PermissionSpec {
    /// Create a spec without a pattern
    pub fn new(name: impl Into<String>, mask: impl Into<Mask>) -> Self {
        Self {
            name: name.into(),
            mask: mask.into(),
            pattern: None,
        }
    }

    /// Set the pattern
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Validate and convert into a [`Permission`]
    pub fn into_permission(self) -> Result<Permission, PermissionError> {
        match self.pattern {
            Some(pattern) => Permission::with_pattern(self.name, self.mask, pattern),
            None => Permission::new(self.name, self.mask),
        }
    }
}

/// Complete set of permissions contributed by one plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginPermissionSet {
    /// API version for compatibility
    pub api_version: u32,

    /// Plugin identifier (e.g. "kudos" or "questions-n-answers")
    pub plugin: String,

    /// Plugin version (semver)
    #[serde(default)]
    pub version: Option<String>,

    /// Contributed permissions
    #[serde(default)]
    pub permissions: Vec<PermissionSpec>,
}

impl PluginPermissionSet {
    /// Create an empty set for a plugin
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION,
            plugin: plugin.into(),
            version: None,
            permissions: Vec::new(),
        }
    }

    /// Add version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a permission
    pub fn permission(mut self, name: impl Into<String>, mask: impl Into<Mask>) -> Self {
        self.permissions.push(PermissionSpec::new(name, mask));
        self
    }

    /// Add a permission with a pattern
    pub fn permission_with_pattern(
        mut self,
        name: impl Into<String>,
        mask: impl Into<Mask>,
        pattern: impl Into<String>,
    ) -> Self {
        self.permissions
            .push(PermissionSpec::new(name, mask).pattern(pattern));
        self
    }

    /// Check the set and build its permissions.
    ///
    /// Fails on the first invalid entry; a set is accepted whole or not at all.
    pub fn validate(&self) -> Result<Vec<Permission>, PermissionError> {
        if self.plugin.trim().is_empty() {
            return Err(PermissionError::EmptyPluginId);
        }
        if self.api_version != API_VERSION {
            return Err(PermissionError::ApiVersion {
                found: self.api_version,
                expected: API_VERSION,
            });
        }

        let mut masks = HashSet::new();
        let mut names = HashSet::new();
        let mut permissions = Vec::with_capacity(self.permissions.len());

        for spec in &self.permissions {
            let permission = spec.clone().into_permission()?;
            if !masks.insert(permission.mask()) {
                return Err(PermissionError::DuplicateMask {
                    plugin: self.plugin.clone(),
                    mask: permission.mask(),
                });
            }
            if !names.insert(permission.name().to_string()) {
                return Err(PermissionError::DuplicateName {
                    plugin: self.plugin.clone(),
                    name: permission.name().to_string(),
                });
            }
            permissions.push(permission);
        }

        Ok(permissions)
    }

    /// Encode as MessagePack (host/plugin wire format)
    pub fn to_msgpack(&self) -> Result<Vec<u8>, PermissionError> {
        rmp_serde::to_vec_named(self).map_err(|e| PermissionError::Encode(e.to_string()))
    }

    /// Decode from MessagePack
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, PermissionError> {
        rmp_serde::from_slice(bytes).map_err(|e| PermissionError::Decode(e.to_string()))
    }

    /// Decode from JSON (on-disk manifest format)
    pub fn from_json(text: &str) -> Result<Self, PermissionError> {
        serde_json::from_str(text).map_err(|e| PermissionError::Decode(e.to_string()))
    }

    /// Encode as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, PermissionError> {
        serde_json::to_string_pretty(self).map_err(|e| PermissionError::Encode(e.to_string()))
    }

    /// Content hash of the set, stable across encodings
    pub fn fingerprint(&self) -> Result<String, PermissionError> {
        // Field order is fixed by the struct definition, so the MessagePack
        // encoding is canonical for equal sets.
        let bytes = self.to_msgpack()?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

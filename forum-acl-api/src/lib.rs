//! forum-acl-api: Shared permission types for forum-acl
//!
//! This crate defines the values exchanged between the permission host and
//! the plugins that contribute permissions to it:
//!
//! - [`Mask`] and [`Permission`], the resolved form of an access right
//! - [`unresolved`], the zero-privilege permission returned when nothing matches
//! - [`PluginPermissionSet`], the manifest a plugin ships with its permissions
//!
//! Manifests travel as MessagePack between host and plugin and as JSON on disk.

mod manifest;
mod permission;

pub use manifest::{PermissionSpec, PluginPermissionSet};
pub use permission::{unresolved, Mask, Permission, UNRESOLVED_NAME};

/// API version for manifest compatibility checking
pub const API_VERSION: u32 = 1;

/// Errors raised while constructing permissions or validating manifests
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    #[error("Permission name must not be empty")]
    EmptyName,

    #[error("Mask 0 is reserved for the unresolved permission (name: {0})")]
    ReservedMask(String),

    #[error("Name {0} is reserved for the unresolved permission")]
    ReservedName(String),

    #[error("Invalid mask value: {0}")]
    InvalidMask(i64),

    #[error("Plugin id must not be empty")]
    EmptyPluginId,

    #[error("Unsupported manifest API version {found} (expected {expected})")]
    ApiVersion { found: u32, expected: u32 },

    #[error("Duplicate mask {mask} in permission set of plugin {plugin}")]
    DuplicateMask { plugin: String, mask: Mask },

    #[error("Duplicate name {name} in permission set of plugin {plugin}")]
    DuplicateName { plugin: String, name: String },

    #[error("Failed to decode manifest: {0}")]
    Decode(String),

    #[error("Failed to encode manifest: {0}")]
    Encode(String),
}

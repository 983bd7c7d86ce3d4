//! forum-acl-host: permission registries and resolution for forum-acl
//!
//! This crate owns the two permission namespaces and the resolver that
//! merges them:
//!
//! - [`CoreRegistry`]: built-in forum permissions, fixed at startup
//! - [`PluginRegistry`]: permissions of the currently active plugins,
//!   published as immutable snapshots
//! - [`PermissionResolver`]: core first, then plugins, then the unresolved
//!   sentinel
//!
//! Plugin state changes arrive as [`PluginEvent`]s through a
//! [`LifecycleHandler`], either from an embedding application or from the
//! manifest [`watcher`].

pub mod audit;
pub mod discovery;
pub mod lifecycle;
pub mod registry;
pub mod resolver;
pub mod watcher;

pub use audit::{AuditEvent, AuditEventType, AuditSink};
pub use lifecycle::{LifecycleHandler, PluginEvent};
pub use registry::{
    CoreDefinition, CoreRegistry, PermissionSource, PluginRegistry, PluginSnapshot,
    RegistryChange, RegistryError, BUILTIN_PERMISSIONS,
};
pub use resolver::{Origin, PermissionResolver, ResolvePermission, Resolution};
pub use forum_acl_api::{
    unresolved, Mask, Permission, PermissionError, PermissionSpec, PluginPermissionSet,
};

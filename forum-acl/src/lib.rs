//! # forum-acl: permission resolution for forum access control
//!
//! Access-control entries store permissions as integer masks or names. This
//! crate turns them back into [`Permission`] values, merging the forum's
//! built-in permissions with those contributed by plugins that come and go
//! at runtime.
//!
//! ## Resolution rules
//!
//! - Core permissions win over plugin permissions.
//! - An identifier nobody recognizes (for example a permission of an
//!   uninstalled plugin) resolves to the unresolved permission: mask 0,
//!   name `NULL_PERMISSION`, no privilege.
//! - `resolve_by_names` returns core matches, then plugin matches, and drops
//!   unknown names.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forum_acl::{AclConfigBuilder, AclService, Mask, ResolvePermission};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), forum_acl::AclError> {
//!     forum_acl::init_subscriber();
//!
//!     let config = AclConfigBuilder::new()
//!         .manifest_dir("/var/lib/forum/plugins")
//!         .watch(std::time::Duration::from_millis(500))
//!         .build();
//!     let service = AclService::start(config).await?;
//!
//!     let permission = service.resolver().resolve_by_mask(Mask::new(1 << 6));
//!     println!("{}", permission);
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod service;
pub mod tracing_support;

pub use config::{AclConfig, AclConfigBuilder, AclPresets, AuditConfig, ConfigError};
pub use service::{AclError, AclService};
pub use tracing_support::{init_subscriber, init_subscriber_with_config, TracingConfig, TracingFormat};

pub use forum_acl_api::{
    unresolved, Mask, Permission, PermissionError, PermissionSpec, PluginPermissionSet,
    API_VERSION, UNRESOLVED_NAME,
};
pub use forum_acl_host::{
    audit, discovery, watcher, CoreRegistry, LifecycleHandler, Origin, PermissionResolver,
    PermissionSource, PluginEvent, PluginRegistry, RegistryChange, RegistryError,
    ResolvePermission, Resolution,
};

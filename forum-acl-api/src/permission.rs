//! Permission values and the unresolved sentinel

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{PermissionError, PermissionSpec};

/// Name reported by the unresolved permission
pub const UNRESOLVED_NAME: &str = "NULL_PERMISSION";

/// Bit pattern identifying a permission within a registry
///
/// Zero ([`Mask::NONE`]) is reserved for the unresolved permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mask(u32);

impl Mask {
    /// The reserved zero mask
    pub const NONE: Mask = Mask(0);

    /// Create a mask from raw bits
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits of this mask
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved zero mask
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set in `self`
    pub const fn contains(self, other: Mask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl From<u32> for Mask {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Masks persisted as signed integers (ACL tables) convert through here.
impl TryFrom<i64> for Mask {
    type Error = PermissionError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map(Mask)
            .map_err(|_| PermissionError::InvalidMask(value))
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

/// A single access right: a name, a mask and an optional opaque pattern
///
/// Instances can only be built through validating constructors, so every
/// `Permission` handed out by a registry has a non-empty name and a non-zero
/// mask. The one exception is [`Permission::UNRESOLVED`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PermissionSpec", into = "PermissionSpec")]
pub struct Permission {
    name: Cow<'static, str>,
    mask: Mask,
    pattern: Option<Cow<'static, str>>,
}

impl Permission {
    /// The permission returned when neither registry recognizes an identifier.
    ///
    /// It carries mask 0 and therefore grants nothing.
    pub const UNRESOLVED: Permission = Permission {
        name: Cow::Borrowed(UNRESOLVED_NAME),
        mask: Mask::NONE,
        pattern: None,
    };

    /// Create a permission without a pattern
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        mask: impl Into<Mask>,
    ) -> Result<Self, PermissionError> {
        Self::build(name.into(), mask.into(), None)
    }

    /// Create a permission carrying an opaque pattern
    pub fn with_pattern(
        name: impl Into<Cow<'static, str>>,
        mask: impl Into<Mask>,
        pattern: impl Into<Cow<'static, str>>,
    ) -> Result<Self, PermissionError> {
        Self::build(name.into(), mask.into(), Some(pattern.into()))
    }

    fn build(
        name: Cow<'static, str>,
        mask: Mask,
        pattern: Option<Cow<'static, str>>,
    ) -> Result<Self, PermissionError> {
        if name.trim().is_empty() {
            return Err(PermissionError::EmptyName);
        }
        if name == UNRESOLVED_NAME {
            return Err(PermissionError::ReservedName(name.into_owned()));
        }
        if mask.is_none() {
            return Err(PermissionError::ReservedMask(name.into_owned()));
        }
        Ok(Self {
            name,
            mask,
            pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Pattern string, opaque to resolution
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Whether this is the unresolved sentinel
    pub fn is_unresolved(&self) -> bool {
        self.mask.is_none()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.mask)
    }
}

impl TryFrom<PermissionSpec> for Permission {
    type Error = PermissionError;

    fn try_from(spec: PermissionSpec) -> Result<Self, Self::Error> {
        // Only the exact sentinel encoding reads back as the sentinel
        if spec.name == UNRESOLVED_NAME && spec.mask.is_none() && spec.pattern.is_none() {
            return Ok(Permission::UNRESOLVED);
        }
        spec.into_permission()
    }
}

impl From<Permission> for PermissionSpec {
    fn from(permission: Permission) -> Self {
        PermissionSpec {
            name: permission.name.into_owned(),
            mask: permission.mask,
            pattern: permission.pattern.map(Cow::into_owned),
        }
    }
}

/// Shared handle to the unresolved permission
///
/// Every call returns a clone of the same allocation.
pub fn unresolved() -> Arc<Permission> {
    static UNRESOLVED: OnceLock<Arc<Permission>> = OnceLock::new();
    UNRESOLVED
        .get_or_init(|| Arc::new(Permission::UNRESOLVED))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_permission() {
        let perm = Permission::new("VIEW_TOPICS", 0b100_0000u32).unwrap();
        assert_eq!(perm.name(), "VIEW_TOPICS");
        assert_eq!(perm.mask(), Mask::new(64));
        assert_eq!(perm.pattern(), None);
        assert!(!perm.is_unresolved());
    }

    #[test]
    fn test_invalid_permissions_fail_fast() {
        assert_eq!(Permission::new("", 1u32), Err(PermissionError::EmptyName));
        assert_eq!(Permission::new("   ", 1u32), Err(PermissionError::EmptyName));
        assert!(matches!(
            Permission::new("READ", 0u32),
            Err(PermissionError::ReservedMask(_))
        ));
        assert!(matches!(
            Permission::new(UNRESOLVED_NAME, 8u32),
            Err(PermissionError::ReservedName(_))
        ));
    }

    #[test]
    fn test_unresolved_sentinel() {
        let sentinel = unresolved();
        assert_eq!(sentinel.name(), UNRESOLVED_NAME);
        assert!(!sentinel.name().is_empty());
        assert_eq!(sentinel.mask(), Mask::NONE);
        assert!(sentinel.is_unresolved());
        assert!(Arc::ptr_eq(&sentinel, &unresolved()));
        assert_eq!(*sentinel, Permission::UNRESOLVED);
    }

    #[test]
    fn test_mask_from_signed() {
        assert_eq!(Mask::try_from(16i64), Ok(Mask::new(16)));
        assert_eq!(Mask::try_from(-1i64), Err(PermissionError::InvalidMask(-1)));
        assert!(Mask::try_from(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_mask_display_and_contains() {
        let mask = Mask::new(0b1010);
        assert_eq!(mask.to_string(), "0b1010");
        assert!(mask.contains(Mask::new(0b10)));
        assert!(!mask.contains(Mask::new(0b1)));
    }

    #[test]
    fn test_permission_deserialize_validates() {
        let ok: Permission =
            serde_json::from_str(r#"{"name":"KUDOS_GIVE","mask":256,"pattern":"k"}"#).unwrap();
        assert_eq!(ok.pattern(), Some("k"));

        let bad = serde_json::from_str::<Permission>(r#"{"name":"","mask":256}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_unresolved_serde_round_trip() {
        let json = serde_json::to_string(&*unresolved()).unwrap();
        let decoded: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, Permission::UNRESOLVED);
        assert!(decoded.is_unresolved());

        for reserved in [
            r#"{"name":"NULL_PERMISSION","mask":256}"#,
            r#"{"name":"NULL_PERMISSION","mask":0,"pattern":"x"}"#,
            r#"{"name":"OTHER","mask":0}"#,
        ] {
            assert!(serde_json::from_str::<Permission>(reserved).is_err(), "{reserved}");
        }
    }
}

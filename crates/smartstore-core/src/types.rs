//! Strong type definitions for store identity.
//!
//! A store is addressed by a [`StoreKey`]: its [`StoreName`] plus the
//! [`StoreScope`] it lives in. Names are validated at construction so they
//! can be used directly as file names by persistent engines.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SpecError};

/// A validated store name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreName(String);

impl StoreName {
    /// The store name used when callers do not pick one.
    pub const DEFAULT: &'static str = "defaultStore";

    /// Validate and wrap a store name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("empty")
        } else if name == "." || name == ".." {
            Some("reserved")
        } else if name.contains(['/', '\\']) {
            Some("contains a path separator")
        } else if name.contains('\0') {
            Some("contains NUL")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SpecError::InvalidStoreName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    /// The default store name.
    pub fn default_store() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreName({})", self.0)
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoreName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StoreName {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StoreName {
    type Error = SpecError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StoreName> for String {
    fn from(name: StoreName) -> Self {
        name.0
    }
}

/// Identity of an authenticated user: organization plus user id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId {
    pub org_id: String,
    pub user_id: String,
}

impl UserId {
    pub fn new(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Stable, filesystem-safe directory name for this user's stores.
    ///
    /// Derived from Blake3("smartstore-user-v0:" || org_id || ":" || user_id).
    pub fn storage_dir(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"smartstore-user-v0:");
        hasher.update(self.org_id.as_bytes());
        hasher.update(b":");
        hasher.update(self.user_id.as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({}/{})", self.org_id, self.user_id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org_id, self.user_id)
    }
}

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StoreScope {
    /// Shared across all users of the application.
    Global,
    /// Isolated to one authenticated user.
    User(UserId),
}

impl StoreScope {
    pub fn is_global(&self) -> bool {
        matches!(self, StoreScope::Global)
    }

    /// The user this scope belongs to, if any.
    pub fn user(&self) -> Option<&UserId> {
        match self {
            StoreScope::Global => None,
            StoreScope::User(user) => Some(user),
        }
    }
}

impl fmt::Display for StoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreScope::Global => f.write_str("global"),
            StoreScope::User(user) => write!(f, "user:{}", user),
        }
    }
}

/// Registry key for a store: (name, scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    pub name: StoreName,
    pub scope: StoreScope,
}

impl StoreKey {
    pub fn new(name: StoreName, scope: StoreScope) -> Self {
        Self { name, scope }
    }

    pub fn global(name: StoreName) -> Self {
        Self::new(name, StoreScope::Global)
    }

    pub fn user(name: StoreName, user: UserId) -> Self {
        Self::new(name, StoreScope::User(user))
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name_validation() {
        assert!(StoreName::new("SWIFTLOCALCOOKBOOK").is_ok());
        assert!(StoreName::new("with space.and-dots").is_ok());

        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0"] {
            let err = StoreName::new(bad).unwrap_err();
            assert!(matches!(err, SpecError::InvalidStoreName { .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_store_name_serde_rejects_invalid() {
        let ok: StoreName = serde_json::from_str("\"cookbook\"").unwrap();
        assert_eq!(ok.as_str(), "cookbook");
        assert!(serde_json::from_str::<StoreName>("\"../etc\"").is_err());
    }

    #[test]
    fn test_user_storage_dir_is_stable_and_distinct() {
        let a = UserId::new("00D000000000001", "005000000000001");
        let b = UserId::new("00D000000000001", "005000000000002");

        assert_eq!(a.storage_dir(), a.clone().storage_dir());
        assert_ne!(a.storage_dir(), b.storage_dir());
        assert_eq!(a.storage_dir().len(), 32);
        assert!(a.storage_dir().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_store_key_display() {
        let key = StoreKey::global(StoreName::new("G1").unwrap());
        assert_eq!(key.to_string(), "G1@global");

        let key = StoreKey::user(StoreName::new("L1").unwrap(), UserId::new("org", "usr"));
        assert_eq!(key.to_string(), "L1@user:org/usr");
    }
}

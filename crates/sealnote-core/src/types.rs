//! Strong type definitions for Sealnote.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Blake3Hash, PrincipalId};
use crate::error::CoreError;

/// Index of a resource in its owner's resource array.
///
/// Assigned by the store, monotonically increasing per owner, never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// The first id handed out for an owner.
    pub const FIRST: Self = Self(0);

    /// The raw index.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id that follows this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ResourceId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Global address of a resource: ids are only unique per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    /// The owning principal.
    pub owner: PrincipalId,
    /// Index in the owner's resource array.
    pub id: ResourceId,
}

impl ResourceRef {
    /// Create a new resource reference.
    pub const fn new(owner: PrincipalId, id: ResourceId) -> Self {
        Self { owner, id }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.id)
    }
}

/// Content address of an encrypted payload in the blob store.
///
/// Rendered as `b3:` followed by the hex Blake3 digest of the stored bytes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadLocator(String);

impl PayloadLocator {
    const PREFIX: &'static str = "b3:";

    /// Derive the locator for a blob.
    pub fn for_content(bytes: &[u8]) -> Self {
        Self(format!("{}{}", Self::PREFIX, Blake3Hash::hash(bytes).to_hex()))
    }

    /// Parse a locator string, checking its shape.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let digest = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| CoreError::InvalidLocator(s.to_string()))?;
        Blake3Hash::from_hex(digest).map_err(|_| CoreError::InvalidLocator(s.to_string()))?;
        Ok(Self(s.to_string()))
    }

    /// Check whether `bytes` hash to this locator.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        *self == Self::for_content(bytes)
    }

    /// The locator string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PayloadLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadLocator({})", &self.0[..self.0.len().min(19)])
    }
}

impl fmt::Display for PayloadLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

//! Authorization snapshot embedded in access tokens.
//!
//! The snapshot carries the role and organization-access claims a request
//! handler needs, so protected requests are authorized without a database
//! round-trip. It must stay compact: organization access is encoded as one
//! of three shapes instead of a full membership list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of hierarchy roots encoded inline. Users with more direct
/// memberships fall back to the explicit id list.
pub const MAX_HIERARCHY_ROOTS: usize = 10;

/// Compact encoding of a user's organization access.
///
/// Serialized forms:
///
/// - `"all"` - super-admin bypass
/// - `{"roots": [...]}` - hierarchy root set; the server expands descendants
///   from a shared cache
/// - `{"ids": [...]}` - explicit id list fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgAccess {
    /// Access to every organization (super-admin).
    All,
    /// Access to these roots and all their descendants.
    #[serde(rename = "roots")]
    HierarchyRoots(Vec<Uuid>),
    /// Access to exactly these organizations.
    #[serde(rename = "ids")]
    Explicit(Vec<Uuid>),
}

impl OrgAccess {
    /// Chooses the compact shape for a user's memberships.
    ///
    /// Root sets up to [`MAX_HIERARCHY_ROOTS`] are encoded as roots;
    /// larger memberships fall back to the explicit list.
    #[must_use]
    pub fn from_memberships(is_super_admin: bool, roots: Vec<Uuid>, explicit: Vec<Uuid>) -> Self {
        if is_super_admin {
            Self::All
        } else if roots.len() <= MAX_HIERARCHY_ROOTS && !roots.is_empty() {
            Self::HierarchyRoots(roots)
        } else {
            Self::Explicit(explicit)
        }
    }

    /// Returns `true` for the super-admin bypass shape.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Role and organization claims embedded in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSnapshot {
    /// Role names granted to the user.
    pub roles: Vec<String>,

    /// Organization access in compact form.
    pub org: OrgAccess,

    /// Per-role permission-cache versions. A bumped version invalidates the
    /// server-side permission cache for that role without reissuing tokens.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub role_versions: BTreeMap<String, u32>,
}

impl AuthorizationSnapshot {
    /// Creates a snapshot with no cache-version map.
    #[must_use]
    pub fn new(roles: Vec<String>, org: OrgAccess) -> Self {
        Self {
            roles,
            org,
            role_versions: BTreeMap::new(),
        }
    }

    /// Returns `true` if the snapshot carries the given role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

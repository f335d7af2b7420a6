use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::models::FileObject;
use crate::domain::value_objects::{BucketId, TypeFamilyId};

/// A named group of file extensions sharing preview and size-limit treatment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeFamilyDescriptor {
    pub id: TypeFamilyId,
    /// Lowercase extensions without the leading dot
    pub extensions: BTreeSet<String>,
    pub mime_hint: String,
    #[serde(default)]
    pub previewable: bool,
    /// Largest accepted object in bytes
    pub max_size: u64,
}

impl TypeFamilyDescriptor {
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.extensions.contains(&extension.to_ascii_lowercase())
    }
}

/// How long objects in a bucket are kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// `None` keeps objects forever
    pub retention_days: Option<u32>,
    /// Objects under legal hold never expire
    #[serde(default)]
    pub legal_hold: bool,
}

impl RetentionPolicy {
    pub fn expires_at(&self, last_modified: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.legal_hold {
            return None;
        }
        self.retention_days
            .map(|days| last_modified + Duration::days(i64::from(days)))
    }
}

/// Security flags carried as opaque policy data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFlags {
    #[serde(default)]
    pub encryption_required: bool,
    #[serde(default)]
    pub contains_phi: bool,
    #[serde(default)]
    pub audit_logging: bool,
}

/// Role name used in permission sets
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Roles allowed to perform each operation on a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub read: BTreeSet<Role>,
    #[serde(default)]
    pub write: BTreeSet<Role>,
    #[serde(default)]
    pub delete: BTreeSet<Role>,
}

/// A top-level storage partition and its policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDescriptor {
    pub id: BucketId,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Ordered: the first family claiming an extension wins
    pub allowed_type_families: Vec<TypeFamilyId>,
    /// Largest accepted object in bytes, independent of the family ceiling
    pub max_object_size: u64,
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub security: SecurityFlags,
    #[serde(default)]
    pub permissions: Permissions,
}

impl BucketDescriptor {
    pub fn allows_family(&self, family: &TypeFamilyId) -> bool {
        self.allowed_type_families.contains(family)
    }

    pub fn is_expired(&self, object: &FileObject, now: DateTime<Utc>) -> bool {
        self.retention
            .expires_at(object.last_modified)
            .map_or(false, |expiry| expiry <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_expiry() {
        let modified = Utc::now() - Duration::days(10);
        let policy = RetentionPolicy {
            retention_days: Some(7),
            legal_hold: false,
        };
        assert!(policy.expires_at(modified).unwrap() < Utc::now());

        let held = RetentionPolicy {
            retention_days: Some(7),
            legal_hold: true,
        };
        assert_eq!(held.expires_at(modified), None);
        assert_eq!(RetentionPolicy::default().expires_at(modified), None);
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::models::{FileObject, FolderDescriptor};
use crate::domain::value_objects::TypeFamilyId;

/// Predicate over object names and types used to narrow a listing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectFilter {
    /// Case-insensitive substring matched against names
    pub search: Option<String>,
    /// Type families to keep; empty keeps every family
    #[serde(default)]
    pub type_families: BTreeSet<TypeFamilyId>,
    /// Object size greater than or equal to this value (in bytes)
    pub min_size: Option<u64>,
    /// Object size less than or equal to this value (in bytes)
    pub max_size: Option<u64>,
}

impl ObjectFilter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = if term.trim().is_empty() {
            None
        } else {
            Some(term.trim().to_lowercase())
        };
        self
    }

    pub fn with_type_family(mut self, family: TypeFamilyId) -> Self {
        self.type_families.insert(family);
        self
    }

    pub fn with_size_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    fn name_matches(&self, name: &str) -> bool {
        match &self.search {
            Some(term) => name.to_lowercase().contains(term.as_str()),
            None => true,
        }
    }

    /// Check if this filter matches a file
    pub fn matches(&self, object: &FileObject) -> bool {
        if !self.name_matches(&object.name) {
            return false;
        }

        if !self.type_families.is_empty() && !self.type_families.contains(&object.type_family) {
            return false;
        }

        if let Some(min) = self.min_size {
            if object.size_bytes < min {
                return false;
            }
        }

        if let Some(max) = self.max_size {
            if object.size_bytes > max {
                return false;
            }
        }

        true
    }

    /// Folders only match on name, and are hidden while a type or size constraint is active
    pub fn matches_folder(&self, folder: &FolderDescriptor) -> bool {
        self.type_families.is_empty()
            && self.min_size.is_none()
            && self.max_size.is_none()
            && self.name_matches(&folder.name)
    }

    /// Check if filter is empty (matches everything)
    pub fn is_empty(&self) -> bool {
        self.search.is_none()
            && self.type_families.is_empty()
            && self.min_size.is_none()
            && self.max_size.is_none()
    }
}

/// Field a listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Size,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::ObjectId;
    use chrono::Utc;

    fn object(name: &str, family: &str, size: u64) -> FileObject {
        FileObject {
            id: ObjectId::generate(),
            name: name.to_string(),
            size_bytes: size,
            type_family: TypeFamilyId::new(family).unwrap(),
            last_modified: Utc::now(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let filter = ObjectFilter::new().with_search("Chest");
        assert!(filter.matches(&object("ct_CHEST_001.dcm", "dicom", 10)));
        assert!(!filter.matches(&object("brain.dcm", "dicom", 10)));
    }

    #[test]
    fn test_type_and_size_constraints() {
        let filter = ObjectFilter::new()
            .with_type_family(TypeFamilyId::new("tabular").unwrap())
            .with_size_range(Some(100), Some(1000));
        assert!(filter.matches(&object("cohort.csv", "tabular", 500)));
        assert!(!filter.matches(&object("cohort.csv", "tabular", 5000)));
        assert!(!filter.matches(&object("scan.dcm", "dicom", 500)));
        assert!(!filter.is_empty());
        assert!(ObjectFilter::new().with_search("   ").is_empty());
    }
}

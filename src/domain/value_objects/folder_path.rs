use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;

const MAX_FOLDER_PATH_LEN: usize = 1024;

/// A validated folder path inside a bucket. The empty path is the bucket root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FolderPath(String);

impl FolderPath {
    /// The bucket root
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse a folder path. A single trailing slash is tolerated.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let mut value = value.into();
        if value.ends_with('/') {
            value.pop();
        }

        if value.is_empty() {
            return Ok(Self::root());
        }

        if value.len() > MAX_FOLDER_PATH_LEN {
            return Err(ValidationError::FolderPathTooLong {
                actual: value.len(),
                max: MAX_FOLDER_PATH_LEN,
            });
        }

        if value.starts_with('/') {
            return Err(ValidationError::FolderPathStartsWithSlash);
        }

        for segment in value.split('/') {
            Self::validate_segment(segment)?;
        }

        Ok(Self(value))
    }

    fn validate_segment(segment: &str) -> Result<(), ValidationError> {
        if segment.is_empty() {
            return Err(ValidationError::FolderPathEmptySegment);
        }
        if segment == "." || segment == ".." {
            return Err(ValidationError::FolderPathRelativeSegment(
                segment.to_string(),
            ));
        }
        if let Some(c) = segment.chars().find(|c| *c == '\0' || c.is_control()) {
            return Err(ValidationError::InvalidFolderPathCharacter(c));
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last segment, or `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn parent(&self) -> Option<FolderPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        })
    }

    /// Append a single segment
    pub fn join(&self, segment: &str) -> Result<FolderPath, ValidationError> {
        Self::validate_segment(segment)?;
        if segment.contains('/') {
            return Err(ValidationError::InvalidFolderPathCharacter('/'));
        }
        if self.is_root() {
            Self::parse(segment)
        } else {
            Self::parse(format!("{}/{}", self.0, segment))
        }
    }

    /// If `self` lies somewhere below `ancestor`, the name of the segment directly under it
    pub fn child_of(&self, ancestor: &FolderPath) -> Option<&str> {
        if self == ancestor {
            return None;
        }
        let rest = if ancestor.is_root() {
            self.0.as_str()
        } else {
            self.0
                .strip_prefix(ancestor.as_str())
                .and_then(|rest| rest.strip_prefix('/'))?
        };
        rest.split('/').next().filter(|s| !s.is_empty())
    }

    /// True when `self` equals `ancestor` or lies below it
    pub fn is_within(&self, ancestor: &FolderPath) -> bool {
        self == ancestor || self.child_of(ancestor).is_some()
    }
}

impl TryFrom<String> for FolderPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<FolderPath> for String {
    fn from(path: FolderPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for FolderPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_folder_paths() {
        assert!(FolderPath::parse("").unwrap().is_root());
        assert!(FolderPath::parse("scans").is_ok());
        assert_eq!(FolderPath::parse("scans/2024/").unwrap().as_str(), "scans/2024");
        assert!(FolderPath::parse("patient 42/ct").is_ok());
    }

    #[test]
    fn test_invalid_folder_paths() {
        assert!(FolderPath::parse("/leading").is_err());
        assert!(FolderPath::parse("double//slash").is_err());
        assert!(FolderPath::parse("up/../escape").is_err());
        assert!(FolderPath::parse("null\0byte").is_err());
        assert!(FolderPath::parse("x".repeat(1025)).is_err());
    }

    #[test]
    fn test_folder_path_relations() {
        let root = FolderPath::root();
        let scans = FolderPath::parse("scans").unwrap();
        let ct = FolderPath::parse("scans/ct/2024").unwrap();

        assert_eq!(ct.child_of(&root), Some("scans"));
        assert_eq!(ct.child_of(&scans), Some("ct"));
        assert_eq!(scans.child_of(&scans), None);
        assert_eq!(FolderPath::parse("scansx").unwrap().child_of(&scans), None);
        assert_eq!(scans.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
        assert_eq!(scans.join("mri").unwrap().as_str(), "scans/mri");
        assert!(scans.join("a/b").is_err());
        assert!(ct.is_within(&scans));
        assert_eq!(ct.name(), Some("2024"));
    }
}

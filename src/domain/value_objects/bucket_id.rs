use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;

/// A validated bucket identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketId(String);

impl BucketId {
    /// Create a new BucketId with S3-compatible naming rules
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.len() < 3 {
            return Err(ValidationError::BucketIdTooShort {
                actual: value.len(),
                min: 3,
            });
        }

        if value.len() > 63 {
            return Err(ValidationError::BucketIdTooLong {
                actual: value.len(),
                max: 63,
            });
        }

        // Must start and end with lowercase letter or number
        if !value
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ValidationError::BucketIdInvalidStart);
        }

        if !value
            .chars()
            .last()
            .map_or(false, |c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(ValidationError::BucketIdInvalidEnd);
        }

        // IP check runs before the character check so "10.0.0.1" gets the clearer error
        if Self::looks_like_ip_address(&value) {
            return Err(ValidationError::BucketIdLooksLikeIpAddress);
        }

        for c in value.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(ValidationError::BucketIdInvalidCharacter(c));
            }
        }

        if value.contains("--") {
            return Err(ValidationError::BucketIdConsecutiveHyphens);
        }

        Ok(Self(value))
    }

    /// For compile-time tables whose values are known to be valid
    pub(crate) fn from_trusted(value: &str) -> Self {
        Self(value.to_string())
    }

    /// Get the bucket id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn looks_like_ip_address(s: &str) -> bool {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return false;
        }

        parts.iter().all(|part| part.parse::<u8>().is_ok())
    }
}

impl TryFrom<String> for BucketId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BucketId> for String {
    fn from(id: BucketId) -> Self {
        id.0
    }
}

impl std::fmt::Display for BucketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_bucket_ids() {
        assert!(BucketId::new("medical-images").is_ok());
        assert!(BucketId::new("bucket123").is_ok());
        assert!(BucketId::new("123bucket").is_ok());
        assert!(BucketId::new("ml-models-2").is_ok());
    }

    #[test]
    fn test_invalid_bucket_ids() {
        assert_eq!(
            BucketId::new("ab"),
            Err(ValidationError::BucketIdTooShort { actual: 2, min: 3 })
        );
        assert!(BucketId::new("a".repeat(64)).is_err());
        assert!(BucketId::new("-bucket").is_err());
        assert!(BucketId::new("bucket-").is_err());
        assert!(BucketId::new("Bucket").is_err());
        assert!(BucketId::new("my_bucket").is_err());
        assert!(BucketId::new("my bucket").is_err());
        assert!(BucketId::new("my--bucket").is_err());
        assert_eq!(
            BucketId::new("192.168.1.1"),
            Err(ValidationError::BucketIdLooksLikeIpAddress)
        );
    }

    #[test]
    fn test_bucket_id_deserializes_with_validation() {
        let id: BucketId = serde_json::from_str("\"genomic-data\"").unwrap();
        assert_eq!(id.as_str(), "genomic-data");
        assert!(serde_json::from_str::<BucketId>("\"Not_Valid\"").is_err());
    }
}

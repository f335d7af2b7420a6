use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::ValidationError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(value: &str) -> Result<Self, ValidationError> {
                if value.is_empty() {
                    return Err(ValidationError::EmptyIdentifier);
                }
                Uuid::parse_str(value)
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidIdentifier {
                        kind: $kind,
                        value: value.to_string(),
                    })
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a stored file object
    ObjectId,
    "object"
);

uuid_identifier!(
    /// Identifier of an upload task
    UploadId,
    "upload"
);

/// Identifier of a type family, e.g. `dicom` or `tabular`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeFamilyId(String);

impl TypeFamilyId {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidIdentifier {
                kind: "type family",
                value,
            });
        }
        Ok(Self(value))
    }

    /// For compile-time tables whose values are known to be valid
    pub(crate) fn from_trusted(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TypeFamilyId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TypeFamilyId> for String {
    fn from(id: TypeFamilyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TypeFamilyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_parse_back() {
        let a = ObjectId::generate();
        let b = ObjectId::generate();
        assert_ne!(a, b);
        assert_eq!(ObjectId::parse(&a.to_string()).unwrap(), a);
    }

    #[test]
    fn test_invalid_ids() {
        assert_eq!(UploadId::parse(""), Err(ValidationError::EmptyIdentifier));
        assert!(UploadId::parse("not-a-uuid").is_err());
        assert!(TypeFamilyId::new("Dicom").is_err());
        assert!(TypeFamilyId::new("").is_err());
        assert!(TypeFamilyId::new("ml_model").is_ok());
    }
}

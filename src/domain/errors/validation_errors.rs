/// Validation errors for domain value objects
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    // BucketId validation errors
    BucketIdTooShort {
        actual: usize,
        min: usize,
    },
    BucketIdTooLong {
        actual: usize,
        max: usize,
    },
    BucketIdInvalidStart,
    BucketIdInvalidEnd,
    BucketIdInvalidCharacter(char),
    BucketIdConsecutiveHyphens,
    BucketIdLooksLikeIpAddress,

    // FolderPath validation errors
    FolderPathTooLong {
        actual: usize,
        max: usize,
    },
    FolderPathStartsWithSlash,
    FolderPathEmptySegment,
    FolderPathRelativeSegment(String),
    InvalidFolderPathCharacter(char),

    // Identifier validation errors
    EmptyIdentifier,
    InvalidIdentifier {
        kind: &'static str,
        value: String,
    },

    // Object name / size validation errors
    EmptyObjectName,
    InvalidObjectNameCharacter(char),
    ReservedObjectName(String),
    InvalidSizeLabel(String),

    InvalidField {
        field: String,
        value: String,
        expected: String,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // BucketId errors
            ValidationError::BucketIdTooShort { actual, min } => {
                write!(
                    f,
                    "Bucket id too short: {} characters (min: {})",
                    actual, min
                )
            }
            ValidationError::BucketIdTooLong { actual, max } => {
                write!(f, "Bucket id too long: {} characters (max: {})", actual, max)
            }
            ValidationError::BucketIdInvalidStart => {
                write!(f, "Bucket id must start with lowercase letter or number")
            }
            ValidationError::BucketIdInvalidEnd => {
                write!(f, "Bucket id must end with lowercase letter or number")
            }
            ValidationError::BucketIdInvalidCharacter(c) => {
                write!(
                    f,
                    "Invalid character in bucket id: '{}'. Only lowercase letters, numbers, and hyphens allowed",
                    c
                )
            }
            ValidationError::BucketIdConsecutiveHyphens => {
                write!(f, "Bucket id cannot contain consecutive hyphens")
            }
            ValidationError::BucketIdLooksLikeIpAddress => {
                write!(f, "Bucket id cannot be formatted as an IP address")
            }

            // FolderPath errors
            ValidationError::FolderPathTooLong { actual, max } => {
                write!(f, "Folder path too long: {} bytes (max: {})", actual, max)
            }
            ValidationError::FolderPathStartsWithSlash => {
                write!(f, "Folder path cannot start with '/'")
            }
            ValidationError::FolderPathEmptySegment => {
                write!(f, "Folder path cannot contain empty segments")
            }
            ValidationError::FolderPathRelativeSegment(segment) => {
                write!(f, "Folder path cannot contain '{}' segments", segment)
            }
            ValidationError::InvalidFolderPathCharacter(c) => {
                write!(f, "Invalid character in folder path: {:?}", c)
            }

            // Identifier errors
            ValidationError::EmptyIdentifier => write!(f, "Identifier cannot be empty"),
            ValidationError::InvalidIdentifier { kind, value } => {
                write!(f, "Invalid {} identifier: '{}'", kind, value)
            }

            // Object errors
            ValidationError::EmptyObjectName => write!(f, "Object name cannot be empty"),
            ValidationError::InvalidObjectNameCharacter(c) => {
                write!(f, "Invalid character in object name: {:?}", c)
            }
            ValidationError::ReservedObjectName(name) => {
                write!(f, "Object name '{}' is reserved", name)
            }
            ValidationError::InvalidSizeLabel(label) => {
                write!(f, "Invalid size label: '{}'", label)
            }

            ValidationError::InvalidField {
                field,
                value,
                expected,
            } => {
                write!(
                    f,
                    "Invalid value for field '{}': '{}' (expected: {})",
                    field, value, expected
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

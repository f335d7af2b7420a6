pub mod errors;
pub mod models;
pub mod value_objects;

// Re-export commonly used types
pub use errors::{BrowserError, BrowserResult, ErrorKind, PolicyViolation, ValidationError};
pub use models::*;
pub use value_objects::*;

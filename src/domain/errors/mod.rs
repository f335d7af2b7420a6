mod browser_errors;
mod validation_errors;

pub use browser_errors::*;
pub use validation_errors::*;

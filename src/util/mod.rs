//! Utility functions for common operations.

mod url_validator;

pub use url_validator::{validate_base_url, UrlValidationError};

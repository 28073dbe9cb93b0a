//! Search query passed to the feed as its `q` parameter.
//!
//! Field names and values are expected to be validated against the feed's
//! field table by the caller. This type only enforces the structural rules
//! every query needs.
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("At least one query parameter is required")]
    Empty,

    #[error("Query field name is empty")]
    EmptyField,

    #[error("Query value for `{0}` is empty")]
    EmptyValue(String),

    #[error("Query argument `{0}` is not of the form FIELD=VALUE")]
    Malformed(String),
}

/// Ordered `(field, value)` pairs rendered as `field:value field:value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Builds a query from already-validated field/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if there are no pairs or a field name or
    /// value is blank.
    pub fn new<I, K, V>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut collected = Vec::new();
        for (field, value) in pairs {
            let field = field.into().trim().to_string();
            let value = value.into().trim().to_string();
            if field.is_empty() {
                return Err(ValidationError::EmptyField);
            }
            if value.is_empty() {
                return Err(ValidationError::EmptyValue(field));
            }
            collected.push((field, value));
        }

        if collected.is_empty() {
            return Err(ValidationError::Empty);
        }
        Ok(Self { pairs: collected })
    }

    /// Parses `FIELD=VALUE` command-line arguments, splitting on the first `=`.
    pub fn from_args<I, S>(args: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pairs = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            let (field, value) = arg
                .split_once('=')
                .ok_or_else(|| ValidationError::Malformed(arg.to_string()))?;
            pairs.push((field.to_string(), value.to_string()));
        }
        Self::new(pairs)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Value of the `q` parameter.
    pub fn search_params(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (field, value)) in self.pairs.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", field, value)?;
        }
        Ok(())
    }
}

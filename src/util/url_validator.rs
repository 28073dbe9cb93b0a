use thiserror::Error;
use url::Url;

/// Errors that can occur during base URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host to connect to.
    #[error("URL has no host")]
    MissingHost,
    /// A fragment would swallow the query parameters appended to the URL.
    #[error("URL must not contain a fragment")]
    Fragment,
}

/// Validates the feed endpoint that page queries are appended to.
///
/// Existing query parameters (e.g. `FEEDNAME=PUBLIC`) are kept; `q` and
/// `start` are added after them.
///
/// # Errors
///
/// Returns [`UrlValidationError`] if:
/// - The URL cannot be parsed ([`UrlValidationError::InvalidUrl`])
/// - The scheme is not `http` or `https` ([`UrlValidationError::UnsupportedScheme`])
/// - There is no host ([`UrlValidationError::MissingHost`])
/// - There is a `#fragment` ([`UrlValidationError::Fragment`])
pub fn validate_base_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(UrlValidationError::MissingHost),
    }

    if url.fragment().is_some() {
        return Err(UrlValidationError::Fragment);
    }

    Ok(url)
}

use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::document::{Document, ParseError};
use super::pagination::PageLink;

/// Simultaneous page requests allowed by default.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_PAGE_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving one page over HTTP.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured deadline
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Why a single page could not be turned into a document.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A page that failed, with the link it was fetched from.
#[derive(Debug, Error)]
#[error("{link}: {error}")]
pub struct PageFailure {
    pub link: PageLink,
    #[source]
    pub error: PageError,
}

/// A successfully fetched and parsed page.
#[derive(Debug)]
pub struct FetchedPage {
    pub link: PageLink,
    pub document: Document,
}

/// Something that can return the raw body behind a page URL.
///
/// [`HttpSource`] is the production implementation; tests substitute
/// in-memory sources.
pub trait PageSource: Send + Sync {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;
}

/// Fetches pages with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_bytes: DEFAULT_MAX_PAGE_BYTES,
        }
    }

    /// Deadline covering the whole request, body included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn get(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(TransportError::Network)?;

        // Non-2xx is fatal for the page; there is no retry
        if !response.status().is_success() {
            tracing::debug!(url = %url, status = %response.status(), "Page request rejected");
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_bytes).await
    }
}

impl PageSource for HttpSource {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, TransportError> {
        tokio::time::timeout(self.timeout, self.get(url))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}

/// Fetches one page and parses the body as soon as it arrives.
pub async fn fetch_page<S: PageSource>(
    source: &S,
    link: PageLink,
) -> Result<FetchedPage, PageFailure> {
    let bytes = match source.fetch(&link.url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return Err(PageFailure {
                link,
                error: e.into(),
            })
        }
    };

    match Document::parse(&bytes) {
        Ok(document) => {
            tracing::debug!(url = %link.url, start = link.start, bytes = bytes.len(), "Fetched page");
            Ok(FetchedPage { link, document })
        }
        Err(e) => Err(PageFailure {
            link,
            error: e.into(),
        }),
    }
}

/// Fetches `links` concurrently, never more than `max_concurrency` at once.
///
/// Pages are yielded in completion order, not input order. Dropping the
/// stream cancels every request still in flight.
pub fn fetch_pages<'a, S: PageSource>(
    source: &'a S,
    links: Vec<PageLink>,
    max_concurrency: usize,
) -> impl Stream<Item = Result<FetchedPage, PageFailure>> + 'a {
    stream::iter(links)
        .map(move |link| fetch_page(source, link))
        .buffer_unordered(max_concurrency.max(1))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(TransportError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

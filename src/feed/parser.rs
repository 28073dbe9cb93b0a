use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use super::document::{Document, Element};
use super::flatten::{flatten_entry, Record};
use super::namespace::NamespaceMap;

static LAST_PAGE_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    // Literal pattern, cannot fail to compile
    Regex::new(r"start=(\d+)").expect("offset pattern is valid")
});

/// Errors raised when the seed page lacks usable pagination metadata.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// No `<link rel="last">` in the feed's primary namespace.
    #[error("Feed has no rel=\"last\" link")]
    MissingLastLink,

    /// The `last` link carries no `href` attribute.
    #[error("rel=\"last\" link has no href")]
    MissingHref,

    /// The `href` has no `start=<digits>` parameter.
    #[error("No start offset in last-page link: {href}")]
    MissingOffset { href: String },

    /// The offset does not fit in a `u64`.
    #[error("Start offset out of range in last-page link: {href}")]
    InvalidOffset { href: String },

    /// The reported total spans more pages than a harvest may fetch.
    #[error("Feed reports {pages} pages, more than the limit of {max_pages}")]
    TooManyPages { pages: u64, max_pages: u64 },
}

/// A parsed feed page with its namespace table.
///
/// Structural queries (entries, the `last` link) only match elements in
/// the primary namespace, i.e. the namespace of the feed's root element.
pub struct FeedPage<'a> {
    document: &'a Document,
    namespaces: NamespaceMap,
}

impl<'a> FeedPage<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            namespaces: NamespaceMap::resolve(document.root()),
        }
    }

    pub fn namespaces(&self) -> &NamespaceMap {
        &self.namespaces
    }

    /// All `entry` elements below the root, in document order.
    pub fn entries(&self) -> Vec<&'a Element> {
        let primary = self.namespaces.primary();
        self.document
            .root()
            .descendants()
            .skip(1)
            .filter(|e| e.is(primary, "entry"))
            .collect()
    }

    /// The first `link` element with `rel="last"`.
    pub fn last_link(&self) -> Option<&'a Element> {
        let primary = self.namespaces.primary();
        self.document
            .root()
            .descendants()
            .skip(1)
            .find(|e| e.is(primary, "link") && e.attribute("rel") == Some("last"))
    }

    /// Total record count reported by the feed.
    ///
    /// The feed does not state a count directly. It is read from the
    /// `start=` parameter of the last-page link, which is the offset the
    /// last page starts at.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError`] if the link, its `href`, or the offset
    /// is missing, or if the offset overflows.
    pub fn total_record_count(&self) -> Result<u64, PaginationError> {
        let link = self.last_link().ok_or(PaginationError::MissingLastLink)?;
        let href = link.attribute("href").ok_or(PaginationError::MissingHref)?;
        let captures =
            LAST_PAGE_OFFSET
                .captures(href)
                .ok_or_else(|| PaginationError::MissingOffset {
                    href: href.to_string(),
                })?;
        captures[1]
            .parse()
            .map_err(|_| PaginationError::InvalidOffset {
                href: href.to_string(),
            })
    }

    /// Flattens every entry on the page.
    pub fn records(&self) -> Vec<Record> {
        self.entries()
            .into_iter()
            .map(|entry| flatten_entry(entry, &self.namespaces))
            .collect()
    }
}

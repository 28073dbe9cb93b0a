use std::fmt;
use url::Url;

use super::parser::PaginationError;
use crate::query::Query;

/// Entries the feed returns per page.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Most pages a single harvest will plan.
pub const DEFAULT_MAX_PAGES: u64 = 100_000;

/// A page request: the full URL and the `start` offset it selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub url: Url,
    pub start: u64,
}

impl PageLink {
    /// The seed request: the base URL plus the query, with no offset.
    pub fn seed(base: &Url, query: &Query) -> Self {
        let mut url = base.clone();
        url.query_pairs_mut()
            .append_pair("q", &query.search_params());
        Self { url, start: 0 }
    }

    /// The page starting at `start`.
    pub fn page(base: &Url, query: &Query, start: u64) -> Self {
        let mut url = base.clone();
        url.query_pairs_mut()
            .append_pair("q", &query.search_params())
            .append_pair("start", &start.to_string());
        Self { url, start }
    }
}

impl fmt::Display for PageLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

/// Page offsets covering a result set.
///
/// `total` is the offset advertised by the seed page's last-page link. The
/// plan covers every multiple of the page size up to and including it, so
/// `total = 25` and `total = 20` both give `[0, 10, 20]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagePlan {
    total: u64,
    page_size: u64,
}

impl PagePlan {
    /// Plans the pages for `total`. A zero page size is treated as one
    /// entry per page.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError::TooManyPages`] when the plan would span
    /// more than `max_pages` pages. The total comes from the remote feed, so
    /// this is checked before any offset is materialized.
    pub fn new(total: u64, page_size: u64, max_pages: u64) -> Result<Self, PaginationError> {
        let plan = Self {
            total,
            page_size: page_size.max(1),
        };
        let pages = plan.page_count();
        if pages > max_pages {
            return Err(PaginationError::TooManyPages { pages, max_pages });
        }
        Ok(plan)
    }

    /// All offsets, seed page (0) included.
    pub fn offsets(&self) -> Vec<u64> {
        (0..=self.total).step_by(self.page_size as usize).collect()
    }

    /// Offsets still to fetch after the seed page.
    pub fn fetch_offsets(&self) -> Vec<u64> {
        self.offsets().into_iter().skip(1).collect()
    }

    /// Number of pages in the result set, seed page included. Saturates
    /// at `u64::MAX`.
    pub fn page_count(&self) -> u64 {
        (self.total / self.page_size).saturating_add(1)
    }

    /// Links for every page except the seed.
    pub fn fetch_links(&self, base: &Url, query: &Query) -> Vec<PageLink> {
        self.fetch_offsets()
            .into_iter()
            .map(|start| PageLink::page(base, query, start))
            .collect()
    }
}

//! Feed retrieval and flattening.
//!
//! This module provides the building blocks of a harvest:
//!
//! - **Parsing**: Turn a response body into a namespace-resolved element tree
//! - **Fetching**: Bounded-concurrency HTTP retrieval of feed pages
//! - **Pagination**: Derive every page offset from the seed page's last-page link
//! - **Flattening**: Collapse each entry into a single-level [`Record`]
//!
//! # Architecture
//!
//! - [`document`] - Element tree built from `quick-xml` events
//! - [`namespace`] - Alias table (`ns0`, `ns1`, ...) and primary namespace
//! - [`flatten`] - Entry to record conversion
//! - [`parser`] - Entry selection and pagination metadata on a parsed page
//! - [`pagination`] - Page offsets and links
//! - [`fetcher`] - HTTP page source and the concurrent fetch stream
//! - [`assembler`] - rayon worker pool producing records from documents

pub mod assembler;
pub mod document;
pub mod fetcher;
pub mod flatten;
pub mod namespace;
pub mod pagination;
pub mod parser;

pub use assembler::{Assembler, WorkerPoolError};
pub use document::{Document, Element, ParseError};
pub use fetcher::{
    fetch_page, fetch_pages, FetchedPage, HttpSource, PageError, PageFailure, PageSource,
    TransportError,
};
pub use flatten::{flatten_entry, Record};
pub use namespace::NamespaceMap;
pub use pagination::{PageLink, PagePlan};
pub use parser::{FeedPage, PaginationError};

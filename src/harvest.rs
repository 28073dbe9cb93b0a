//! Harvest orchestration: seed page, pagination, concurrent fetch, parallel flatten.
use futures::StreamExt;
use serde::Deserialize;
use std::pin::pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::feed::{
    fetch_page, fetch_pages, Assembler, FeedPage, PageError, PageFailure, PageLink, PagePlan,
    PageSource, PaginationError, ParseError, Record, TransportError, WorkerPoolError,
};
use crate::query::Query;

/// What to do when a page after the seed page fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole harvest on the first failed page. In-flight requests
    /// are cancelled and no records are returned.
    #[default]
    Strict,
    /// Keep going and report failed pages next to the records that were
    /// harvested.
    Collect,
}

/// Errors that abort a harvest.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Failed to fetch {url}: {source}")]
    Transport { url: Url, source: TransportError },

    #[error("Failed to parse {url}: {source}")]
    Parse { url: Url, source: ParseError },

    /// The seed page does not say how many records exist.
    #[error("Cannot plan pagination: {0}")]
    Pagination(#[from] PaginationError),

    #[error(transparent)]
    WorkerPool(#[from] WorkerPoolError),

    #[error("Record assembly failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<PageFailure> for HarvestError {
    fn from(failure: PageFailure) -> Self {
        match failure.error {
            PageError::Transport(source) => HarvestError::Transport {
                url: failure.link.url,
                source,
            },
            PageError::Parse(source) => HarvestError::Parse {
                url: failure.link.url,
                source,
            },
        }
    }
}

/// Static parameters of a harvest.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub base_url: Url,
    pub page_size: u64,
    /// Upper bound on the pages one harvest may plan.
    pub max_pages: u64,
    pub max_concurrency: usize,
    pub failure_policy: FailurePolicy,
}

/// Outcome of a successful harvest.
#[derive(Debug)]
pub struct Harvest {
    /// One record per entry, seed page first.
    pub records: Vec<Record>,
    /// Pages that failed under [`FailurePolicy::Collect`]. Always empty
    /// under [`FailurePolicy::Strict`].
    pub failures: Vec<PageFailure>,
    /// Pages fetched and parsed successfully, seed page included.
    pub pages: usize,
}

/// Runs harvests against one page source.
///
/// Each call to [`Harvester::run`] is independent: nothing is cached or
/// carried over between runs.
pub struct Harvester<S> {
    source: S,
    settings: HarvestSettings,
    assembler: Arc<Assembler>,
}

impl<S: PageSource> Harvester<S> {
    pub fn new(source: S, settings: HarvestSettings, assembler: Assembler) -> Self {
        Self {
            source,
            settings,
            assembler: Arc::new(assembler),
        }
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Harvests every record matching `query`.
    ///
    /// # Arguments
    ///
    /// * `query` - Validated search parameters
    /// * `progress_tx` - Optional channel for `(completed, total)` page counts
    ///
    /// # Behavior
    ///
    /// - The seed page is fetched alone; its last-page link sizes the plan
    /// - Remaining pages are fetched concurrently, bounded by `max_concurrency`
    /// - Each body is parsed as soon as it arrives
    /// - Entries are flattened on the assembler pool once every page is in
    ///
    /// # Errors
    ///
    /// A failed seed page or missing pagination metadata always aborts, as
    /// does a reported total spanning more than `max_pages` pages.
    /// Failures on later pages abort under [`FailurePolicy::Strict`] and are
    /// collected under [`FailurePolicy::Collect`].
    pub async fn run(
        &self,
        query: &Query,
        progress_tx: Option<mpsc::Sender<(usize, usize)>>,
    ) -> Result<Harvest, HarvestError> {
        let base = &self.settings.base_url;
        let seed_link = PageLink::seed(base, query);
        tracing::info!(url = %seed_link.url, "Fetching seed page");

        let seed = fetch_page(&self.source, seed_link).await?;
        let total = FeedPage::new(&seed.document).total_record_count()?;
        let plan = PagePlan::new(total, self.settings.page_size, self.settings.max_pages)?;
        let links = plan.fetch_links(base, query);
        let total_pages = links.len() + 1;
        tracing::info!(
            total_records = total,
            pages = total_pages,
            "Planned pagination"
        );

        let mut completed = 1;
        report_progress(progress_tx.as_ref(), completed, total_pages).await;

        let mut documents = Vec::with_capacity(total_pages);
        documents.push(seed.document);
        let mut failures = Vec::new();

        // Dropping the stream on an early return cancels the requests still in flight
        let mut pages = pin!(fetch_pages(
            &self.source,
            links,
            self.settings.max_concurrency
        ));
        while let Some(outcome) = pages.next().await {
            completed += 1;
            report_progress(progress_tx.as_ref(), completed, total_pages).await;

            match outcome {
                Ok(page) => documents.push(page.document),
                Err(failure) => match self.settings.failure_policy {
                    FailurePolicy::Strict => {
                        tracing::warn!(
                            url = %failure.link.url,
                            error = %failure.error,
                            "Page failed, aborting harvest"
                        );
                        return Err(failure.into());
                    }
                    FailurePolicy::Collect => {
                        tracing::warn!(
                            url = %failure.link.url,
                            error = %failure.error,
                            "Page failed, continuing"
                        );
                        failures.push(failure);
                    }
                },
            }
        }

        let fetched = documents.len();
        let assembler = Arc::clone(&self.assembler);
        let records = tokio::task::spawn_blocking(move || assembler.assemble(documents)).await?;

        tracing::info!(
            pages = fetched,
            records = records.len(),
            failed = failures.len(),
            "Harvest complete"
        );

        Ok(Harvest {
            records,
            failures,
            pages: fetched,
        })
    }
}

async fn report_progress(
    progress_tx: Option<&mpsc::Sender<(usize, usize)>>,
    done: usize,
    total: usize,
) {
    if let Some(tx) = progress_tx {
        if let Err(e) = tx.send((done, total)).await {
            tracing::warn!(error = %e, done = done, total = total, "Progress channel send failed (receiver dropped)");
        }
    }
}

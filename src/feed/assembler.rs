use rayon::prelude::*;
use thiserror::Error;

use super::document::Document;
use super::flatten::Record;
use super::parser::FeedPage;

#[derive(Debug, Error)]
#[error("Failed to start worker pool: {0}")]
pub struct WorkerPoolError(#[from] rayon::ThreadPoolBuildError);

/// Fixed-size worker pool that turns documents into records.
///
/// Each worker takes whole documents: it resolves the document's
/// namespaces, selects its entries and flattens them. Workers share
/// nothing mutable. [`Assembler::assemble`] returns only once every
/// document has been processed.
pub struct Assembler {
    pool: rayon::ThreadPool,
}

impl Assembler {
    /// Builds a pool with `workers` threads; `0` means one per logical CPU.
    pub fn new(workers: usize) -> Result<Self, WorkerPoolError> {
        let threads = if workers == 0 {
            num_cpus::get().max(1)
        } else {
            workers
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("feedharvest-worker-{}", idx))
            .build()?;
        tracing::debug!(threads = threads, "Started assembler pool");
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Flattens every entry of every document.
    ///
    /// Records keep their order within a document, and documents keep the
    /// order they were passed in, so the seed page's entries come first
    /// when the seed document is first.
    pub fn assemble(&self, documents: Vec<Document>) -> Vec<Record> {
        let per_document: Vec<Vec<Record>> = self.pool.install(|| {
            documents
                .into_par_iter()
                .map(|document| FeedPage::new(&document).records())
                .collect()
        });

        per_document.into_iter().flatten().collect()
    }
}

//! Harvest paginated Atom feeds into flat key/value records.
//!
//! A harvest fetches one seed page, reads the last-page link to learn how
//! many pages exist, fetches the rest concurrently and flattens every
//! `entry` into a [`Record`] on a worker pool.
//!
//! ```ignore
//! use feedharvest::{Assembler, Config, Harvester, HttpSource, Query};
//!
//! let config = Config::default();
//! let harvester = Harvester::new(
//!     HttpSource::new(reqwest::Client::new()),
//!     config.harvest_settings()?,
//!     Assembler::new(config.workers)?,
//! );
//! let query = Query::new([("AGENCY_CODE", "7504")])?;
//! let harvest = harvester.run(&query, None).await?;
//! ```

pub mod config;
pub mod feed;
pub mod harvest;
pub mod output;
pub mod query;
pub mod util;

pub use config::{Config, ConfigError};
pub use feed::{Assembler, HttpSource, PageFailure, PageSource, Record, TransportError};
pub use harvest::{FailurePolicy, Harvest, HarvestError, HarvestSettings, Harvester};
pub use query::{Query, ValidationError};

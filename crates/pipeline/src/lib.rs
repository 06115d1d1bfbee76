//! Fingertips → warehouse sync pipeline.
//!
//! Each step of a run lives in its own module; [`SyncJob`] runs them in
//! order against an [`IndicatorSource`](ftsync_fingertips::IndicatorSource)
//! and a [`Warehouse`](ftsync_warehouse::Warehouse).

pub mod clean;
pub mod detect;
pub mod error;
pub mod error_log;
pub mod ingest;
pub mod job;
pub mod metadata;
pub mod retry;
pub mod select;
pub mod tracking;
pub mod upload;

pub use error::PipelineError;
pub use job::{RunReport, SyncJob};
pub use metadata::IndicatorCatalog;
pub use select::{Selection, SelectionFlags};

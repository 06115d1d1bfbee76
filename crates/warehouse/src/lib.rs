//! Warehouse access for the sync job.
//!
//! [`Warehouse`] is the seam the pipeline talks to. [`PgWarehouse`] runs it
//! over a single PostgreSQL connection; [`MemoryWarehouse`] keeps tables in
//! process for tests.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod script;
pub mod traits;

pub use error::WarehouseError;
pub use memory::{FailurePlan, MemoryWarehouse};
pub use postgres::PgWarehouse;
pub use script::{load_script, render_update_log_script, UPDATE_LOG_SCRIPT};
pub use traits::{UpdateLogSource, Warehouse};

use ftsync_core::FrameError;
use ftsync_fingertips::SourceError;
use ftsync_warehouse::WarehouseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

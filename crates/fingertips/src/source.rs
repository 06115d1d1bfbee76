//! IndicatorSource trait definition and shared error types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ftsync_core::{Frame, FrameError};

/// Errors that can occur while talking to the indicator source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status} from {url}: {body}")]
    Api { status: u16, url: String, body: String },

    #[error("CSV decoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON decoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response shape: {0}")]
    Shape(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Source of indicator metadata and indicator data.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    /// Metadata for every published indicator, one row per indicator.
    async fn indicator_metadata(&self) -> Result<Frame, SourceError>;

    /// Metadata for every area type, keyed by an `AREA_ID` column.
    async fn area_types(&self) -> Result<Frame, SourceError>;

    /// Area type ids with data available, per indicator id.
    async fn areas_by_indicator(&self) -> Result<BTreeMap<i64, Vec<i64>>, SourceError>;

    /// All data for one indicator at one area type.
    async fn indicator_data(&self, indicator_id: i64, area_id: i64) -> Result<Frame, SourceError>;
}

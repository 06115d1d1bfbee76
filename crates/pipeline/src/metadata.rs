//! Live indicator metadata: the reference-table refresh and the
//! indicator → "Date updated" catalog derived from it.

use std::collections::HashMap;

use chrono::NaiveDate;
use ftsync_core::{Frame, FrameError, TableName, COL_DATE_UPDATED, COL_INDICATOR_ID};
use ftsync_warehouse::Warehouse;
use tracing::{info, warn};

use crate::upload::upload_frame;

/// Parse a source date: `dd/mm/YYYY`, or ISO once already normalised.
pub fn parse_source_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}

/// Live "Date updated" per indicator, in metadata order.
#[derive(Debug, Clone, Default)]
pub struct IndicatorCatalog {
    order: Vec<i64>,
    dates: HashMap<i64, NaiveDate>,
}

impl IndicatorCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = (i64, NaiveDate)>) -> Self {
        let mut catalog = Self::default();
        for (id, date) in entries {
            catalog.insert(id, date);
        }
        catalog
    }

    /// First entry per indicator wins.
    fn insert(&mut self, indicator_id: i64, date: NaiveDate) {
        if !self.dates.contains_key(&indicator_id) {
            self.order.push(indicator_id);
            self.dates.insert(indicator_id, date);
        }
    }

    pub fn date_updated(&self, indicator_id: i64) -> Option<NaiveDate> {
        self.dates.get(&indicator_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, NaiveDate)> + '_ {
        self.order.iter().map(|id| (*id, self.dates[id]))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Rewrite "Date updated" to ISO dates and collect the catalog.
///
/// Rows with an unreadable id or date stay in the frame (date set to NULL)
/// but are left out of the catalog.
pub fn prepare_indicator_metadata(frame: &mut Frame) -> Result<IndicatorCatalog, FrameError> {
    let id_idx = frame
        .column_index(COL_INDICATOR_ID)
        .ok_or_else(|| FrameError::ColumnNotFound(COL_INDICATOR_ID.into()))?;
    let date_idx = frame
        .column_index(COL_DATE_UPDATED)
        .ok_or_else(|| FrameError::ColumnNotFound(COL_DATE_UPDATED.into()))?;

    let mut catalog = IndicatorCatalog::default();
    for row in &mut frame.rows {
        let date = row[date_idx].as_deref().and_then(parse_source_date);
        let id = row[id_idx].as_deref().and_then(|v| v.trim().parse::<i64>().ok());

        row[date_idx] = date.map(|d| d.format("%Y-%m-%d").to_string());

        match (id, date) {
            (Some(id), Some(date)) => catalog.insert(id, date),
            (id, _) => warn!(
                indicator_id = ?id,
                "Indicator metadata row without a usable id or date; left out of update detection"
            ),
        }
    }
    Ok(catalog)
}

/// Replace a metadata table with a fresh snapshot.
pub async fn refresh_metadata_table(
    warehouse: &mut dyn Warehouse,
    frame: Frame,
    destination: &TableName,
    chunk_rows: usize,
) -> bool {
    info!(table = %destination, rows = frame.row_count(), "Refreshing metadata");
    upload_frame(warehouse, frame, destination, true, chunk_rows).await
}

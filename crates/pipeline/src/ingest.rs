use chrono::NaiveDate;
use ftsync_core::{Frame, TableName, COL_DATE_UPDATED_LOCAL};
use ftsync_warehouse::Warehouse;

use crate::upload::upload_frame;

/// Stamp `DATE_UPDATED_LOCAL` on every row and append to the fact table.
pub async fn ingest_indicator_data(
    warehouse: &mut dyn Warehouse,
    mut frame: Frame,
    date_updated: NaiveDate,
    destination: &TableName,
    chunk_rows: usize,
) -> bool {
    frame.set_column(
        COL_DATE_UPDATED_LOCAL,
        Some(date_updated.format("%Y-%m-%d").to_string()),
    );
    upload_frame(warehouse, frame, destination, false, chunk_rows).await
}

//! Indicator-level record of the latest ingested "Date updated".

use chrono::NaiveDate;
use ftsync_core::TableName;
use ftsync_warehouse::{Warehouse, WarehouseError};
use tracing::{error, info, warn};

async fn swap_latest(
    warehouse: &mut dyn Warehouse,
    table: &TableName,
    indicator_id: i64,
    date_updated: NaiveDate,
) -> Result<u64, WarehouseError> {
    warehouse.begin().await?;
    let stale = warehouse.mark_not_latest(table, indicator_id).await?;
    warehouse.insert_latest(table, indicator_id, date_updated).await?;
    warehouse.commit().await?;
    Ok(stale)
}

/// Mark `date_updated` as the latest ingested date for `indicator_id`.
///
/// Previous rows are flagged stale in the same transaction. On failure
/// both statements are rolled back and the indicator is picked up again
/// next run.
pub async fn record_latest_update(
    warehouse: &mut dyn Warehouse,
    table: &TableName,
    indicator_id: i64,
    date_updated: NaiveDate,
) -> bool {
    match swap_latest(warehouse, table, indicator_id, date_updated).await {
        Ok(stale) => {
            info!(indicator_id, %date_updated, stale, table = %table, "Updated local tracking");
            true
        }
        Err(e) => {
            error!(indicator_id, error = %e, "Tracking update failed");
            if let Err(rb) = warehouse.rollback().await {
                warn!(error = %rb, "Rollback failed");
            }
            false
        }
    }
}

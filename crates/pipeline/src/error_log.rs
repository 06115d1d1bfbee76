use ftsync_core::{TableName, TargetPair};
use ftsync_warehouse::Warehouse;
use tracing::{error, info, warn};

/// Record a pair that could not be fetched. Failures are logged and swallowed.
pub async fn log_ingestion_error(
    warehouse: &mut dyn Warehouse,
    table: &TableName,
    pair: TargetPair,
) -> bool {
    match warehouse.insert_error(table, pair).await {
        Ok(()) => {
            info!(
                indicator_id = pair.indicator_id,
                area_id = pair.area_id,
                table = %table,
                "Logged ingestion error"
            );
            true
        }
        Err(e) => {
            error!(
                indicator_id = pair.indicator_id,
                area_id = pair.area_id,
                error = %e,
                "Failed to log ingestion error"
            );
            if let Err(rb) = warehouse.rollback().await {
                warn!(error = %rb, "Rollback failed");
            }
            false
        }
    }
}

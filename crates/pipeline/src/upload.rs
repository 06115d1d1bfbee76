//! Frame upload with optional replace.

use ftsync_core::{Frame, TableName};
use ftsync_warehouse::{Warehouse, WarehouseError};
use tracing::{error, info, warn};

async fn write(
    warehouse: &mut dyn Warehouse,
    frame: &Frame,
    destination: &TableName,
    replace: bool,
    chunk_rows: usize,
) -> Result<u64, WarehouseError> {
    warehouse.begin().await?;
    if replace {
        warehouse.truncate(destination).await?;
    }
    let rows = warehouse.append(destination, frame, chunk_rows).await?;
    warehouse.commit().await?;
    Ok(rows)
}

/// Upload `frame` to `destination`, truncating it first when `replace` is set.
///
/// Null placeholders are sent as real NULLs. Truncate and append share one
/// transaction, so a failed replace keeps the previous contents. Returns
/// `true` only if the rows were committed.
pub async fn upload_frame(
    warehouse: &mut dyn Warehouse,
    mut frame: Frame,
    destination: &TableName,
    replace: bool,
    chunk_rows: usize,
) -> bool {
    frame.normalize_nulls();

    match write(warehouse, &frame, destination, replace, chunk_rows).await {
        Ok(rows) => {
            info!(table = %destination, rows, replace, "Uploaded {} rows to {}", rows, destination);
            true
        }
        Err(e) => {
            error!(table = %destination, error = %e, "Data ingestion failed");
            if let Err(rb) = warehouse.rollback().await {
                warn!(table = %destination, error = %rb, "Rollback failed");
            }
            false
        }
    }
}

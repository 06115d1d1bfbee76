//! Update detection: which indicators have newer data at the source than
//! has been ingested locally.

use std::collections::HashMap;

use chrono::NaiveDate;
use ftsync_core::{IndicatorScope, LocalUpdate};
use ftsync_warehouse::{UpdateLogSource, Warehouse, WarehouseError};
use tracing::info;

use crate::metadata::IndicatorCatalog;

/// Indicators in `scope` whose live date is strictly newer than the local
/// one, or that have never been ingested. Follows catalog order.
pub fn indicators_needing_update(
    catalog: &IndicatorCatalog,
    local: &[LocalUpdate],
    scope: &IndicatorScope,
) -> Vec<i64> {
    let mut latest_local: HashMap<i64, NaiveDate> = HashMap::new();
    for entry in local {
        let date = latest_local.entry(entry.indicator_id).or_insert(entry.date_updated);
        if entry.date_updated > *date {
            *date = entry.date_updated;
        }
    }

    catalog
        .iter()
        .filter(|(id, _)| scope.contains(*id))
        .filter(|(id, live)| match latest_local.get(id) {
            Some(local) => live > local,
            None => true,
        })
        .map(|(id, _)| id)
        .collect()
}

/// Read the local update log and compare it with the live catalog.
pub async fn check_for_updates(
    warehouse: &mut dyn Warehouse,
    catalog: &IndicatorCatalog,
    scope: &IndicatorScope,
    log_source: &UpdateLogSource,
) -> Result<Vec<i64>, WarehouseError> {
    let local = warehouse.local_update_log(log_source).await?;
    let updated = indicators_needing_update(catalog, &local, scope);
    info!(
        live = catalog.len(),
        local = local.len(),
        updated = updated.len(),
        "Checked indicators for updates"
    );
    Ok(updated)
}

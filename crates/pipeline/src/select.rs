//! Target-pair selection: which (indicator, area) pairs a run loads.

use std::collections::{BTreeMap, HashSet};

use ftsync_core::config::{RunConfig, TableConfig};
use ftsync_core::TargetPair;
use ftsync_warehouse::{
    load_script, render_update_log_script, UpdateLogSource, Warehouse, WarehouseError,
    UPDATE_LOG_SCRIPT,
};
use tracing::{info, warn};

use crate::detect::check_for_updates;
use crate::metadata::IndicatorCatalog;

/// Which selection criteria are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionFlags {
    pub updated_indicators: bool,
    pub area_mismatch: bool,
    pub ingestion_errors: bool,
    pub dedupe: bool,
}

impl Default for SelectionFlags {
    fn default() -> Self {
        Self {
            updated_indicators: true,
            area_mismatch: true,
            ingestion_errors: true,
            dedupe: true,
        }
    }
}

impl SelectionFlags {
    pub fn from_run_config(run: &RunConfig) -> Self {
        Self {
            dedupe: run.dedupe_target_pairs,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Pairs to process, in order.
    pub pairs: Vec<TargetPair>,
    /// Indicators flagged by update detection.
    pub updated_indicators: Vec<i64>,
}

/// One pair per available area for each updated indicator.
pub fn expand_updated_indicators(
    updated: &[i64],
    availability: &BTreeMap<i64, Vec<i64>>,
) -> Vec<TargetPair> {
    let mut pairs = Vec::new();
    for &indicator_id in updated {
        match availability.get(&indicator_id) {
            Some(areas) => pairs.extend(areas.iter().map(|&a| TargetPair::new(indicator_id, a))),
            None => warn!(indicator_id, "Updated indicator has no available areas"),
        }
    }
    pairs
}

/// Drop repeated pairs, keeping the first occurrence. Returns the number dropped.
pub fn dedupe_pairs(pairs: &mut Vec<TargetPair>) -> usize {
    let before = pairs.len();
    let mut seen = HashSet::with_capacity(before);
    pairs.retain(|p| seen.insert(*p));
    before - pairs.len()
}

/// Cap the run at `limit` pairs without splitting an indicator: when the
/// cut falls inside an indicator, all of that indicator's pairs are kept.
/// A limit of 0 disables the cap.
pub fn apply_limit(pairs: Vec<TargetPair>, limit: Option<usize>) -> Vec<TargetPair> {
    let Some(limit) = limit.filter(|&l| l > 0) else {
        return pairs;
    };
    if limit >= pairs.len() {
        return pairs;
    }
    let boundary = pairs[limit].indicator_id;
    pairs
        .into_iter()
        .enumerate()
        .filter(|(idx, pair)| *idx < limit || pair.indicator_id == boundary)
        .map(|(_, pair)| pair)
        .collect()
}

/// Collect pairs from every enabled criterion, in order: updated
/// indicators, area mismatches, unresolved ingestion errors.
///
/// A criterion that fails to read is logged and contributes nothing.
pub async fn select_target_pairs(
    warehouse: &mut dyn Warehouse,
    catalog: &IndicatorCatalog,
    availability: &BTreeMap<i64, Vec<i64>>,
    tables: &TableConfig,
    run: &RunConfig,
    flags: SelectionFlags,
) -> Selection {
    let mut selection = Selection::default();

    if flags.updated_indicators {
        match update_log_source(tables) {
            Ok(source) => {
                match check_for_updates(warehouse, catalog, &run.indicators, &source).await {
                    Ok(updated) => {
                        let pairs = expand_updated_indicators(&updated, availability);
                        info!(
                            indicators = updated.len(),
                            pairs = pairs.len(),
                            "Selected pairs for updated indicators"
                        );
                        selection.pairs.extend(pairs);
                        selection.updated_indicators = updated;
                    }
                    Err(e) => warn!(error = %e, "Update detection failed; skipping updated indicators"),
                }
            }
            Err(e) => warn!(error = %e, "Update log script unavailable; skipping updated indicators"),
        }
    }

    if flags.area_mismatch {
        match warehouse.area_mismatches(&tables.area_mismatch).await {
            Ok(pairs) => {
                info!(table = %tables.area_mismatch, pairs = pairs.len(), "Selected area mismatch pairs");
                selection.pairs.extend(pairs);
            }
            Err(e) => warn!(table = %tables.area_mismatch, error = %e, "Reading area mismatches failed"),
        }
    }

    if flags.ingestion_errors {
        match warehouse
            .unresolved_errors(&tables.ingestion_error_log, &tables.data)
            .await
        {
            Ok(pairs) => {
                info!(
                    table = %tables.ingestion_error_log,
                    pairs = pairs.len(),
                    "Selected unresolved ingestion error pairs"
                );
                selection.pairs.extend(pairs);
            }
            Err(e) => warn!(
                table = %tables.ingestion_error_log,
                error = %e,
                "Reading ingestion errors failed"
            ),
        }
    }

    if flags.dedupe {
        let dropped = dedupe_pairs(&mut selection.pairs);
        if dropped > 0 {
            info!(dropped, "Dropped duplicate target pairs");
        }
    }

    let total = selection.pairs.len();
    selection.pairs = apply_limit(std::mem::take(&mut selection.pairs), run.limit);
    if selection.pairs.len() < total {
        info!(kept = selection.pairs.len(), total, "Run limit applied");
    }
    selection
}

/// The tracking table when configured, otherwise the update-log script.
fn update_log_source(tables: &TableConfig) -> Result<UpdateLogSource, WarehouseError> {
    if let Some(tracking) = &tables.update_tracking {
        return Ok(UpdateLogSource::TrackingTable(tracking.clone()));
    }
    let script = load_script(&tables.scripts_dir, UPDATE_LOG_SCRIPT)?;
    Ok(UpdateLogSource::Script(render_update_log_script(&script, &tables.data)))
}

//! One sync run: metadata refresh, selection, then the per-pair load loop.

use std::collections::HashSet;
use std::fmt;

use ftsync_core::{SyncConfig, TargetPair};
use ftsync_fingertips::IndicatorSource;
use ftsync_warehouse::Warehouse;
use serde::Serialize;
use tracing::{info, warn};

use crate::clean::clean_area_frame;
use crate::error::PipelineError;
use crate::error_log::log_ingestion_error;
use crate::ingest::ingest_indicator_data;
use crate::metadata::{prepare_indicator_metadata, refresh_metadata_table, IndicatorCatalog};
use crate::retry::retry;
use crate::select::{select_target_pairs, SelectionFlags};
use crate::tracking::record_latest_update;

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub pairs_selected: usize,
    pub pairs_loaded: usize,
    pub pairs_no_data: usize,
    pub fetch_failures: usize,
    pub upload_failures: usize,
    pub skipped_no_metadata: usize,
    pub rows_loaded: usize,
    pub tracking_updates: usize,
    /// `None` when the refresh was not attempted.
    pub indicator_metadata_refreshed: Option<bool>,
    pub area_metadata_refreshed: Option<bool>,
}

impl RunReport {
    pub fn log(&self) {
        info!(
            pairs_selected = self.pairs_selected,
            pairs_loaded = self.pairs_loaded,
            pairs_no_data = self.pairs_no_data,
            fetch_failures = self.fetch_failures,
            upload_failures = self.upload_failures,
            skipped_no_metadata = self.skipped_no_metadata,
            rows = self.rows_loaded,
            tracking_updates = self.tracking_updates,
            "Sync run finished"
        );
    }

    /// True when every selected pair was either loaded or had no data.
    pub fn is_clean(&self) -> bool {
        self.fetch_failures == 0 && self.upload_failures == 0 && self.skipped_no_metadata == 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn refreshed(flag: Option<bool>) -> &'static str {
            match flag {
                Some(true) => "ok",
                Some(false) => "failed",
                None => "skipped",
            }
        }
        write!(
            f,
            "{} pairs selected, {} loaded ({} rows), {} without data, {} fetch failures, \
             {} upload failures, {} skipped; {} tracking updates; metadata: indicators {}, areas {}",
            self.pairs_selected,
            self.pairs_loaded,
            self.rows_loaded,
            self.pairs_no_data,
            self.fetch_failures,
            self.upload_failures,
            self.skipped_no_metadata,
            self.tracking_updates,
            refreshed(self.indicator_metadata_refreshed),
            refreshed(self.area_metadata_refreshed),
        )
    }
}

/// Runs a sync against a source and a warehouse.
pub struct SyncJob<S, W> {
    config: SyncConfig,
    source: S,
    warehouse: W,
    flags: SelectionFlags,
    refresh_metadata: bool,
}

impl<S: IndicatorSource, W: Warehouse> SyncJob<S, W> {
    pub fn new(config: SyncConfig, source: S, warehouse: W) -> Self {
        let flags = SelectionFlags::from_run_config(&config.run);
        Self {
            config,
            source,
            warehouse,
            flags,
            refresh_metadata: true,
        }
    }

    pub fn with_flags(mut self, flags: SelectionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_metadata_refresh(mut self, refresh: bool) -> Self {
        self.refresh_metadata = refresh;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn into_warehouse(self) -> W {
        self.warehouse
    }

    /// Run every step once.
    ///
    /// Only reading the live metadata can fail the run. Per-table and per-pair
    /// failures are logged, counted in the report and skipped.
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();
        let tables = &self.config.tables;
        let run = &self.config.run;

        // 1. Live metadata
        let mut indicator_meta = self.source.indicator_metadata().await?;
        let catalog = prepare_indicator_metadata(&mut indicator_meta)?;
        info!(indicators = catalog.len(), "Fetched indicator metadata");

        if self.refresh_metadata {
            let area_meta = self.source.area_types().await?;
            report.indicator_metadata_refreshed = Some(
                refresh_metadata_table(
                    &mut self.warehouse,
                    indicator_meta,
                    &tables.meta_indicator,
                    run.upload_chunk_rows,
                )
                .await,
            );
            report.area_metadata_refreshed = Some(
                refresh_metadata_table(
                    &mut self.warehouse,
                    area_meta,
                    &tables.meta_area,
                    run.upload_chunk_rows,
                )
                .await,
            );
        }

        // 2-3. Update detection and pair selection
        let availability = if self.flags.updated_indicators {
            self.source.areas_by_indicator().await?
        } else {
            Default::default()
        };
        let selection = select_target_pairs(
            &mut self.warehouse,
            &catalog,
            &availability,
            tables,
            run,
            self.flags,
        )
        .await;
        report.pairs_selected = selection.pairs.len();
        info!(pairs = report.pairs_selected, "Target pairs selected");

        // 4. Load loop
        let mut attempted: HashSet<i64> = HashSet::new();
        let mut failed: HashSet<i64> = HashSet::new();
        for (idx, pair) in selection.pairs.iter().enumerate() {
            info!(
                indicator_id = pair.indicator_id,
                area_id = pair.area_id,
                "{} Processing: Indicator - {}, Area - {}",
                idx,
                pair.indicator_id,
                pair.area_id
            );
            attempted.insert(pair.indicator_id);
            if !self.process_pair(*pair, &catalog, &mut report).await {
                failed.insert(pair.indicator_id);
            }
        }

        // 5. Tracking for fully loaded updated indicators
        if let Some(tracking) = &self.config.tables.update_tracking {
            for &indicator_id in &selection.updated_indicators {
                if !attempted.contains(&indicator_id) || failed.contains(&indicator_id) {
                    continue;
                }
                let Some(date) = catalog.date_updated(indicator_id) else {
                    continue;
                };
                if record_latest_update(&mut self.warehouse, tracking, indicator_id, date).await {
                    report.tracking_updates += 1;
                }
            }
        }

        report.log();
        Ok(report)
    }

    /// Fetch, clean and load one pair. Returns `false` if the pair failed.
    async fn process_pair(
        &mut self,
        pair: TargetPair,
        catalog: &IndicatorCatalog,
        report: &mut RunReport,
    ) -> bool {
        let tables = &self.config.tables;
        let run = &self.config.run;

        let Some(date_updated) = catalog.date_updated(pair.indicator_id) else {
            warn!(
                indicator_id = pair.indicator_id,
                area_id = pair.area_id,
                "Indicator missing from live metadata; skipping"
            );
            report.skipped_no_metadata += 1;
            return false;
        };

        let source = &self.source;
        let fetched = retry(run.fetch_max_attempts, "Fetching indicator data", move |_| {
            source.indicator_data(pair.indicator_id, pair.area_id)
        })
        .await;

        let mut frame = match fetched {
            Ok(frame) => frame,
            Err(_) => {
                report.fetch_failures += 1;
                log_ingestion_error(&mut self.warehouse, &tables.ingestion_error_log, pair).await;
                return false;
            }
        };

        clean_area_frame(&mut frame, pair.area_id);
        if frame.is_empty() {
            info!(
                indicator_id = pair.indicator_id,
                area_id = pair.area_id,
                "No data found"
            );
            report.pairs_no_data += 1;
            return true;
        }

        let rows = frame.row_count();
        if ingest_indicator_data(
            &mut self.warehouse,
            frame,
            date_updated,
            &tables.data,
            run.upload_chunk_rows,
        )
        .await
        {
            report.pairs_loaded += 1;
            report.rows_loaded += rows;
            true
        } else {
            report.upload_failures += 1;
            false
        }
    }
}

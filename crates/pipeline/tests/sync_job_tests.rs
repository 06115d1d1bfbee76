//! End-to-end runs of the sync job against a scripted source and the
//! in-memory warehouse.

mod common;

use chrono::NaiveDate;
use common::{config, indicator_data, indicator_metadata, table, FakeSource};
use ftsync_core::{Frame, LocalUpdate, SyncConfig, TargetPair};
use ftsync_pipeline::{PipelineError, SelectionFlags, SyncJob};
use ftsync_warehouse::{MemoryWarehouse, Warehouse};

fn pair(indicator_id: i64, area_id: i64) -> TargetPair {
    TargetPair::new(indicator_id, area_id)
}

fn only(updated: bool, mismatch: bool, errors: bool) -> SelectionFlags {
    SelectionFlags {
        updated_indicators: updated,
        area_mismatch: mismatch,
        ingestion_errors: errors,
        dedupe: true,
    }
}

fn pairs_frame(pairs: &[(i64, i64)]) -> Frame {
    Frame::from_rows(
        vec!["INDICATOR_ID".into(), "AREA_ID".into()],
        pairs
            .iter()
            .map(|(i, a)| vec![Some(i.to_string()), Some(a.to_string())])
            .collect(),
    )
    .unwrap()
}

fn fact_appends(wh: &MemoryWarehouse) -> usize {
    let prefix = format!("append {} ", table("INDICATOR_DATA"));
    wh.journal().iter().filter(|op| op.starts_with(&prefix)).count()
}

fn job(
    config: SyncConfig,
    source: FakeSource,
    wh: MemoryWarehouse,
    flags: SelectionFlags,
) -> SyncJob<FakeSource, MemoryWarehouse> {
    SyncJob::new(config, source, wh)
        .with_flags(flags)
        .with_metadata_refresh(false)
}

#[tokio::test]
async fn updated_indicator_loads_one_write_per_area() {
    let source = FakeSource::new(indicator_metadata(&[(90362, "01/06/2024")]))
        .with_areas(90362, &[15, 101, 402])
        .with_data(pair(90362, 15), indicator_data(90362, 2))
        .with_data(pair(90362, 101), indicator_data(90362, 2))
        .with_data(pair(90362, 402), indicator_data(90362, 2));

    let mut job = job(config(), source, MemoryWarehouse::new(), only(true, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.pairs_selected, 3);
    assert_eq!(report.pairs_loaded, 3);
    assert!(report.is_clean());
    assert_eq!(
        job.source().calls(),
        vec![pair(90362, 15), pair(90362, 101), pair(90362, 402)]
    );

    let wh = job.warehouse();
    assert_eq!(fact_appends(wh), 3);

    // National row kept for area 15 only.
    let facts = wh.table(&table("INDICATOR_DATA")).unwrap();
    assert_eq!(facts.row_count(), 3 + 2 + 2);
    assert_eq!(report.rows_loaded, 7);
    assert!(facts
        .column_values("DATE_UPDATED_LOCAL")
        .unwrap()
        .iter()
        .all(|d| *d == Some("2024-06-01")));
    assert_eq!(
        facts.column_values("AREA_ID").unwrap(),
        vec![
            Some("15"),
            Some("15"),
            Some("15"),
            Some("101"),
            Some("101"),
            Some("402"),
            Some("402")
        ]
    );
}

#[tokio::test]
async fn fetch_failing_twice_logs_one_error_and_continues() {
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024"), (2, "01/06/2024")]))
        .with_areas(1, &[101])
        .with_areas(2, &[101])
        .failing(pair(1, 101), 2)
        .with_data(pair(2, 101), indicator_data(2, 3));

    let mut job = job(config(), source, MemoryWarehouse::new(), only(true, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.pairs_loaded, 1);
    assert_eq!(
        job.source().calls(),
        vec![pair(1, 101), pair(1, 101), pair(2, 101)]
    );

    let wh = job.warehouse();
    let errors = wh.table(&table("INGESTION_ERROR_LOG")).unwrap();
    assert_eq!(errors.row_count(), 1);
    assert_eq!(errors.get_value(0, "INDICATOR_ID"), Some("1"));
    assert_eq!(errors.get_value(0, "AREA_ID"), Some("101"));

    let facts = wh.table(&table("INDICATOR_DATA")).unwrap();
    assert!(facts
        .column_values("Indicator ID")
        .unwrap()
        .iter()
        .all(|id| *id == Some("2")));
}

#[tokio::test]
async fn single_failure_is_retried_without_error_row() {
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024")]))
        .with_areas(1, &[101])
        .failing(pair(1, 101), 1)
        .with_data(pair(1, 101), indicator_data(1, 1));

    let mut job = job(config(), source, MemoryWarehouse::new(), only(true, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.fetch_failures, 0);
    assert_eq!(report.pairs_loaded, 1);
    assert!(job.warehouse().table(&table("INGESTION_ERROR_LOG")).is_none());
}

#[tokio::test]
async fn up_to_date_indicators_are_not_fetched() {
    let june = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let wh = MemoryWarehouse::new().with_local_log(vec![LocalUpdate {
        indicator_id: 1,
        date_updated: june,
    }]);
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024"), (2, "01/06/2024")]))
        .with_areas(1, &[101])
        .with_areas(2, &[402]);

    let mut job = job(config(), source, wh, only(true, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.pairs_selected, 1);
    assert_eq!(job.source().calls(), vec![pair(2, 402)]);
}

#[tokio::test]
async fn mismatches_and_unresolved_errors_are_reloaded() {
    let mut wh = MemoryWarehouse::new()
        .with_table(table("AREA_MISMATCH"), pairs_frame(&[(5, 101), (6, 402)]));
    wh.insert_error(&table("INGESTION_ERROR_LOG"), pair(6, 402))
        .await
        .unwrap();
    wh.insert_error(&table("INGESTION_ERROR_LOG"), pair(7, 15))
        .await
        .unwrap();

    let source = FakeSource::new(indicator_metadata(&[
        (5, "01/06/2024"),
        (6, "01/06/2024"),
        (7, "01/06/2024"),
    ]))
    .with_data(pair(5, 101), indicator_data(5, 1))
    .with_data(pair(6, 402), indicator_data(6, 1))
    .with_data(pair(7, 15), indicator_data(7, 1));

    let mut job = job(config(), source, wh, only(false, true, true));
    let report = job.run().await.unwrap();

    // (6, 402) appears in both criteria and is fetched once.
    assert_eq!(report.pairs_selected, 3);
    assert_eq!(
        job.source().calls(),
        vec![pair(5, 101), pair(6, 402), pair(7, 15)]
    );

    let mut wh = job.into_warehouse();
    let pending = wh
        .unresolved_errors(&table("INGESTION_ERROR_LOG"), &table("INDICATOR_DATA"))
        .await
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn duplicates_are_kept_when_dedupe_is_off() {
    let wh = MemoryWarehouse::new()
        .with_table(table("AREA_MISMATCH"), pairs_frame(&[(5, 101), (5, 101)]));
    let source = FakeSource::new(indicator_metadata(&[(5, "01/06/2024")]))
        .with_data(pair(5, 101), indicator_data(5, 1));

    let mut flags = only(false, true, false);
    flags.dedupe = false;
    let mut job = job(config(), source, wh, flags);
    let report = job.run().await.unwrap();

    assert_eq!(report.pairs_selected, 2);
    assert_eq!(job.source().calls(), vec![pair(5, 101), pair(5, 101)]);
    assert_eq!(fact_appends(job.warehouse()), 2);
}

#[tokio::test]
async fn pairs_without_metadata_are_skipped() {
    let wh = MemoryWarehouse::new()
        .with_table(table("AREA_MISMATCH"), pairs_frame(&[(999, 101)]));
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024")]));

    let mut job = job(config(), source, wh, only(false, true, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.skipped_no_metadata, 1);
    assert!(job.source().calls().is_empty());
    assert_eq!(fact_appends(job.warehouse()), 0);
}

#[tokio::test]
async fn national_only_data_counts_as_no_data() {
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024")]))
        .with_areas(1, &[101])
        .with_data(pair(1, 101), indicator_data(1, 0));

    let mut job = job(config(), source, MemoryWarehouse::new(), only(true, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.pairs_no_data, 1);
    assert_eq!(report.pairs_loaded, 0);
    assert_eq!(fact_appends(job.warehouse()), 0);
}

#[tokio::test]
async fn run_limit_never_splits_an_indicator() {
    let mut config = config();
    config.run.limit = Some(1);
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024"), (2, "01/06/2024")]))
        .with_areas(1, &[15, 101])
        .with_areas(2, &[101]);

    let mut job = job(config, source, MemoryWarehouse::new(), only(true, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.pairs_selected, 2);
    assert_eq!(job.source().calls(), vec![pair(1, 15), pair(1, 101)]);
}

#[tokio::test]
async fn tracking_records_only_fully_loaded_indicators() {
    let mut config = config();
    config.tables.update_tracking = Some(table("INDICATOR_UPDATES"));
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024"), (2, "02/06/2024")]))
        .with_areas(1, &[101])
        .with_areas(2, &[101, 402])
        .with_data(pair(1, 101), indicator_data(1, 1))
        .with_data(pair(2, 101), indicator_data(2, 1))
        .failing(pair(2, 402), 2);

    let mut first = job(config.clone(), source, MemoryWarehouse::new(), only(true, false, false));
    let report = first.run().await.unwrap();
    assert_eq!(report.tracking_updates, 1);

    let tracked = first.warehouse().table(&table("INDICATOR_UPDATES")).unwrap();
    assert_eq!(tracked.row_count(), 1);
    assert_eq!(tracked.get_value(0, "INDICATOR_ID"), Some("1"));
    assert_eq!(tracked.get_value(0, "DATE_UPDATED"), Some("2024-06-01"));

    // Next run: indicator 1 is current, indicator 2 is selected again.
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024"), (2, "02/06/2024")]))
        .with_areas(1, &[101])
        .with_areas(2, &[101, 402]);
    let mut second = job(config, source, first.into_warehouse(), only(true, false, false));
    second.run().await.unwrap();
    assert_eq!(second.source().calls(), vec![pair(2, 101), pair(2, 402)]);
}

#[tokio::test]
async fn failed_tracking_update_is_rolled_back() {
    let mut config = config();
    config.tables.update_tracking = Some(table("INDICATOR_UPDATES"));
    let mut wh = MemoryWarehouse::new();
    wh.failures.insert_latest = true;
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024")]))
        .with_areas(1, &[101])
        .with_data(pair(1, 101), indicator_data(1, 1));

    let mut job = job(config, source, wh, only(true, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.pairs_loaded, 1);
    assert_eq!(report.tracking_updates, 0);
    assert_eq!(job.warehouse().row_count(&table("INDICATOR_UPDATES")), 0);
    assert!(!job.warehouse().in_transaction());
    // The fact load itself is unaffected.
    assert_eq!(job.warehouse().row_count(&table("INDICATOR_DATA")), 1);
}

#[tokio::test]
async fn metadata_tables_are_replaced() {
    let old = indicator_metadata(&[(1, "01/01/2020"), (2, "01/01/2020"), (3, "01/01/2020")]);
    let wh = MemoryWarehouse::new().with_table(table("INDICATOR_METADATA"), old);
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024")]));

    let mut job = SyncJob::new(config(), source, wh).with_flags(only(false, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.indicator_metadata_refreshed, Some(true));
    assert_eq!(report.area_metadata_refreshed, Some(true));
    let wh = job.warehouse();
    let meta = wh.table(&table("INDICATOR_METADATA")).unwrap();
    assert_eq!(meta.row_count(), 1);
    assert_eq!(meta.get_value(0, "Date updated"), Some("2024-06-01"));
    assert_eq!(wh.row_count(&table("AREA_METADATA")), 3);
}

#[tokio::test]
async fn failed_metadata_refresh_keeps_previous_table() {
    let old = indicator_metadata(&[(1, "01/01/2020"), (2, "01/01/2020")]);
    let mut wh = MemoryWarehouse::new().with_table(table("INDICATOR_METADATA"), old);
    wh.failures.append.insert(table("INDICATOR_METADATA"));
    let source = FakeSource::new(indicator_metadata(&[(1, "01/06/2024")]));

    let mut job = SyncJob::new(config(), source, wh).with_flags(only(false, false, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.indicator_metadata_refreshed, Some(false));
    assert_eq!(report.area_metadata_refreshed, Some(true));
    assert_eq!(job.warehouse().row_count(&table("INDICATOR_METADATA")), 2);
}

#[tokio::test]
async fn metadata_fetch_failure_fails_the_run() {
    let mut source = FakeSource::new(indicator_metadata(&[]));
    source.fail_metadata = true;

    let mut job = job(config(), source, MemoryWarehouse::new(), SelectionFlags::default());
    let result = job.run().await;

    assert!(matches!(result, Err(PipelineError::Source(_))));
    assert!(job.warehouse().journal().is_empty());
}

#[tokio::test]
async fn missing_update_log_script_skips_only_that_criterion() {
    let scripts = tempfile::tempdir().unwrap();
    let mut config = config();
    config.tables.scripts_dir = scripts.path().to_path_buf();

    let wh = MemoryWarehouse::new().with_table(table("AREA_MISMATCH"), pairs_frame(&[(5, 101)]));
    let source = FakeSource::new(indicator_metadata(&[(5, "01/06/2024"), (9, "01/06/2024")]))
        .with_areas(9, &[101])
        .with_data(pair(5, 101), indicator_data(5, 1));

    let mut job = job(config, source, wh, only(true, true, false));
    let report = job.run().await.unwrap();

    assert_eq!(report.pairs_selected, 1);
    assert_eq!(job.source().calls(), vec![pair(5, 101)]);
}

//! In-process [`Warehouse`] used by tests and local dry runs.
//!
//! Tables are frames keyed by [`TableName`]. Each written row carries a
//! logical load stamp (standing in for the warehouse `_TIMESTAMP` default) so
//! error resolution can be evaluated. `begin` snapshots every table and
//! `rollback` restores the snapshot. Failures can be injected per table or per
//! operation through [`FailurePlan`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use ftsync_core::{
    Frame, LocalUpdate, TableName, TargetPair, COL_AREA_ID, COL_INDICATOR_ID,
};

use crate::error::WarehouseError;
use crate::traits::{UpdateLogSource, Warehouse};

const ERR_INDICATOR_ID: &str = "INDICATOR_ID";
const ERR_AREA_ID: &str = "AREA_ID";
const TRACK_DATE_UPDATED: &str = "DATE_UPDATED";
const TRACK_IS_LATEST: &str = "IS_LATEST";

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    frame: Frame,
    stamps: Vec<u64>,
}

impl MemoryTable {
    /// Append rows, matching cells to columns by name and adding new columns.
    fn append(&mut self, frame: &Frame, stamp: u64) {
        for col in &frame.columns {
            if self.frame.column_index(col).is_none() {
                self.frame.set_column(col, None);
            }
        }
        let positions: Vec<usize> = frame
            .columns
            .iter()
            .filter_map(|c| self.frame.column_index(c))
            .collect();
        let width = self.frame.column_count();
        for row in &frame.rows {
            let mut target = vec![None; width];
            for (cell, &pos) in row.iter().zip(&positions) {
                target[pos] = cell.clone();
            }
            self.frame.rows.push(target);
            self.stamps.push(stamp);
        }
    }

    fn i64_at(&self, row: usize, column: &str) -> Option<i64> {
        self.frame.get_value(row, column)?.trim().parse().ok()
    }
}

/// Operations that should fail on purpose.
#[derive(Debug, Clone, Default)]
pub struct FailurePlan {
    pub append: BTreeSet<TableName>,
    pub truncate: BTreeSet<TableName>,
    pub insert_error: bool,
    pub mark_not_latest: bool,
    pub insert_latest: bool,
    pub commit: bool,
}

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: BTreeMap<TableName, MemoryTable>,
    snapshot: Option<BTreeMap<TableName, MemoryTable>>,
    clock: u64,
    local_log: Vec<LocalUpdate>,
    pub failures: FailurePlan,
    journal: Vec<String>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with existing rows.
    pub fn with_table(mut self, table: TableName, frame: Frame) -> Self {
        let stamp = self.tick();
        let mut t = MemoryTable::default();
        t.append(&frame, stamp);
        self.tables.insert(table, t);
        self
    }

    /// Rows returned for [`UpdateLogSource::Script`].
    pub fn with_local_log(mut self, log: Vec<LocalUpdate>) -> Self {
        self.local_log = log;
        self
    }

    pub fn table(&self, table: &TableName) -> Option<&Frame> {
        self.tables.get(table).map(|t| &t.frame)
    }

    pub fn row_count(&self, table: &TableName) -> usize {
        self.table(table).map_or(0, Frame::row_count)
    }

    /// Operations applied so far, e.g. `append warehouse.s.t 3`.
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn record(&mut self, entry: String) {
        self.journal.push(entry);
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn begin(&mut self) -> Result<(), WarehouseError> {
        if self.snapshot.is_none() {
            self.snapshot = Some(self.tables.clone());
        }
        self.record("begin".into());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), WarehouseError> {
        if self.failures.commit {
            return Err(WarehouseError::Simulated("commit".into()));
        }
        self.snapshot = None;
        self.record("commit".into());
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), WarehouseError> {
        if let Some(saved) = self.snapshot.take() {
            self.tables = saved;
        }
        self.record("rollback".into());
        Ok(())
    }

    async fn truncate(&mut self, table: &TableName) -> Result<(), WarehouseError> {
        if self.failures.truncate.contains(table) {
            return Err(WarehouseError::Simulated(format!("truncate {table}")));
        }
        let t = self.tables.entry(table.clone()).or_default();
        t.frame.rows.clear();
        t.stamps.clear();
        self.record(format!("truncate {table}"));
        Ok(())
    }

    async fn append(
        &mut self,
        table: &TableName,
        frame: &Frame,
        _chunk_rows: usize,
    ) -> Result<u64, WarehouseError> {
        if self.failures.append.contains(table) {
            return Err(WarehouseError::Simulated(format!("append {table}")));
        }
        let stamp = self.tick();
        self.tables.entry(table.clone()).or_default().append(frame, stamp);
        self.record(format!("append {table} {}", frame.row_count()));
        Ok(frame.row_count() as u64)
    }

    async fn local_update_log(
        &mut self,
        source: &UpdateLogSource,
    ) -> Result<Vec<LocalUpdate>, WarehouseError> {
        let table = match source {
            UpdateLogSource::Script(_) => return Ok(self.local_log.clone()),
            UpdateLogSource::TrackingTable(table) => table,
        };
        let Some(t) = self.tables.get(table) else {
            return Ok(Vec::new());
        };

        let mut latest: BTreeMap<i64, NaiveDate> = BTreeMap::new();
        for row in 0..t.frame.row_count() {
            if t.frame.get_value(row, TRACK_IS_LATEST) != Some("true") {
                continue;
            }
            let (Some(id), Some(date)) = (
                t.i64_at(row, ERR_INDICATOR_ID),
                t.frame
                    .get_value(row, TRACK_DATE_UPDATED)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            ) else {
                continue;
            };
            let entry = latest.entry(id).or_insert(date);
            if date > *entry {
                *entry = date;
            }
        }
        Ok(latest
            .into_iter()
            .map(|(indicator_id, date_updated)| LocalUpdate {
                indicator_id,
                date_updated,
            })
            .collect())
    }

    async fn area_mismatches(&mut self, table: &TableName) -> Result<Vec<TargetPair>, WarehouseError> {
        let Some(t) = self.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok((0..t.frame.row_count())
            .filter_map(|row| {
                Some(TargetPair::new(
                    t.i64_at(row, ERR_INDICATOR_ID)?,
                    t.i64_at(row, ERR_AREA_ID)?,
                ))
            })
            .collect())
    }

    async fn unresolved_errors(
        &mut self,
        error_log: &TableName,
        data: &TableName,
    ) -> Result<Vec<TargetPair>, WarehouseError> {
        let Some(errors) = self.tables.get(error_log) else {
            return Ok(Vec::new());
        };

        let mut last_loaded: HashMap<TargetPair, u64> = HashMap::new();
        if let Some(facts) = self.tables.get(data) {
            for row in 0..facts.frame.row_count() {
                let (Some(i), Some(a)) = (
                    facts.i64_at(row, COL_INDICATOR_ID),
                    facts.i64_at(row, COL_AREA_ID),
                ) else {
                    continue;
                };
                let stamp = last_loaded.entry(TargetPair::new(i, a)).or_insert(0);
                *stamp = (*stamp).max(facts.stamps[row]);
            }
        }

        let mut unresolved = BTreeSet::new();
        for row in 0..errors.frame.row_count() {
            let (Some(i), Some(a)) = (
                errors.i64_at(row, ERR_INDICATOR_ID),
                errors.i64_at(row, ERR_AREA_ID),
            ) else {
                continue;
            };
            let pair = TargetPair::new(i, a);
            match last_loaded.get(&pair) {
                Some(&loaded) if errors.stamps[row] < loaded => {}
                _ => {
                    unresolved.insert(pair);
                }
            }
        }
        Ok(unresolved.into_iter().collect())
    }

    async fn insert_error(&mut self, table: &TableName, pair: TargetPair) -> Result<(), WarehouseError> {
        if self.failures.insert_error {
            return Err(WarehouseError::Simulated(format!("insert_error {table}")));
        }
        let row = Frame::from_rows(
            vec![ERR_INDICATOR_ID.into(), ERR_AREA_ID.into()],
            vec![vec![
                Some(pair.indicator_id.to_string()),
                Some(pair.area_id.to_string()),
            ]],
        )
        .map_err(|e| WarehouseError::Other(e.to_string()))?;
        let stamp = self.tick();
        self.tables.entry(table.clone()).or_default().append(&row, stamp);
        self.record(format!("insert_error {table} {}/{}", pair.indicator_id, pair.area_id));
        Ok(())
    }

    async fn mark_not_latest(&mut self, table: &TableName, indicator_id: i64) -> Result<u64, WarehouseError> {
        if self.failures.mark_not_latest {
            return Err(WarehouseError::Simulated(format!("mark_not_latest {table}")));
        }
        let Some(t) = self.tables.get_mut(table) else {
            return Ok(0);
        };
        let (Some(id_idx), Some(flag_idx)) = (
            t.frame.column_index(ERR_INDICATOR_ID),
            t.frame.column_index(TRACK_IS_LATEST),
        ) else {
            return Ok(0);
        };

        let id = indicator_id.to_string();
        let mut updated = 0;
        for row in &mut t.frame.rows {
            if row[id_idx].as_deref() == Some(id.as_str()) {
                row[flag_idx] = Some("false".into());
                updated += 1;
            }
        }
        self.record(format!("mark_not_latest {table} {indicator_id}"));
        Ok(updated)
    }

    async fn insert_latest(
        &mut self,
        table: &TableName,
        indicator_id: i64,
        date_updated: NaiveDate,
    ) -> Result<(), WarehouseError> {
        if self.failures.insert_latest {
            return Err(WarehouseError::Simulated(format!("insert_latest {table}")));
        }
        let row = Frame::from_rows(
            vec![ERR_INDICATOR_ID.into(), TRACK_DATE_UPDATED.into(), TRACK_IS_LATEST.into()],
            vec![vec![
                Some(indicator_id.to_string()),
                Some(date_updated.format("%Y-%m-%d").to_string()),
                Some("true".into()),
            ]],
        )
        .map_err(|e| WarehouseError::Other(e.to_string()))?;
        let stamp = self.tick();
        self.tables.entry(table.clone()).or_default().append(&row, stamp);
        self.record(format!("insert_latest {table} {indicator_id}"));
        Ok(())
    }
}

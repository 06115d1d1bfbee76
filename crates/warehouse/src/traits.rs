//! Warehouse trait definition.

use async_trait::async_trait;
use chrono::NaiveDate;
use ftsync_core::{Frame, LocalUpdate, TableName, TargetPair};

use crate::error::WarehouseError;

/// Where the most recent local "Date updated" per indicator comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateLogSource {
    /// A rendered SQL script yielding `INDICATOR_ID` and `DATE_UPDATED_LOCAL`.
    Script(String),
    /// Tracking table rows flagged `IS_LATEST`.
    TrackingTable(TableName),
}

/// Transactional access to the destination warehouse.
///
/// Statements run on one connection in call order. Outside `begin`/`commit`
/// every statement commits on its own.
#[async_trait]
pub trait Warehouse: Send {
    async fn begin(&mut self) -> Result<(), WarehouseError>;

    async fn commit(&mut self) -> Result<(), WarehouseError>;

    /// Undo the open transaction. A no-op when none is open.
    async fn rollback(&mut self) -> Result<(), WarehouseError>;

    async fn truncate(&mut self, table: &TableName) -> Result<(), WarehouseError>;

    /// Append every row of `frame`, `chunk_rows` rows per statement.
    /// Returns the number of rows written.
    async fn append(
        &mut self,
        table: &TableName,
        frame: &Frame,
        chunk_rows: usize,
    ) -> Result<u64, WarehouseError>;

    /// Most recent local update date per indicator.
    async fn local_update_log(
        &mut self,
        source: &UpdateLogSource,
    ) -> Result<Vec<LocalUpdate>, WarehouseError>;

    /// Pairs flagged as loaded against outdated area boundaries.
    async fn area_mismatches(&mut self, table: &TableName) -> Result<Vec<TargetPair>, WarehouseError>;

    /// Error-log pairs not superseded by a later load into `data`.
    async fn unresolved_errors(
        &mut self,
        error_log: &TableName,
        data: &TableName,
    ) -> Result<Vec<TargetPair>, WarehouseError>;

    async fn insert_error(&mut self, table: &TableName, pair: TargetPair) -> Result<(), WarehouseError>;

    /// Clear the latest flag on every tracking row of the indicator.
    async fn mark_not_latest(&mut self, table: &TableName, indicator_id: i64) -> Result<u64, WarehouseError>;

    async fn insert_latest(
        &mut self,
        table: &TableName,
        indicator_id: i64,
        date_updated: NaiveDate,
    ) -> Result<(), WarehouseError>;
}

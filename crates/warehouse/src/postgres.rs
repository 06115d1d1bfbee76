//! PostgreSQL implementation of [`Warehouse`].
//!
//! [`PgWarehouse`] holds a single-connection pool. `begin` opens an sqlx
//! [`Transaction`] that later statements run on until `commit` or
//! `rollback`; a transaction that is dropped unfinished is rolled back. Every
//! value is bound as a parameter; only quoted identifiers are interpolated
//! into SQL text.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use ftsync_core::config::PostgresConfig;
use ftsync_core::table::quote_ident;
use ftsync_core::{Frame, LocalUpdate, TableName, TargetPair};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::error::WarehouseError;
use crate::traits::{UpdateLogSource, Warehouse};

pub struct PgWarehouse {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

/// Connection options from config. Credentials are passed as fields, never
/// spliced into a URL.
pub fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions, WarehouseError> {
    let ssl_mode = PgSslMode::from_str(&config.ssl_mode)
        .map_err(|_| WarehouseError::Other(format!("invalid PG_SSL_MODE '{}'", config.ssl_mode)))?;
    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.database)
        .username(config.username.as_deref().unwrap_or("postgres"))
        .ssl_mode(ssl_mode);
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    Ok(options)
}

impl PgWarehouse {
    /// Open the connection described by `config`.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, WarehouseError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options(config)?)
            .await?;
        info!("PostgreSQL connected: {}/{}", config.host, config.database);
        Ok(Self { pool, tx: None })
    }

    /// Close the connection. An unfinished transaction is rolled back first.
    pub async fn close(mut self) -> Result<(), WarehouseError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        self.pool.close().await;
        Ok(())
    }

    async fn execute(&mut self, query: Query<'_, Postgres, PgArguments>) -> Result<u64, WarehouseError> {
        let result = match self.tx.as_mut() {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    async fn fetch_all<T>(&mut self, sql: &str) -> Result<Vec<T>, WarehouseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let query = sqlx::query_as::<_, T>(sql);
        let rows = match self.tx.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        Ok(rows)
    }
}

/// `INSERT … SELECT` that expands a JSON array of records into the table's
/// row type, so the server coerces text to each column's type.
fn append_sql(table: &TableName, columns: &[String]) -> String {
    let cols = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let target = table.quoted();
    format!(
        "INSERT INTO {target} ({cols}) \
         SELECT {cols} FROM jsonb_populate_recordset(NULL::{target}, $1)"
    )
}

fn update_log_sql(source: &UpdateLogSource) -> String {
    match source {
        UpdateLogSource::Script(script) => format!(
            "SELECT \"INDICATOR_ID\"::bigint, MAX(\"DATE_UPDATED_LOCAL\")::date \
             FROM ({script}) AS local_log \
             WHERE \"INDICATOR_ID\" IS NOT NULL AND \"DATE_UPDATED_LOCAL\" IS NOT NULL \
             GROUP BY 1"
        ),
        UpdateLogSource::TrackingTable(table) => format!(
            "SELECT \"INDICATOR_ID\"::bigint, MAX(\"DATE_UPDATED\")::date \
             FROM {} \
             WHERE \"IS_LATEST\" \
             GROUP BY 1",
            table.quoted()
        ),
    }
}

/// An error pair is unresolved until a load for it is newer than the error.
/// Pairs with no fact rows at all stay unresolved and are retried each run.
fn unresolved_errors_sql(error_log: &TableName, data: &TableName) -> String {
    format!(
        "SELECT DISTINCT iel.\"INDICATOR_ID\"::bigint, iel.\"AREA_ID\"::bigint \
         FROM {errors} iel \
         LEFT JOIN ( \
             SELECT \"Indicator ID\"::bigint AS indicator_id, \
                    \"AREA_ID\"::bigint AS area_id, \
                    MAX(\"_TIMESTAMP\") AS last_loaded \
             FROM {data} \
             GROUP BY 1, 2 \
         ) fin \
         ON iel.\"INDICATOR_ID\"::bigint = fin.indicator_id \
         AND iel.\"AREA_ID\"::bigint = fin.area_id \
         WHERE fin.last_loaded IS NULL OR iel.\"_TIMESTAMP\" >= fin.last_loaded \
         ORDER BY 1, 2",
        errors = error_log.quoted(),
        data = data.quoted(),
    )
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn begin(&mut self) -> Result<(), WarehouseError> {
        if self.tx.is_none() {
            self.tx = Some(self.pool.begin().await?);
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), WarehouseError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), WarehouseError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    async fn truncate(&mut self, table: &TableName) -> Result<(), WarehouseError> {
        let sql = format!("TRUNCATE TABLE {}", table.quoted());
        self.execute(sqlx::query(&sql)).await?;
        debug!(table = %table, "Truncated");
        Ok(())
    }

    async fn append(
        &mut self,
        table: &TableName,
        frame: &Frame,
        chunk_rows: usize,
    ) -> Result<u64, WarehouseError> {
        if frame.is_empty() || frame.columns.is_empty() {
            return Ok(0);
        }

        let sql = append_sql(table, &frame.columns);
        let chunks: Vec<serde_json::Value> = frame.to_json_chunks(chunk_rows);
        let mut written = 0;
        for chunk in chunks {
            written += self.execute(sqlx::query(&sql).bind(chunk)).await?;
        }
        debug!(table = %table, rows = written, "Appended");
        Ok(written)
    }

    async fn local_update_log(
        &mut self,
        source: &UpdateLogSource,
    ) -> Result<Vec<LocalUpdate>, WarehouseError> {
        let rows: Vec<(i64, NaiveDate)> = self.fetch_all(&update_log_sql(source)).await?;
        Ok(rows
            .into_iter()
            .map(|(indicator_id, date_updated)| LocalUpdate {
                indicator_id,
                date_updated,
            })
            .collect())
    }

    async fn area_mismatches(&mut self, table: &TableName) -> Result<Vec<TargetPair>, WarehouseError> {
        let sql = format!(
            "SELECT \"INDICATOR_ID\"::bigint, \"AREA_ID\"::bigint FROM {}",
            table.quoted()
        );
        let rows: Vec<(i64, i64)> = self.fetch_all(&sql).await?;
        Ok(rows.into_iter().map(|(i, a)| TargetPair::new(i, a)).collect())
    }

    async fn unresolved_errors(
        &mut self,
        error_log: &TableName,
        data: &TableName,
    ) -> Result<Vec<TargetPair>, WarehouseError> {
        let rows: Vec<(i64, i64)> = self
            .fetch_all(&unresolved_errors_sql(error_log, data))
            .await?;
        Ok(rows.into_iter().map(|(i, a)| TargetPair::new(i, a)).collect())
    }

    async fn insert_error(&mut self, table: &TableName, pair: TargetPair) -> Result<(), WarehouseError> {
        let sql = format!(
            "INSERT INTO {} (\"INDICATOR_ID\", \"AREA_ID\") VALUES ($1, $2)",
            table.quoted()
        );
        self.execute(sqlx::query(&sql).bind(pair.indicator_id).bind(pair.area_id))
            .await?;
        Ok(())
    }

    async fn mark_not_latest(&mut self, table: &TableName, indicator_id: i64) -> Result<u64, WarehouseError> {
        let sql = format!(
            "UPDATE {} SET \"IS_LATEST\" = FALSE WHERE \"INDICATOR_ID\" = $1",
            table.quoted()
        );
        self.execute(sqlx::query(&sql).bind(indicator_id)).await
    }

    async fn insert_latest(
        &mut self,
        table: &TableName,
        indicator_id: i64,
        date_updated: NaiveDate,
    ) -> Result<(), WarehouseError> {
        let sql = format!(
            "INSERT INTO {} (\"INDICATOR_ID\", \"DATE_UPDATED\", \"IS_LATEST\") VALUES ($1, $2, TRUE)",
            table.quoted()
        );
        self.execute(sqlx::query(&sql).bind(indicator_id).bind(date_updated))
            .await?;
        Ok(())
    }
}

//! fingertips-sync: load new and failed Fingertips indicator data into the
//! warehouse.
//!
//! Configuration comes from the environment (and `.env`); see
//! `ftsync_core::config`. Flags override the matching settings for one run.

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use ftsync_core::config::load_dotenv;
use ftsync_core::{IndicatorScope, SyncConfig};
use ftsync_fingertips::{FingertipsClient, IndicatorSource};
use ftsync_pipeline::{RunReport, SelectionFlags, SyncJob};
use ftsync_warehouse::{MemoryWarehouse, PgWarehouse, Warehouse};

// ── CLI ─────────────────────────────────────────────────────────────

/// Sync Fingertips public-health indicators into the warehouse.
#[derive(Parser, Debug)]
#[command(name = "fingertips-sync", version, about)]
struct Cli {
    /// Process at most N pairs (the last indicator is never split; 0 = no cap).
    /// Overrides RUN_LIMIT from the active profile.
    #[arg(long)]
    limit: Option<usize>,

    /// Do not refresh the indicator and area metadata tables.
    #[arg(long)]
    skip_metadata: bool,

    /// Do not select pairs for indicators updated at the source.
    #[arg(long)]
    no_updated: bool,

    /// Do not select pairs from the area mismatch table.
    #[arg(long)]
    no_area_mismatch: bool,

    /// Do not retry unresolved ingestion errors.
    #[arg(long)]
    no_ingestion_errors: bool,

    /// Process repeated pairs once per occurrence.
    #[arg(long)]
    keep_duplicates: bool,

    /// Restrict update detection to this indicator id (repeatable).
    #[arg(long = "indicator", value_name = "ID")]
    indicators: Vec<i64>,

    /// Write to an in-memory warehouse instead of PostgreSQL.
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    fn apply(&self, config: &mut SyncConfig) {
        if self.limit.is_some() {
            config.run.limit = self.limit;
        }
        if !self.indicators.is_empty() {
            config.run.indicators = IndicatorScope::from_ids(self.indicators.clone());
        }
        if self.keep_duplicates {
            config.run.dedupe_target_pairs = false;
        }
    }

    fn flags(&self, config: &SyncConfig) -> SelectionFlags {
        SelectionFlags {
            updated_indicators: !self.no_updated,
            area_mismatch: !self.no_area_mismatch,
            ingestion_errors: !self.no_ingestion_errors,
            dedupe: config.run.dedupe_target_pairs,
        }
    }
}

async fn run_job<S, W>(
    cli: &Cli,
    config: SyncConfig,
    source: S,
    warehouse: W,
) -> anyhow::Result<(RunReport, W)>
where
    S: IndicatorSource,
    W: Warehouse,
{
    let flags = cli.flags(&config);
    let mut job = SyncJob::new(config, source, warehouse)
        .with_flags(flags)
        .with_metadata_refresh(!cli.skip_metadata);
    let report = job.run().await.context("sync run failed")?;
    Ok((report, job.into_warehouse()))
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = SyncConfig::from_env().context("invalid configuration")?;
    cli.apply(&mut config);
    config.log_summary();

    let source = FingertipsClient::new(&config.fingertips).context("building Fingertips client")?;

    let report = if cli.dry_run {
        info!("dry run: writes go to an in-memory warehouse");
        let (report, _) = run_job(&cli, config, source, MemoryWarehouse::new()).await?;
        report
    } else {
        let warehouse = PgWarehouse::connect(&config.postgres)
            .await
            .context("connecting to the warehouse")?;
        info!(host = %config.postgres.host, db = %config.postgres.database, "connected to warehouse");
        let (report, warehouse) = run_job(&cli, config, source, warehouse).await?;
        if let Err(e) = warehouse.close().await {
            warn!(error = %e, "closing the warehouse connection failed");
        }
        report
    };

    if !report.is_clean() {
        warn!("some pairs failed; they will be retried on the next run");
    }
    println!("{report}");
    Ok(())
}

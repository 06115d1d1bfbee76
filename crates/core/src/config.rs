use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::table::TableName;
use crate::types::IndicatorScope;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(
    profile: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match profiled_env_opt(profile, key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            }),
        None => Ok(None),
    }
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
    match profiled_env_opt(profile, key) {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: v,
            }),
        },
        None => Ok(default),
    }
}

/// Parse an indicator id list written either as `[1, 2]` or `1,2`.
pub fn parse_indicator_ids(raw: &str) -> Result<Vec<i64>, ConfigError> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| ConfigError::InvalidValue {
                key: "INDICATOR_IDS".to_string(),
                value: raw.to_string(),
            })
        })
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub postgres: PostgresConfig,
    pub tables: TableConfig,
    pub fingertips: FingertipsConfig,
    pub run: RunConfig,
}

impl SyncConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FTSYNC_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let profile = env_or("FTSYNC_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Result<Self, ConfigError> {
        let p = profile.to_uppercase();
        let p = p.as_str();
        let postgres = PostgresConfig::from_env_profiled(p)?;
        let tables = TableConfig::from_env_profiled(p, &postgres.database)?;
        Ok(Self {
            profile: p.to_string(),
            postgres,
            tables,
            fingertips: FingertipsConfig::from_env_profiled(p)?,
            run: RunConfig::from_env_profiled(p)?,
        })
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  postgres:    host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!("  fingertips:  url={}", self.fingertips.base_url);
        tracing::info!("  data:        {}", self.tables.data);
        tracing::info!("  errors:      {}", self.tables.ingestion_error_log);
        tracing::info!(
            "  tracking:    {}",
            self.tables
                .update_tracking
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!(
            "  run:         limit={}, max_attempts={}, dedupe={}",
            self.run
                .limit
                .map(|l| l.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.run.fetch_max_attempts,
            self.run.dedupe_target_pairs
        );
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub ssl_mode: String,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_parse(p, "PG_PORT")?.unwrap_or(5432),
            database: profiled_env_or(p, "PG_DATABASE", "warehouse"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
        })
    }
}

// ── Destination tables ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub meta_indicator: TableName,
    pub meta_area: TableName,
    pub data: TableName,
    pub area_mismatch: TableName,
    pub ingestion_error_log: TableName,
    /// Latest-version tracking table; `None` disables tracking.
    pub update_tracking: Option<TableName>,
    /// Directory holding the `.sql` scripts loaded at runtime.
    pub scripts_dir: PathBuf,
}

impl TableConfig {
    fn from_env_profiled(p: &str, pg_database: &str) -> Result<Self, ConfigError> {
        let database = profiled_env_or(p, "DATABASE", pg_database);
        let schema = profiled_env_or(p, "SCHEMA", "fingertips");
        let table = |key: &str, default: &str| {
            TableName::resolve(&profiled_env_or(p, key, default), &database, &schema)
        };

        Ok(Self {
            meta_indicator: table("TABLE_META_INDICATOR", "INDICATOR_METADATA")?,
            meta_area: table("TABLE_META_AREA", "AREA_METADATA")?,
            data: table("TABLE_DATA", "INDICATOR_DATA")?,
            area_mismatch: table("TABLE_AREA_MISMATCH", "AREA_MISMATCH")?,
            ingestion_error_log: table("TABLE_INGESTION_ERROR_LOG", "INGESTION_ERROR_LOG")?,
            update_tracking: profiled_env_opt(p, "TABLE_UPDATE_TRACKING")
                .map(|name| TableName::resolve(&name, &database, &schema))
                .transpose()?,
            scripts_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR_SCRIPTS", "scripts")),
        })
    }
}

// ── Fingertips API ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingertipsConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Parent area type used when requesting indicator data.
    pub parent_area_type_id: i64,
}

impl FingertipsConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: profiled_env_or(p, "FINGERTIPS_BASE_URL", "https://fingertips.phe.org.uk/api")
                .trim_end_matches('/')
                .to_string(),
            timeout_seconds: profiled_env_parse(p, "FINGERTIPS_TIMEOUT_SECONDS")?.unwrap_or(120),
            parent_area_type_id: profiled_env_parse(p, "FINGERTIPS_PARENT_AREA_TYPE_ID")?
                .unwrap_or(crate::types::NATIONAL_AREA_TYPE_ID),
        })
    }
}

// ── Run behaviour ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub indicators: IndicatorScope,
    pub fetch_max_attempts: u32,
    pub upload_chunk_rows: usize,
    pub dedupe_target_pairs: bool,
    pub limit: Option<usize>,
}

impl RunConfig {
    fn from_env_profiled(p: &str) -> Result<Self, ConfigError> {
        let indicators = match profiled_env_opt(p, "INDICATOR_IDS") {
            Some(raw) => IndicatorScope::from_ids(parse_indicator_ids(&raw)?),
            None => IndicatorScope::All,
        };
        Ok(Self {
            indicators,
            fetch_max_attempts: profiled_env_parse(p, "FETCH_MAX_ATTEMPTS")?.unwrap_or(2),
            upload_chunk_rows: profiled_env_parse(p, "UPLOAD_CHUNK_ROWS")?.unwrap_or(10_000),
            dedupe_target_pairs: profiled_env_bool(p, "DEDUPE_TARGET_PAIRS", true)?,
            limit: profiled_env_parse(p, "RUN_LIMIT")?,
        })
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorScope::All,
            fetch_max_attempts: 2,
            upload_chunk_rows: 10_000,
            dedupe_target_pairs: true,
            limit: None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

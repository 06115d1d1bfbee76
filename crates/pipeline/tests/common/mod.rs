//! Shared fixtures for pipeline tests: a scripted indicator source and a
//! config pointing at in-memory tables.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use ftsync_core::config::{FingertipsConfig, PostgresConfig, RunConfig, TableConfig};
use ftsync_core::{Frame, SyncConfig, TableName, TargetPair};
use ftsync_fingertips::{IndicatorSource, SourceError};

pub fn table(name: &str) -> TableName {
    TableName::new("warehouse", "fingertips", name)
}

pub fn scripts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scripts")
}

pub fn config() -> SyncConfig {
    SyncConfig {
        profile: String::new(),
        postgres: PostgresConfig {
            host: "localhost".into(),
            port: 5432,
            database: "warehouse".into(),
            username: None,
            password: None,
            ssl_mode: "prefer".into(),
        },
        tables: TableConfig {
            meta_indicator: table("INDICATOR_METADATA"),
            meta_area: table("AREA_METADATA"),
            data: table("INDICATOR_DATA"),
            area_mismatch: table("AREA_MISMATCH"),
            ingestion_error_log: table("INGESTION_ERROR_LOG"),
            update_tracking: None,
            scripts_dir: scripts_dir(),
        },
        fingertips: FingertipsConfig {
            base_url: "http://localhost/api".into(),
            timeout_seconds: 5,
            parent_area_type_id: 15,
        },
        run: RunConfig::default(),
    }
}

fn cells(values: &[&str]) -> Vec<Option<String>> {
    values.iter().map(|v| Some(v.to_string())).collect()
}

/// Indicator metadata with `(id, "dd/mm/YYYY")` rows.
pub fn indicator_metadata(rows: &[(i64, &str)]) -> Frame {
    Frame::from_rows(
        vec!["Indicator ID".into(), "Indicator".into(), "Date updated".into()],
        rows.iter()
            .map(|&(id, date)| {
                vec![Some(id.to_string()), Some(format!("Indicator {id}")), Some(date.to_string())]
            })
            .collect(),
    )
    .unwrap()
}

pub fn area_types() -> Frame {
    Frame::from_rows(
        vec!["AREA_ID".into(), "Name".into()],
        vec![
            cells(&["15", "England"]),
            cells(&["101", "Lower tier local authorities"]),
            cells(&["402", "Upper tier local authorities"]),
        ],
    )
    .unwrap()
}

/// Fetched data for one pair: one national row plus `local_rows` local rows.
pub fn indicator_data(indicator_id: i64, local_rows: usize) -> Frame {
    let id = indicator_id.to_string();
    let mut rows = vec![cells(&[id.as_str(), "E92000001", "England", "50.0"])];
    for i in 0..local_rows {
        let code = format!("E0600000{i}");
        let name = format!("Area {i}");
        let value = format!("{i}.5");
        rows.push(cells(&[id.as_str(), code.as_str(), name.as_str(), value.as_str()]));
    }
    Frame::from_rows(
        vec!["Indicator ID".into(), "Area Code".into(), "Area Name".into(), "Value".into()],
        rows,
    )
    .unwrap()
}

/// Source serving fixed frames, with scripted fetch failures.
#[derive(Default)]
pub struct FakeSource {
    pub metadata: Frame,
    pub availability: BTreeMap<i64, Vec<i64>>,
    pub data: HashMap<TargetPair, Frame>,
    /// Number of leading failures per pair before it succeeds.
    pub failures: HashMap<TargetPair, u32>,
    pub fail_metadata: bool,
    calls: Mutex<Vec<TargetPair>>,
}

impl FakeSource {
    pub fn new(metadata: Frame) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    pub fn with_areas(mut self, indicator_id: i64, areas: &[i64]) -> Self {
        self.availability.insert(indicator_id, areas.to_vec());
        self
    }

    pub fn with_data(mut self, pair: TargetPair, frame: Frame) -> Self {
        self.data.insert(pair, frame);
        self
    }

    pub fn failing(mut self, pair: TargetPair, times: u32) -> Self {
        self.failures.insert(pair, times);
        self
    }

    /// Every `indicator_data` call so far, in order.
    pub fn calls(&self) -> Vec<TargetPair> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndicatorSource for FakeSource {
    async fn indicator_metadata(&self) -> Result<Frame, SourceError> {
        if self.fail_metadata {
            return Err(SourceError::Api {
                status: 503,
                url: "indicator_metadata/csv/all".into(),
                body: "unavailable".into(),
            });
        }
        Ok(self.metadata.clone())
    }

    async fn area_types(&self) -> Result<Frame, SourceError> {
        Ok(area_types())
    }

    async fn areas_by_indicator(&self) -> Result<BTreeMap<i64, Vec<i64>>, SourceError> {
        Ok(self.availability.clone())
    }

    async fn indicator_data(&self, indicator_id: i64, area_id: i64) -> Result<Frame, SourceError> {
        let pair = TargetPair::new(indicator_id, area_id);
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(pair);
            calls.iter().filter(|p| **p == pair).count() as u32
        };
        if attempt <= self.failures.get(&pair).copied().unwrap_or(0) {
            return Err(SourceError::Api {
                status: 500,
                url: "all_data/csv/by_indicator_id".into(),
                body: format!("attempt {attempt} failed"),
            });
        }
        Ok(self
            .data
            .get(&pair)
            .cloned()
            .unwrap_or_else(|| Frame::new(vec!["Indicator ID".into(), "Area Code".into()])))
    }
}

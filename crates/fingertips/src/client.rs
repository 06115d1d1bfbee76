use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ftsync_core::config::FingertipsConfig;
use ftsync_core::Frame;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::parse::{area_types_frame, availability_map, frame_from_csv};
use crate::source::{IndicatorSource, SourceError};

/// HTTP client for the Fingertips API.
pub struct FingertipsClient {
    client: Client,
    base_url: String,
    parent_area_type_id: i64,
}

impl FingertipsClient {
    pub fn new(config: &FingertipsConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            parent_area_type_id: config.parent_area_type_id,
        })
    }

    async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, SourceError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, ?query, "GET");

        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api { status, url, body });
        }

        Ok(response.text().await?)
    }

    async fn get_json(&self, path: &str) -> Result<Value, SourceError> {
        let text = self.get_text(path, &[]).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl IndicatorSource for FingertipsClient {
    async fn indicator_metadata(&self) -> Result<Frame, SourceError> {
        let frame = frame_from_csv(&self.get_text("indicator_metadata/csv/all", &[]).await?)?;
        info!(rows = frame.row_count(), "Fetched indicator metadata");
        Ok(frame)
    }

    async fn area_types(&self) -> Result<Frame, SourceError> {
        let frame = area_types_frame(&self.get_json("area_types").await?)?;
        info!(rows = frame.row_count(), "Fetched area metadata");
        Ok(frame)
    }

    async fn areas_by_indicator(&self) -> Result<BTreeMap<i64, Vec<i64>>, SourceError> {
        let map = availability_map(self.get_json("available_data").await?)?;
        info!(indicators = map.len(), "Fetched area availability");
        Ok(map)
    }

    async fn indicator_data(&self, indicator_id: i64, area_id: i64) -> Result<Frame, SourceError> {
        let query = [
            ("indicator_ids", indicator_id.to_string()),
            ("child_area_type_id", area_id.to_string()),
            ("parent_area_type_id", self.parent_area_type_id.to_string()),
        ];
        let text = self.get_text("all_data/csv/by_indicator_id", &query).await?;
        let frame = frame_from_csv(&text)?;
        debug!(indicator_id, area_id, rows = frame.row_count(), "Fetched indicator data");
        Ok(frame)
    }
}

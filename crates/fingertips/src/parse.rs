//! Decoding of API payloads into frames and lookup maps.

use std::collections::{BTreeMap, BTreeSet};

use ftsync_core::{Frame, COL_AREA_ID};
use serde::Deserialize;
use serde_json::Value;

use crate::source::SourceError;

/// Decode a CSV document with a header row. Empty cells become NULL.
pub fn frame_from_csv(text: &str) -> Result<Frame, SourceError> {
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Ok(Frame::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut frame = Frame::new(columns);
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        frame.push_row(row)?;
    }
    Ok(frame)
}

/// Render a JSON scalar as cell text; nested values are kept as JSON.
fn json_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Build the area metadata frame from the `area_types` payload.
///
/// `Id` becomes the leading `AREA_ID` column; every other key becomes a column
/// in first-seen order. Missing keys are NULL.
pub fn area_types_frame(payload: &Value) -> Result<Frame, SourceError> {
    let items = payload
        .as_array()
        .ok_or_else(|| SourceError::Shape("area_types: expected a JSON array".into()))?;

    let mut keys: Vec<String> = Vec::new();
    for item in items {
        let obj = item
            .as_object()
            .ok_or_else(|| SourceError::Shape("area_types: expected objects".into()))?;
        for key in obj.keys() {
            if key != "Id" && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }

    let mut columns = vec![COL_AREA_ID.to_string()];
    columns.extend(keys.iter().cloned());
    let mut frame = Frame::new(columns);

    for item in items {
        // Shape already checked above.
        let Some(obj) = item.as_object() else { continue };
        let id = obj
            .get("Id")
            .and_then(Value::as_i64)
            .ok_or_else(|| SourceError::Shape(format!("area_types: missing integer Id in {item}")))?;

        let mut row = Vec::with_capacity(keys.len() + 1);
        row.push(Some(id.to_string()));
        row.extend(keys.iter().map(|k| obj.get(k).and_then(json_cell)));
        frame.push_row(row)?;
    }
    Ok(frame)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AvailableData {
    indicator_id: i64,
    area_type_id: i64,
}

/// Build the indicator → area type ids map from the `available_data` payload.
///
/// Area ids are sorted ascending and deduplicated.
pub fn availability_map(payload: Value) -> Result<BTreeMap<i64, Vec<i64>>, SourceError> {
    let items: Vec<AvailableData> = serde_json::from_value(payload)?;
    let mut map: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for item in items {
        map.entry(item.indicator_id).or_default().insert(item.area_type_id);
    }
    Ok(map
        .into_iter()
        .map(|(indicator, areas)| (indicator, areas.into_iter().collect()))
        .collect())
}

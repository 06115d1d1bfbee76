use std::path::Path;

use ftsync_core::TableName;

use crate::error::WarehouseError;

/// Script yielding the local update log from the fact table.
pub const UPDATE_LOG_SCRIPT: &str = "get_indicator_update_log.sql";

const TABLE_DATA_PLACEHOLDER: &str = "{{TABLE_DATA}}";

/// Read a SQL script from the scripts directory.
pub fn load_script(dir: &Path, file_name: &str) -> Result<String, WarehouseError> {
    let path = dir.join(file_name);
    std::fs::read_to_string(&path).map_err(|source| WarehouseError::Script { path, source })
}

/// Substitute the fact table and strip the trailing terminator so the script
/// can be embedded as a subquery.
pub fn render_update_log_script(script: &str, data: &TableName) -> String {
    script
        .replace(TABLE_DATA_PLACEHOLDER, &data.quoted())
        .trim()
        .trim_end_matches(';')
        .trim_end()
        .to_string()
}

//! Per-area cleanup of a freshly fetched indicator frame.

use ftsync_core::{Frame, COL_AREA_CODE, COL_AREA_ID, NATIONAL_AREA_CODE, NATIONAL_AREA_TYPE_ID};
use tracing::debug;

/// Prepare the rows fetched for one area type.
///
/// Unless `area_id` is the national area type, the national row the source
/// includes for comparison is dropped. Every row is stamped with `AREA_ID`
/// and exact duplicates are removed. A frame without an "Area Code" column
/// is only stamped and deduplicated.
pub fn clean_area_frame(frame: &mut Frame, area_id: i64) {
    if area_id != NATIONAL_AREA_TYPE_ID {
        if let Ok(dropped) = frame.exclude_value(COL_AREA_CODE, NATIONAL_AREA_CODE) {
            if dropped > 0 {
                debug!(area_id, dropped, "Dropped national comparator rows");
            }
        }
    }
    frame.set_column(COL_AREA_ID, Some(area_id.to_string()));
    let duplicates = frame.drop_duplicates();
    if duplicates > 0 {
        debug!(area_id, duplicates, "Dropped duplicate rows");
    }
}

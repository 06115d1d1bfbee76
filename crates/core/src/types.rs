use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Area type id of the national (England) boundary.
pub const NATIONAL_AREA_TYPE_ID: i64 = 15;

/// Area code the source assigns to the national (England) row.
pub const NATIONAL_AREA_CODE: &str = "E92000001";

// ── Column names ──────────────────────────────────────────────

pub const COL_INDICATOR_ID: &str = "Indicator ID";
pub const COL_DATE_UPDATED: &str = "Date updated";
pub const COL_AREA_CODE: &str = "Area Code";
pub const COL_AREA_ID: &str = "AREA_ID";
pub const COL_DATE_UPDATED_LOCAL: &str = "DATE_UPDATED_LOCAL";

/// An (indicator, area type) combination: the unit of fetch and load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetPair {
    pub indicator_id: i64,
    pub area_id: i64,
}

impl TargetPair {
    pub fn new(indicator_id: i64, area_id: i64) -> Self {
        Self {
            indicator_id,
            area_id,
        }
    }
}

/// Most recent locally ingested "Date updated" for one indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUpdate {
    pub indicator_id: i64,
    pub date_updated: NaiveDate,
}

/// Which indicators update detection should consider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorScope {
    /// Every indicator in the live metadata.
    #[default]
    All,
    Only(Vec<i64>),
}

impl IndicatorScope {
    /// An empty id list means every indicator.
    pub fn from_ids(ids: Vec<i64>) -> Self {
        if ids.is_empty() {
            Self::All
        } else {
            Self::Only(ids)
        }
    }

    pub fn contains(&self, indicator_id: i64) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(&indicator_id),
        }
    }
}

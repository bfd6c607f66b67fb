use chrono::NaiveDateTime;

use crate::model::record::RecordId;
use crate::model::row::RowId;

/// Pill identity within one derivation pass. Ids are minted monotonically
/// each pass and never persisted; cross-pass references must re-resolve
/// through `record_id`/`row_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PillId(pub u32);

/// A rendered bar: one scheduled record on one row, or a group-level
/// summary (then `record_id` is `None` and `aggregate` is set).
#[derive(Debug, Clone)]
pub struct Pill {
    pub id: PillId,
    pub record_id: Option<RecordId>,
    pub row_id: RowId,
    pub row_index: usize,
    /// Covered sub-columns, 1-based, `[first, last)`.
    pub first_col: u32,
    pub last_col: u32,
    pub level: u32,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub disable_start_resize: bool,
    pub disable_stop_resize: bool,
    pub aggregate: Option<Aggregate>,
}

impl Pill {
    pub fn span(&self) -> u32 {
        self.last_col.saturating_sub(self.first_col)
    }

    pub fn covers(&self, sub_col: u32) -> bool {
        sub_col >= self.first_col && sub_col < self.last_col
    }
}

/// Summary payload of a group-row pill.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub count: u32,
    /// Consolidation sum, when a consolidation field is configured.
    pub value: Option<f64>,
    pub over_limit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorAlert {
    None,
    Warning,
    Error,
}

/// Directed dependency edge between two pills (master → slave). Violations
/// are flagged through `alert`, never corrected.
#[derive(Debug, Clone)]
pub struct Connector {
    pub id: ConnectorId,
    pub source: PillId,
    pub target: PillId,
    pub alert: ConnectorAlert,
}

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::model::meta::RescheduleMethod;
use crate::model::record::{FieldChanges, Record, RecordId};

/// Half-open `[start, stop)` time interval on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl TimeInterval {
    pub fn overlaps(&self, start: NaiveDateTime, stop: NaiveDateTime) -> bool {
        self.start < stop && self.stop > start
    }
}

/// One search filter clause: field, operator, operand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainClause {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub domain: Vec<DomainClause>,
    pub group_by: Vec<String>,
    pub scale_unit: String,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
    pub unavailability_fields: Vec<String>,
    pub progress_bar_fields: Vec<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// One group-by combination with its member records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupBlock {
    pub values: FieldChanges,
    pub record_ids: Vec<RecordId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressBarInfo {
    pub value: f64,
    pub max_value: f64,
}

/// Per-field, per-group-value auxiliary maps are keyed by the JSON encoding
/// of the group value, which is stable across fetches.
pub fn value_key(value: &Value) -> String {
    value.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub records: Vec<Record>,
    pub groups: Vec<GroupBlock>,
    pub length: usize,
    pub unavailabilities: HashMap<String, HashMap<String, Vec<TimeInterval>>>,
    pub progress_bars: HashMap<String, HashMap<String, ProgressBarInfo>>,
}

/// Dependency-aware reschedule request.
#[derive(Debug, Clone)]
pub struct DependencyReschedule {
    pub changes: FieldChanges,
    pub method: RescheduleMethod,
    pub ids: Vec<RecordId>,
    pub dependency_field: String,
    pub inverse_dependency_field: Option<String>,
    pub start_field: String,
    pub stop_field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Ok,
    Warning,
}

/// Result of a dependency-aware reschedule. `old_values` holds the pre-write
/// field values per touched record and powers the Undo affordance.
#[derive(Debug, Clone)]
pub struct RescheduleOutcome {
    pub kind: OutcomeKind,
    pub message: Option<String>,
    pub old_values: HashMap<RecordId, FieldChanges>,
}

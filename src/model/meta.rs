use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Named time granularity of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleId {
    Day,
    Week,
    Month,
    Year,
}

/// Base interval a single grid column covers at a given scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Hour,
    Day,
    Month,
}

/// Number of sub-cells per interval column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellPart {
    Full,
    Half,
    Quarter,
}

impl CellPart {
    pub fn count(self) -> u32 {
        match self {
            CellPart::Full => 1,
            CellPart::Half => 2,
            CellPart::Quarter => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CellPart::Full => "Full cell",
            CellPart::Half => "Half cell",
            CellPart::Quarter => "Quarter cell",
        }
    }
}

/// Immutable per-scale configuration, selected from the fixed registry below.
#[derive(Debug, Clone, Copy)]
pub struct ScaleConfig {
    pub id: ScaleId,
    pub interval_unit: IntervalUnit,
    pub default_cell_part: CellPart,
    pub allowed_parts: &'static [CellPart],
    pub minimal_column_width: f32,
}

static SCALES: [ScaleConfig; 4] = [
    ScaleConfig {
        id: ScaleId::Day,
        interval_unit: IntervalUnit::Hour,
        default_cell_part: CellPart::Full,
        allowed_parts: &[CellPart::Full, CellPart::Half, CellPart::Quarter],
        minimal_column_width: 40.0,
    },
    ScaleConfig {
        id: ScaleId::Week,
        interval_unit: IntervalUnit::Day,
        default_cell_part: CellPart::Half,
        allowed_parts: &[CellPart::Full, CellPart::Half],
        minimal_column_width: 96.0,
    },
    ScaleConfig {
        id: ScaleId::Month,
        interval_unit: IntervalUnit::Day,
        default_cell_part: CellPart::Full,
        allowed_parts: &[CellPart::Full, CellPart::Half],
        minimal_column_width: 28.0,
    },
    ScaleConfig {
        id: ScaleId::Year,
        interval_unit: IntervalUnit::Month,
        default_cell_part: CellPart::Full,
        allowed_parts: &[CellPart::Full],
        minimal_column_width: 80.0,
    },
];

impl ScaleId {
    pub fn all() -> [ScaleId; 4] {
        [ScaleId::Day, ScaleId::Week, ScaleId::Month, ScaleId::Year]
    }

    pub fn config(self) -> &'static ScaleConfig {
        match self {
            ScaleId::Day => &SCALES[0],
            ScaleId::Week => &SCALES[1],
            ScaleId::Month => &SCALES[2],
            ScaleId::Year => &SCALES[3],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScaleId::Day => "Day",
            ScaleId::Week => "Week",
            ScaleId::Month => "Month",
            ScaleId::Year => "Year",
        }
    }

    /// Round a datetime down to the start of the scale unit containing it.
    pub fn align_down(self, date: NaiveDateTime) -> NaiveDateTime {
        let day = date.date();
        let start_of = |d: NaiveDate| d.and_hms_opt(0, 0, 0).unwrap_or(date);
        match self {
            ScaleId::Day => start_of(day),
            ScaleId::Week => {
                let back = day.weekday().num_days_from_monday() as i64;
                start_of(day - Duration::days(back))
            }
            ScaleId::Month => {
                start_of(NaiveDate::from_ymd_opt(day.year(), day.month(), 1).unwrap_or(day))
            }
            ScaleId::Year => start_of(NaiveDate::from_ymd_opt(day.year(), 1, 1).unwrap_or(day)),
        }
    }

    /// Round a datetime up to the next scale-unit boundary (identity when
    /// already on a boundary).
    pub fn align_up(self, date: NaiveDateTime) -> NaiveDateTime {
        let down = self.align_down(date);
        if down == date {
            date
        } else {
            self.next_unit(down)
        }
    }

    /// Start of the scale unit following the (aligned) given one.
    pub fn next_unit(self, aligned: NaiveDateTime) -> NaiveDateTime {
        match self {
            ScaleId::Day => aligned + Duration::days(1),
            ScaleId::Week => aligned + Duration::days(7),
            ScaleId::Month => IntervalUnit::Month.add(aligned, 1),
            ScaleId::Year => IntervalUnit::Month.add(aligned, 12),
        }
    }
}

impl IntervalUnit {
    /// Shift a datetime by a whole number of intervals (calendar-aware for
    /// months).
    pub fn add(self, date: NaiveDateTime, n: i64) -> NaiveDateTime {
        match self {
            IntervalUnit::Hour => date + Duration::hours(n),
            IntervalUnit::Day => date + Duration::days(n),
            IntervalUnit::Month => {
                let shifted = if n >= 0 {
                    date.checked_add_months(chrono::Months::new(n as u32))
                } else {
                    date.checked_sub_months(chrono::Months::new((-n) as u32))
                };
                shifted.unwrap_or(date)
            }
        }
    }

    /// Whole intervals between an interval-aligned `from` and `to`,
    /// rounded toward negative infinity.
    pub fn between(self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        match self {
            IntervalUnit::Hour => (to - from).num_seconds().div_euclid(3600),
            IntervalUnit::Day => (to - from).num_seconds().div_euclid(86_400),
            IntervalUnit::Month => {
                let months = |d: NaiveDateTime| d.year() as i64 * 12 + d.month0() as i64;
                months(to) - months(from)
            }
        }
    }

    /// Length in seconds of the interval starting at `start`.
    pub fn seconds_from(self, start: NaiveDateTime) -> i64 {
        match self {
            IntervalUnit::Hour => 3600,
            IntervalUnit::Day => 86_400,
            IntervalUnit::Month => (self.add(start, 1) - start).num_seconds(),
        }
    }

    pub fn align_down(self, date: NaiveDateTime) -> NaiveDateTime {
        let day = date.date();
        match self {
            IntervalUnit::Hour => day
                .and_hms_opt(date.hour(), 0, 0)
                .unwrap_or(date),
            IntervalUnit::Day => day.and_hms_opt(0, 0, 0).unwrap_or(date),
            IntervalUnit::Month => NaiveDate::from_ymd_opt(day.year(), day.month(), 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(date),
        }
    }
}

/// How the backend reschedules a record that has dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RescheduleMethod {
    /// Move only the record itself.
    Independent,
    /// Let the backend shift dependent records along.
    Cascade,
}

/// Numeric aggregation shown on group-level summary pills.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationParams {
    pub field: String,
    pub exclude_field: Option<String>,
    pub max_value: Option<f64>,
}

/// Declarative view description, produced by an external parser and consumed
/// read-only.
#[derive(Debug, Clone)]
pub struct ViewDefinition {
    pub title: String,
    pub date_start_field: String,
    pub date_stop_field: String,
    pub name_field: String,
    pub progress_field: Option<String>,
    pub color_field: Option<String>,
    pub dependency_field: Option<String>,
    pub inverse_dependency_field: Option<String>,
    pub default_group_by: Vec<String>,
    pub readonly_group_fields: HashSet<String>,
    pub unavailability_fields: Vec<String>,
    pub progress_bar_fields: Vec<String>,
    pub consolidation: Option<ConsolidationParams>,
    pub reschedule_method: RescheduleMethod,
    pub default_scale: ScaleId,
}

/// Snapshot of the visible window and everything a derivation pass needs.
///
/// MetaData is never mutated in place: scale or window changes build a new
/// value which the app swaps in only when the matching fetch lands, so the
/// renderer cannot observe a half-updated window.
#[derive(Debug, Clone)]
pub struct MetaData {
    pub scale: ScaleId,
    pub cell_part: CellPart,
    pub start_date: NaiveDateTime,
    pub stop_date: NaiveDateTime,
    pub global_start: NaiveDateTime,
    pub global_stop: NaiveDateTime,
    pub grouped_by: Vec<String>,
    pub date_start_field: String,
    pub date_stop_field: String,
    pub name_field: String,
    pub progress_field: Option<String>,
    pub color_field: Option<String>,
    pub dependency_field: Option<String>,
    pub inverse_dependency_field: Option<String>,
    pub unavailability_fields: Vec<String>,
    pub progress_bar_fields: Vec<String>,
    pub consolidation: Option<ConsolidationParams>,
    pub reschedule_method: RescheduleMethod,
}

impl MetaData {
    pub fn from_view(
        view: &ViewDefinition,
        scale: ScaleId,
        cell_part: CellPart,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Self {
        let part = if scale.config().allowed_parts.contains(&cell_part) {
            cell_part
        } else {
            scale.config().default_cell_part
        };
        Self {
            scale,
            cell_part: part,
            start_date: start,
            stop_date: stop,
            global_start: scale.align_down(start),
            global_stop: scale.align_up(stop),
            grouped_by: view.default_group_by.clone(),
            date_start_field: view.date_start_field.clone(),
            date_stop_field: view.date_stop_field.clone(),
            name_field: view.name_field.clone(),
            progress_field: view.progress_field.clone(),
            color_field: view.color_field.clone(),
            dependency_field: view.dependency_field.clone(),
            inverse_dependency_field: view.inverse_dependency_field.clone(),
            unavailability_fields: view.unavailability_fields.clone(),
            progress_bar_fields: view.progress_bar_fields.clone(),
            consolidation: view.consolidation.clone(),
            reschedule_method: view.reschedule_method,
        }
    }

    /// New MetaData with a different visible window; global bounds are the
    /// window rounded outward to whole scale units.
    pub fn with_window(&self, start: NaiveDateTime, stop: NaiveDateTime) -> Self {
        let mut next = self.clone();
        next.start_date = start;
        next.stop_date = stop;
        next.global_start = self.scale.align_down(start);
        next.global_stop = self.scale.align_up(stop);
        next
    }

    /// New MetaData at a different scale/precision, keeping the focus of the
    /// current window.
    pub fn with_scale(&self, scale: ScaleId, cell_part: CellPart) -> Self {
        let part = if scale.config().allowed_parts.contains(&cell_part) {
            cell_part
        } else {
            scale.config().default_cell_part
        };
        let mut next = self.clone();
        next.scale = scale;
        next.cell_part = part;
        next.global_start = scale.align_down(next.start_date);
        next.global_stop = scale.align_up(next.stop_date);
        next
    }

    pub fn with_group_by(&self, grouped_by: Vec<String>) -> Self {
        let mut next = self.clone();
        next.grouped_by = grouped_by;
        next
    }

    /// Interval columns between the global bounds.
    pub fn column_count(&self) -> u32 {
        let n = self
            .scale
            .config()
            .interval_unit
            .between(self.global_start, self.global_stop);
        n.max(0) as u32
    }
}

use chrono::{Duration, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;

use crate::model::meta::{IntervalUnit, MetaData};

/// Position of a datetime on the grid: a 1-based interval column plus the
/// number of sub-cells into it (`0..=cell_part`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAddress {
    pub column: u32,
    pub sub_delta: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpan {
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

/// Bidirectional mapping between calendar time and the integer column space.
///
/// Pure in `global_start` and the scale; a new grid is built whenever either
/// changes, which doubles as the memo-cache invalidation.
pub struct TimeGrid {
    global_start: NaiveDateTime,
    interval: IntervalUnit,
    cell_part: u32,
    columns: u32,
    span_cache: RefCell<HashMap<u32, ColumnSpan>>,
}

impl TimeGrid {
    pub fn new(meta: &MetaData) -> Self {
        Self {
            global_start: meta.global_start,
            interval: meta.scale.config().interval_unit,
            cell_part: meta.cell_part.count(),
            columns: meta.column_count().max(1),
            span_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn cell_part(&self) -> u32 {
        self.cell_part
    }

    pub fn total_sub_columns(&self) -> u32 {
        self.columns * self.cell_part
    }

    /// Map a datetime to its column address. The sub-delta is the ceiling of
    /// the fractional position in sub-cells: a datetime exactly on a sub-cell
    /// boundary yields that boundary, so a pill *starting* there occupies the
    /// cell after it while a pill *stopping* there does not. Zero-length and
    /// boundary-touching intervals therefore span zero sub-columns.
    ///
    /// Dates outside the global window clamp to the grid edges.
    pub fn date_to_column(&self, date: NaiveDateTime) -> ColumnAddress {
        if date <= self.global_start {
            return ColumnAddress {
                column: 1,
                sub_delta: 0,
            };
        }
        let whole = self.interval.between(self.global_start, date);
        if whole >= self.columns as i64 {
            return ColumnAddress {
                column: self.columns,
                sub_delta: self.cell_part,
            };
        }
        let interval_start = self.interval.add(self.global_start, whole);
        let len = self.interval.seconds_from(interval_start).max(1);
        let elapsed = (date - interval_start).num_seconds();
        let sub_delta = (elapsed * self.cell_part as i64 + len - 1).div_euclid(len);
        ColumnAddress {
            column: whole as u32 + 1,
            sub_delta: sub_delta as u32,
        }
    }

    /// Time span of a whole interval column (1-based). Memoized.
    pub fn column_to_dates(&self, column: u32) -> ColumnSpan {
        if let Some(span) = self.span_cache.borrow().get(&column) {
            return *span;
        }
        let column = column.clamp(1, self.columns);
        let span = ColumnSpan {
            start: self.interval.add(self.global_start, column as i64 - 1),
            stop: self.interval.add(self.global_start, column as i64),
        };
        self.span_cache.borrow_mut().insert(column, span);
        span
    }

    /// Time span of a single sub-column (1-based). Used for drag snapping and
    /// unavailability shading.
    pub fn sub_column_dates(&self, sub_col: u32) -> ColumnSpan {
        let sub_col = sub_col.clamp(1, self.total_sub_columns());
        let column = (sub_col - 1) / self.cell_part + 1;
        let sub = (sub_col - 1) % self.cell_part;
        let whole = self.column_to_dates(column);
        let len = (whole.stop - whole.start).num_seconds();
        let piece = len / self.cell_part as i64;
        let start = whole.start + Duration::seconds(sub as i64 * piece);
        let stop = if sub + 1 == self.cell_part {
            whole.stop
        } else {
            whole.start + Duration::seconds((sub + 1) as i64 * piece)
        };
        ColumnSpan { start, stop }
    }

    /// 1-based global sub-column index of the sub-cell starting at `addr`.
    /// The grid-end address maps to `total_sub_columns() + 1`, which is the
    /// exclusive bound of a full-window span.
    pub fn sub_index(&self, addr: ColumnAddress) -> u32 {
        (addr.column - 1) * self.cell_part + addr.sub_delta + 1
    }

    /// Sub-columns covered by `[start, stop)`:
    /// `cell_part × Δcolumn + Δsub_delta`, never negative.
    pub fn span(&self, start: ColumnAddress, stop: ColumnAddress) -> u32 {
        let a = self.sub_index(start) as i64;
        let b = self.sub_index(stop) as i64;
        (b - a).max(0) as u32
    }

    /// Translate a datetime by a signed number of sub-columns, calendar-aware
    /// for month intervals. This is the drag/resize delta conversion.
    pub fn shift_date(&self, date: NaiveDateTime, delta_sub_columns: i64) -> NaiveDateTime {
        let whole = delta_sub_columns.div_euclid(self.cell_part as i64);
        let rem = delta_sub_columns.rem_euclid(self.cell_part as i64);
        let shifted = self.interval.add(date, whole);
        if rem == 0 {
            return shifted;
        }
        let anchor = self.interval.align_down(shifted);
        let len = self.interval.seconds_from(anchor);
        shifted + Duration::seconds(rem * len / self.cell_part as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::meta::{CellPart, MetaData, ScaleId};
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn week_grid(cell_part: CellPart) -> TimeGrid {
        let view = crate::model::meta::tests::sample_view();
        // 2024-06-10 is a Monday; one-week window.
        let meta = MetaData::from_view(
            &view,
            ScaleId::Week,
            cell_part,
            dt(2024, 6, 10, 0),
            dt(2024, 6, 17, 0),
        );
        TimeGrid::new(&meta)
    }

    #[test]
    fn test_column_round_trip() {
        let grid = week_grid(CellPart::Half);
        for c in 1..=grid.columns() {
            let span = grid.column_to_dates(c);
            let addr = grid.date_to_column(span.start);
            assert_eq!(addr, ColumnAddress { column: c, sub_delta: 0 });
        }
    }

    #[test]
    fn test_half_day_boundary_rounding() {
        // A 3-day pill, Monday 09:00 to Wednesday 17:00, at half-day
        // precision: Mon-AM is excluded (09:00 rounds to the Mon-PM start),
        // Wed-PM is included. Exactly 5 half-day sub-columns.
        let grid = week_grid(CellPart::Half);
        let start = grid.date_to_column(dt(2024, 6, 10, 9));
        let stop = grid.date_to_column(dt(2024, 6, 12, 17));
        assert_eq!(start, ColumnAddress { column: 1, sub_delta: 1 });
        assert_eq!(stop, ColumnAddress { column: 3, sub_delta: 2 });
        assert_eq!(grid.span(start, stop), 5);
        assert_eq!(grid.sub_index(start), 2);
        assert_eq!(grid.sub_index(stop), 7);
    }

    #[test]
    fn test_boundary_start_included_stop_excluded() {
        let grid = week_grid(CellPart::Half);
        // Start exactly on the noon boundary occupies the afternoon cell.
        let start = grid.date_to_column(dt(2024, 6, 10, 12));
        assert_eq!(start.sub_delta, 1);
        // A stop on the same boundary covers nothing past it.
        let stop = grid.date_to_column(dt(2024, 6, 10, 12));
        assert_eq!(grid.span(start, stop), 0);
        // Zero-length intervals render with zero width, not one extra cell.
        let at = grid.date_to_column(dt(2024, 6, 11, 9));
        assert_eq!(grid.span(at, at), 0);
    }

    #[test]
    fn test_out_of_window_clamps() {
        let grid = week_grid(CellPart::Half);
        let before = grid.date_to_column(dt(2024, 6, 1, 0));
        assert_eq!(before, ColumnAddress { column: 1, sub_delta: 0 });
        let after = grid.date_to_column(dt(2024, 7, 1, 0));
        assert_eq!(after, ColumnAddress { column: 7, sub_delta: 2 });
        assert_eq!(grid.sub_index(after), grid.total_sub_columns() + 1);
    }

    #[test]
    fn test_sub_column_dates() {
        let grid = week_grid(CellPart::Half);
        let tue_pm = grid.sub_column_dates(4);
        assert_eq!(tue_pm.start, dt(2024, 6, 11, 12));
        assert_eq!(tue_pm.stop, dt(2024, 6, 12, 0));
    }

    #[test]
    fn test_shift_date_by_sub_columns() {
        let grid = week_grid(CellPart::Half);
        let d = dt(2024, 6, 10, 9);
        assert_eq!(grid.shift_date(d, 2), dt(2024, 6, 11, 9));
        assert_eq!(grid.shift_date(d, 1), dt(2024, 6, 10, 21));
        assert_eq!(grid.shift_date(d, -2), dt(2024, 6, 9, 9));
    }

    #[test]
    fn test_year_scale_month_columns() {
        let view = crate::model::meta::tests::sample_view();
        let meta = MetaData::from_view(
            &view,
            ScaleId::Year,
            CellPart::Full,
            dt(2024, 1, 1, 0),
            dt(2025, 1, 1, 0),
        );
        let grid = TimeGrid::new(&meta);
        assert_eq!(grid.columns(), 12);
        let feb = grid.column_to_dates(2);
        assert_eq!(feb.start, dt(2024, 2, 1, 0));
        assert_eq!(feb.stop, dt(2024, 3, 1, 0));
        // A mid-month date rounds up to the next month column.
        let addr = grid.date_to_column(dt(2024, 2, 15, 0));
        assert_eq!(addr, ColumnAddress { column: 2, sub_delta: 1 });
        // Month-aware shifting.
        assert_eq!(grid.shift_date(dt(2024, 1, 31, 0), 1), dt(2024, 2, 29, 0));
    }
}

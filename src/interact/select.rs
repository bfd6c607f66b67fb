use std::collections::HashSet;

use super::{CellRef, GestureContext, GestureOutcome, Modifiers};

/// A rectangular selected span on a single row, `[first_col, last_col)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRegion {
    pub row: usize,
    pub first_col: u32,
    pub last_col: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Replace,
    Union,
    Toggle,
}

/// Accumulated cell selection, kept as a sparse cell set so union and
/// symmetric difference stay trivial. Regions are recovered by coalescing
/// per-row runs.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    cells: HashSet<(usize, u32)>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn contains(&self, row: usize, col: u32) -> bool {
        self.cells.contains(&(row, col))
    }

    pub fn apply(&mut self, cells: &[(usize, u32)], mode: SelectMode) {
        match mode {
            SelectMode::Replace => {
                self.cells = cells.iter().copied().collect();
            }
            SelectMode::Union => {
                self.cells.extend(cells.iter().copied());
            }
            SelectMode::Toggle => {
                for cell in cells {
                    if !self.cells.remove(cell) {
                        self.cells.insert(*cell);
                    }
                }
            }
        }
    }

    /// Per-row runs of contiguous selected columns, ordered by row then
    /// column.
    pub fn regions(&self) -> Vec<CellRegion> {
        let mut sorted: Vec<(usize, u32)> = self.cells.iter().copied().collect();
        sorted.sort();
        let mut regions: Vec<CellRegion> = Vec::new();
        for (row, col) in sorted {
            match regions.last_mut() {
                Some(tail) if tail.row == row && tail.last_col == col => {
                    tail.last_col = col + 1;
                }
                _ => regions.push(CellRegion {
                    row,
                    first_col: col,
                    last_col: col + 1,
                }),
            }
        }
        regions
    }
}

/// Drag-to-select machine. One rectangular region per crossed row; with the
/// multi-create mode active the drag unions into (or, with Ctrl, toggles
/// against) the existing selection instead of replacing it.
#[derive(Debug, Clone)]
pub enum SelectState {
    Idle,
    Active {
        anchor: CellRef,
        current: CellRef,
        mode: SelectMode,
    },
}

impl SelectState {
    pub fn begin(&mut self, anchor: CellRef, modifiers: Modifiers, multi_create: bool) {
        let mode = if multi_create {
            if modifiers.ctrl {
                SelectMode::Toggle
            } else {
                SelectMode::Union
            }
        } else {
            SelectMode::Replace
        };
        *self = SelectState::Active {
            anchor,
            current: anchor,
            mode,
        };
    }

    pub fn on_move(&mut self, cell: CellRef) {
        if let SelectState::Active { current, .. } = self {
            *current = cell;
        }
    }

    pub fn on_up(
        &mut self,
        cell: CellRef,
        ctx: &GestureContext<'_>,
        selection: &mut Selection,
    ) -> GestureOutcome {
        match std::mem::replace(self, SelectState::Idle) {
            SelectState::Idle => GestureOutcome::Quiet,
            SelectState::Active { anchor, mode, .. } => {
                let cells = rect_cells(anchor, cell, ctx);
                selection.apply(&cells, mode);
                GestureOutcome::Quiet
            }
        }
    }

    /// The in-flight rectangle, for highlight painting.
    pub fn preview(&self) -> Option<(CellRef, CellRef)> {
        match self {
            SelectState::Active {
                anchor, current, ..
            } => Some((*anchor, *current)),
            _ => None,
        }
    }
}

/// Cells of the rectangle spanned by two corners, restricted to rows that
/// accept writes.
fn rect_cells(a: CellRef, b: CellRef, ctx: &GestureContext<'_>) -> Vec<(usize, u32)> {
    let rows = a.row.min(b.row)..=a.row.max(b.row);
    let cols = a.col.min(b.col)..=a.col.max(b.col);
    let mut cells = Vec::new();
    for row in rows {
        if !ctx.row_accepts_writes(row) {
            continue;
        }
        for col in cols.clone() {
            cells.push((row, col));
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::time_grid::TimeGrid;
    use crate::interact::{DomainEvent, HitTarget, InteractionEngine, PointerEvent};
    use crate::model::meta::{CellPart, MetaData, ScaleId};
    use crate::model::row::{FlatRow, RowId};
    use chrono::NaiveDate;
    use serde_json::json;

    fn fixture() -> (TimeGrid, Vec<FlatRow>) {
        let start = NaiveDate::from_ymd_opt(2024, 6, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let stop = NaiveDate::from_ymd_opt(2024, 6, 17)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let view = crate::model::meta::tests::sample_view();
        let meta = MetaData::from_view(&view, ScaleId::Week, CellPart::Full, start, stop);
        let grid = TimeGrid::new(&meta);
        let row = |name: &str, is_group: bool| FlatRow {
            id: RowId::from_path(&[("team".to_string(), json!(name))]),
            level: 0,
            is_group,
            name: name.into(),
            locked: false,
            closed: false,
            group_path: vec![("team".to_string(), json!(name))],
            record_ids: vec![],
        };
        (grid, vec![row("Alpha", false), row("All", true), row("Beta", false)])
    }

    fn drag_select(
        engine: &mut InteractionEngine,
        ctx: &GestureContext<'_>,
        from: CellRef,
        to: CellRef,
        modifiers: Modifiers,
    ) {
        engine.handle(
            PointerEvent::Down {
                target: HitTarget::Cell,
                cell: from,
                modifiers,
            },
            ctx,
        );
        engine.handle(PointerEvent::Move { cell: to }, ctx);
        engine.handle(
            PointerEvent::Up {
                target: HitTarget::Cell,
                cell: to,
            },
            ctx,
        );
    }

    #[test]
    fn test_rect_select_skips_group_rows() {
        let (grid, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &[],
            rows: &rows,
            multi_create: true,
        };
        let mut engine = InteractionEngine::new();
        drag_select(
            &mut engine,
            &ctx,
            CellRef { row: 0, col: 2 },
            CellRef { row: 2, col: 3 },
            Modifiers::default(),
        );
        assert_eq!(
            engine.selection.regions(),
            vec![
                CellRegion {
                    row: 0,
                    first_col: 2,
                    last_col: 4
                },
                CellRegion {
                    row: 2,
                    first_col: 2,
                    last_col: 4
                },
            ]
        );
    }

    #[test]
    fn test_union_accumulates_disjoint_regions() {
        let (grid, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &[],
            rows: &rows,
            multi_create: true,
        };
        let mut engine = InteractionEngine::new();
        drag_select(
            &mut engine,
            &ctx,
            CellRef { row: 0, col: 1 },
            CellRef { row: 0, col: 2 },
            Modifiers::default(),
        );
        drag_select(
            &mut engine,
            &ctx,
            CellRef { row: 0, col: 5 },
            CellRef { row: 0, col: 6 },
            Modifiers::default(),
        );
        assert_eq!(engine.selection.regions().len(), 2);
    }

    #[test]
    fn test_ctrl_toggles_symmetric_difference() {
        let (grid, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &[],
            rows: &rows,
            multi_create: true,
        };
        let mut engine = InteractionEngine::new();
        drag_select(
            &mut engine,
            &ctx,
            CellRef { row: 0, col: 1 },
            CellRef { row: 0, col: 4 },
            Modifiers::default(),
        );
        // Toggle the middle out again.
        drag_select(
            &mut engine,
            &ctx,
            CellRef { row: 0, col: 2 },
            CellRef { row: 0, col: 3 },
            Modifiers {
                ctrl: true,
                copy: false,
            },
        );
        assert_eq!(
            engine.selection.regions(),
            vec![
                CellRegion {
                    row: 0,
                    first_col: 1,
                    last_col: 2
                },
                CellRegion {
                    row: 0,
                    first_col: 4,
                    last_col: 5
                },
            ]
        );
    }

    #[test]
    fn test_replace_mode_without_multi_create() {
        let (grid, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &[],
            rows: &rows,
            multi_create: false,
        };
        let mut engine = InteractionEngine::new();
        drag_select(
            &mut engine,
            &ctx,
            CellRef { row: 0, col: 1 },
            CellRef { row: 0, col: 2 },
            Modifiers::default(),
        );
        drag_select(
            &mut engine,
            &ctx,
            CellRef { row: 2, col: 5 },
            CellRef { row: 2, col: 5 },
            Modifiers::default(),
        );
        assert_eq!(
            engine.selection.regions(),
            vec![CellRegion {
                row: 2,
                first_col: 5,
                last_col: 6
            }]
        );
    }

    #[test]
    fn test_commit_selection_emits_multi_create() {
        let (grid, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &[],
            rows: &rows,
            multi_create: true,
        };
        let mut engine = InteractionEngine::new();
        assert!(engine.commit_selection().is_none());
        drag_select(
            &mut engine,
            &ctx,
            CellRef { row: 0, col: 1 },
            CellRef { row: 0, col: 2 },
            Modifiers::default(),
        );
        let event = engine.commit_selection().unwrap();
        match event {
            DomainEvent::MultiCreate { regions } => {
                assert_eq!(regions.len(), 1);
                assert_eq!(regions[0].first_col, 1);
                assert_eq!(regions[0].last_col, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(engine.selection.is_empty());
    }
}

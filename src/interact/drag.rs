use chrono::NaiveDateTime;

use super::{CellRef, DomainEvent, GestureContext, GestureOutcome};
use crate::model::pill::PillId;
use crate::model::record::RecordId;

/// Pre-gesture values of the grabbed pill, captured at pointer-down. A
/// cancelled gesture reverts to exactly this; a committed one derives its
/// deltas from it.
#[derive(Debug, Clone)]
pub struct DragSnapshot {
    pub pill: PillId,
    pub record_id: RecordId,
    pub row_index: usize,
    pub first_col: u32,
    pub last_col: u32,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl DragSnapshot {
    pub fn capture(id: PillId, ctx: &GestureContext<'_>) -> Option<Self> {
        let pill = ctx.pill(id)?;
        let record_id = pill.record_id?;
        Some(Self {
            pill: id,
            record_id,
            row_index: pill.row_index,
            first_col: pill.first_col,
            last_col: pill.last_col,
            start: pill.start,
            stop: pill.stop,
        })
    }
}

/// Drag-to-reschedule / drag-to-copy machine. The copy modifier is sampled
/// once at gesture start and holds for the whole drag.
#[derive(Debug, Clone)]
pub enum DragState {
    Idle,
    Pending {
        snapshot: DragSnapshot,
        press: CellRef,
        copy: bool,
    },
    Active {
        snapshot: DragSnapshot,
        press: CellRef,
        current: CellRef,
        copy: bool,
    },
}

/// Ghost geometry for the rendering adapter while a drag is in flight.
#[derive(Debug, Clone, Copy)]
pub struct DragPreview {
    pub row_index: usize,
    pub first_col: i64,
    pub last_col: i64,
    pub copy: bool,
}

impl DragState {
    pub fn begin(&mut self, snapshot: DragSnapshot, press: CellRef, copy: bool) {
        *self = DragState::Pending {
            snapshot,
            press,
            copy,
        };
    }

    pub fn on_move(&mut self, cell: CellRef) {
        match std::mem::replace(self, DragState::Idle) {
            DragState::Pending {
                snapshot,
                press,
                copy,
            } => {
                // Threshold: the gesture only arms once the pointer leaves
                // the press cell.
                if cell == press {
                    *self = DragState::Pending {
                        snapshot,
                        press,
                        copy,
                    };
                } else {
                    *self = DragState::Active {
                        snapshot,
                        press,
                        current: cell,
                        copy,
                    };
                }
            }
            DragState::Active {
                snapshot,
                press,
                copy,
                ..
            } => {
                *self = DragState::Active {
                    snapshot,
                    press,
                    current: cell,
                    copy,
                };
            }
            DragState::Idle => {}
        }
    }

    pub fn on_up(&mut self, cell: CellRef, ctx: &GestureContext<'_>) -> GestureOutcome {
        match std::mem::replace(self, DragState::Idle) {
            DragState::Idle => GestureOutcome::Quiet,
            // A press that never moved is a click, not a drag.
            DragState::Pending { .. } => GestureOutcome::Quiet,
            DragState::Active {
                snapshot,
                press,
                copy,
                ..
            } => {
                if !ctx.row_accepts_writes(cell.row) {
                    return GestureOutcome::Invalid(
                        "This row does not accept scheduled records".to_string(),
                    );
                }
                let delta = cell.col as i64 - press.col as i64;
                if delta == 0 && cell.row == snapshot.row_index {
                    return GestureOutcome::Cancelled;
                }
                let start = ctx.grid.shift_date(snapshot.start, delta);
                let stop = ctx.grid.shift_date(snapshot.stop, delta);
                let row_changes = if cell.row != snapshot.row_index {
                    ctx.row(cell.row)
                        .map(|r| r.group_path.clone())
                        .unwrap_or_default()
                } else {
                    Vec::new()
                };
                if copy {
                    GestureOutcome::Event(DomainEvent::Duplicate {
                        record_id: snapshot.record_id,
                        start,
                        stop,
                        row_changes,
                    })
                } else {
                    GestureOutcome::Event(DomainEvent::Reschedule {
                        record_id: snapshot.record_id,
                        start: Some(start),
                        stop: Some(stop),
                        row_changes,
                    })
                }
            }
        }
    }

    pub fn preview(&self) -> Option<DragPreview> {
        match self {
            DragState::Active {
                snapshot,
                press,
                current,
                copy,
            } => {
                let delta = current.col as i64 - press.col as i64;
                Some(DragPreview {
                    row_index: current.row,
                    first_col: snapshot.first_col as i64 + delta,
                    last_col: snapshot.last_col as i64 + delta,
                    copy: *copy,
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Start,
    Stop,
}

/// Start/stop-handle resize machine; adjusts only its own date field.
#[derive(Debug, Clone)]
pub enum ResizeState {
    Idle,
    Pending {
        snapshot: DragSnapshot,
        edge: ResizeEdge,
        press_col: u32,
    },
    Active {
        snapshot: DragSnapshot,
        edge: ResizeEdge,
        press_col: u32,
        current_col: u32,
    },
}

impl ResizeState {
    pub fn begin(&mut self, snapshot: DragSnapshot, edge: ResizeEdge, press_col: u32) {
        *self = ResizeState::Pending {
            snapshot,
            edge,
            press_col,
        };
    }

    pub fn on_move(&mut self, col: u32) {
        match std::mem::replace(self, ResizeState::Idle) {
            ResizeState::Pending {
                snapshot,
                edge,
                press_col,
            } => {
                if col == press_col {
                    *self = ResizeState::Pending {
                        snapshot,
                        edge,
                        press_col,
                    };
                } else {
                    *self = ResizeState::Active {
                        snapshot,
                        edge,
                        press_col,
                        current_col: col,
                    };
                }
            }
            ResizeState::Active {
                snapshot,
                edge,
                press_col,
                ..
            } => {
                *self = ResizeState::Active {
                    snapshot,
                    edge,
                    press_col,
                    current_col: col,
                };
            }
            ResizeState::Idle => {}
        }
    }

    pub fn on_up(&mut self, ctx: &GestureContext<'_>) -> GestureOutcome {
        match std::mem::replace(self, ResizeState::Idle) {
            ResizeState::Idle => GestureOutcome::Quiet,
            ResizeState::Pending { .. } => GestureOutcome::Quiet,
            ResizeState::Active {
                snapshot,
                edge,
                press_col,
                current_col,
            } => {
                let delta = current_col as i64 - press_col as i64;
                if delta == 0 {
                    return GestureOutcome::Cancelled;
                }
                match edge {
                    ResizeEdge::Start => {
                        let start = ctx.grid.shift_date(snapshot.start, delta);
                        if start > snapshot.stop {
                            return GestureOutcome::Invalid(
                                "The start date must precede the stop date".to_string(),
                            );
                        }
                        GestureOutcome::Event(DomainEvent::Reschedule {
                            record_id: snapshot.record_id,
                            start: Some(start),
                            stop: None,
                            row_changes: Vec::new(),
                        })
                    }
                    ResizeEdge::Stop => {
                        let stop = ctx.grid.shift_date(snapshot.stop, delta);
                        if stop < snapshot.start {
                            return GestureOutcome::Invalid(
                                "The stop date must follow the start date".to_string(),
                            );
                        }
                        GestureOutcome::Event(DomainEvent::Reschedule {
                            record_id: snapshot.record_id,
                            start: None,
                            stop: Some(stop),
                            row_changes: Vec::new(),
                        })
                    }
                }
            }
        }
    }

    /// Preview of the edge being dragged, in sub-columns.
    pub fn preview(&self) -> Option<(PillId, ResizeEdge, i64)> {
        match self {
            ResizeState::Active {
                snapshot,
                edge,
                press_col,
                current_col,
            } => Some((
                snapshot.pill,
                *edge,
                *current_col as i64 - *press_col as i64,
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::time_grid::TimeGrid;
    use crate::interact::{HitTarget, InteractionEngine, Modifiers, PointerEvent};
    use crate::model::meta::{CellPart, MetaData, ScaleId};
    use crate::model::pill::Pill;
    use crate::model::row::{FlatRow, RowId};
    use chrono::{NaiveDate, NaiveDateTime};
    use serde_json::json;
    use uuid::Uuid;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn fixture() -> (TimeGrid, Vec<Pill>, Vec<FlatRow>) {
        let view = crate::model::meta::tests::sample_view();
        let meta = MetaData::from_view(
            &view,
            ScaleId::Week,
            CellPart::Full,
            dt(10, 0),
            dt(17, 0),
        );
        let grid = TimeGrid::new(&meta);
        let row_a = RowId::from_path(&[("team".to_string(), json!("Alpha"))]);
        let row_b = RowId::from_path(&[("team".to_string(), json!("Beta"))]);
        let rows = vec![
            FlatRow {
                id: row_a.clone(),
                level: 0,
                is_group: false,
                name: "Alpha".into(),
                locked: false,
                closed: false,
                group_path: vec![("team".to_string(), json!("Alpha"))],
                record_ids: vec![],
            },
            FlatRow {
                id: row_b.clone(),
                level: 0,
                is_group: false,
                name: "Beta".into(),
                locked: true,
                closed: false,
                group_path: vec![("team".to_string(), json!("Beta"))],
                record_ids: vec![],
            },
        ];
        // Tuesday through Thursday.
        let pill = Pill {
            id: PillId(1),
            record_id: Some(Uuid::new_v4()),
            row_id: row_a,
            row_index: 0,
            first_col: 2,
            last_col: 4,
            level: 0,
            start: dt(11, 0),
            stop: dt(13, 0),
            disable_start_resize: false,
            disable_stop_resize: false,
            aggregate: None,
        };
        (grid, vec![pill], rows)
    }

    fn cell(row: usize, col: u32) -> CellRef {
        CellRef { row, col }
    }

    #[test]
    fn test_drag_commit_shifts_both_dates() {
        let (grid, pills, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let record_id = pills[0].record_id.unwrap();
        let mut engine = InteractionEngine::new();

        engine.handle(
            PointerEvent::Down {
                target: HitTarget::Pill(PillId(1)),
                cell: cell(0, 2),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        engine.handle(PointerEvent::Move { cell: cell(0, 4) }, &ctx);
        let outcome = engine.handle(
            PointerEvent::Up {
                target: HitTarget::Cell,
                cell: cell(0, 4),
            },
            &ctx,
        );
        assert_eq!(
            outcome,
            GestureOutcome::Event(DomainEvent::Reschedule {
                record_id,
                start: Some(dt(13, 0)),
                stop: Some(dt(15, 0)),
                row_changes: vec![],
            })
        );
        assert!(!engine.gesture_active());
    }

    #[test]
    fn test_escape_before_drop_emits_nothing() {
        let (grid, pills, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let mut engine = InteractionEngine::new();

        engine.handle(
            PointerEvent::Down {
                target: HitTarget::Pill(PillId(1)),
                cell: cell(0, 2),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        engine.handle(PointerEvent::Move { cell: cell(0, 4) }, &ctx);
        assert!(engine.drag.preview().is_some());

        let outcome = engine.handle(PointerEvent::Escape, &ctx);
        assert_eq!(outcome, GestureOutcome::Cancelled);
        assert!(engine.drag.preview().is_none());
        // A later pointer-up must not resurrect the gesture.
        let after = engine.handle(
            PointerEvent::Up {
                target: HitTarget::Cell,
                cell: cell(0, 4),
            },
            &ctx,
        );
        assert_eq!(after, GestureOutcome::Quiet);
    }

    #[test]
    fn test_copy_modifier_sampled_at_start() {
        let (grid, pills, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let record_id = pills[0].record_id.unwrap();
        let mut engine = InteractionEngine::new();

        engine.handle(
            PointerEvent::Down {
                target: HitTarget::Pill(PillId(1)),
                cell: cell(0, 2),
                modifiers: Modifiers {
                    ctrl: true,
                    copy: true,
                },
            },
            &ctx,
        );
        engine.handle(PointerEvent::Move { cell: cell(0, 3) }, &ctx);
        assert!(engine.drag.preview().unwrap().copy);
        let outcome = engine.handle(
            PointerEvent::Up {
                target: HitTarget::Cell,
                cell: cell(0, 3),
            },
            &ctx,
        );
        match outcome {
            GestureOutcome::Event(DomainEvent::Duplicate {
                record_id: id,
                start,
                ..
            }) => {
                assert_eq!(id, record_id);
                assert_eq!(start, dt(12, 0));
            }
            other => panic!("expected a duplicate event, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_on_locked_row_is_invalid() {
        let (grid, pills, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let mut engine = InteractionEngine::new();

        engine.handle(
            PointerEvent::Down {
                target: HitTarget::Pill(PillId(1)),
                cell: cell(0, 2),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        engine.handle(PointerEvent::Move { cell: cell(1, 2) }, &ctx);
        let outcome = engine.handle(
            PointerEvent::Up {
                target: HitTarget::Cell,
                cell: cell(1, 2),
            },
            &ctx,
        );
        assert!(matches!(outcome, GestureOutcome::Invalid(_)));
    }

    #[test]
    fn test_locked_row_vetoes_pill_grab() {
        let (grid, mut pills, rows) = fixture();
        pills[0].row_index = 1;
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let mut engine = InteractionEngine::new();
        engine.handle(
            PointerEvent::Down {
                target: HitTarget::Pill(PillId(1)),
                cell: cell(1, 2),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        assert!(!engine.gesture_active());
    }

    #[test]
    fn test_row_change_carries_group_values() {
        let (grid, mut pills, mut rows) = fixture();
        rows[1].locked = false;
        pills[0].row_index = 0;
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let mut engine = InteractionEngine::new();
        engine.handle(
            PointerEvent::Down {
                target: HitTarget::Pill(PillId(1)),
                cell: cell(0, 2),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        engine.handle(PointerEvent::Move { cell: cell(1, 2) }, &ctx);
        let outcome = engine.handle(
            PointerEvent::Up {
                target: HitTarget::Cell,
                cell: cell(1, 2),
            },
            &ctx,
        );
        match outcome {
            GestureOutcome::Event(DomainEvent::Reschedule {
                start,
                stop,
                row_changes,
                ..
            }) => {
                // Same column: dates unchanged, only the group values move.
                assert_eq!(start, Some(dt(11, 0)));
                assert_eq!(stop, Some(dt(13, 0)));
                assert_eq!(row_changes, vec![("team".to_string(), json!("Beta"))]);
            }
            other => panic!("expected a reschedule event, got {other:?}"),
        }
    }

    #[test]
    fn test_resize_inversion_rejected_without_event() {
        let (grid, pills, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let mut engine = InteractionEngine::new();

        // Drag the start handle 4 days right: start would land after stop.
        engine.handle(
            PointerEvent::Down {
                target: HitTarget::StartHandle(PillId(1)),
                cell: cell(0, 2),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        engine.handle(PointerEvent::Move { cell: cell(0, 6) }, &ctx);
        let outcome = engine.handle(
            PointerEvent::Up {
                target: HitTarget::Cell,
                cell: cell(0, 6),
            },
            &ctx,
        );
        assert!(matches!(outcome, GestureOutcome::Invalid(_)));
        assert!(!engine.gesture_active());
    }

    #[test]
    fn test_resize_stop_adjusts_single_field() {
        let (grid, pills, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let record_id = pills[0].record_id.unwrap();
        let mut engine = InteractionEngine::new();

        engine.handle(
            PointerEvent::Down {
                target: HitTarget::StopHandle(PillId(1)),
                cell: cell(0, 4),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        engine.handle(PointerEvent::Move { cell: cell(0, 5) }, &ctx);
        let outcome = engine.handle(
            PointerEvent::Up {
                target: HitTarget::Cell,
                cell: cell(0, 5),
            },
            &ctx,
        );
        assert_eq!(
            outcome,
            GestureOutcome::Event(DomainEvent::Reschedule {
                record_id,
                start: None,
                stop: Some(dt(14, 0)),
                row_changes: vec![],
            })
        );
    }

    #[test]
    fn test_second_gesture_blocked_while_active() {
        let (grid, pills, rows) = fixture();
        let ctx = GestureContext {
            grid: &grid,
            pills: &pills,
            rows: &rows,
            multi_create: false,
        };
        let mut engine = InteractionEngine::new();
        engine.handle(
            PointerEvent::Down {
                target: HitTarget::Pill(PillId(1)),
                cell: cell(0, 2),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        // A second pointer-down must not start the resize machine.
        engine.handle(
            PointerEvent::Down {
                target: HitTarget::StartHandle(PillId(1)),
                cell: cell(0, 2),
                modifiers: Modifiers::default(),
            },
            &ctx,
        );
        assert!(matches!(engine.resize, ResizeState::Idle));
        assert!(!matches!(engine.drag, DragState::Idle));
    }
}

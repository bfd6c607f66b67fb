//! Pointer-gesture state machines.
//!
//! Every gesture is a tagged union driven by pure transition functions over
//! `PointerEvent`s: `Idle → Pending (pointer-down) → Active (moved past the
//! cell threshold) → committed or cancelled`. The machines know nothing about
//! the windowing toolkit; the rendering adapter translates pixels into cell
//! coordinates and hit targets before events reach this module.

pub mod connect;
pub mod drag;
pub mod select;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::grid::time_grid::TimeGrid;
use crate::model::pill::{Pill, PillId};
use crate::model::record::RecordId;
use crate::model::row::FlatRow;

pub use connect::ConnectState;
pub use drag::{DragSnapshot, DragState, ResizeEdge, ResizeState};
pub use select::{CellRegion, SelectState, Selection};

/// A grid cell under the pointer: flat-row index plus 1-based total
/// sub-column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: usize,
    pub col: u32,
}

/// What the pointer went down on / came up over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Pill(PillId),
    StartHandle(PillId),
    StopHandle(PillId),
    LinkHandle(PillId),
    Cell,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    /// The drag-to-copy modifier, sampled at gesture start.
    pub copy: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum PointerEvent {
    Down {
        target: HitTarget,
        cell: CellRef,
        modifiers: Modifiers,
    },
    Move {
        cell: CellRef,
    },
    Up {
        target: HitTarget,
        cell: CellRef,
    },
    Escape,
}

/// Structured domain event a committed gesture translates into.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Reschedule {
        record_id: RecordId,
        start: Option<NaiveDateTime>,
        stop: Option<NaiveDateTime>,
        row_changes: Vec<(String, Value)>,
    },
    Duplicate {
        record_id: RecordId,
        start: NaiveDateTime,
        stop: NaiveDateTime,
        row_changes: Vec<(String, Value)>,
    },
    Connect {
        master: RecordId,
        slave: RecordId,
    },
    MultiCreate {
        regions: Vec<CellRegion>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    Quiet,
    Event(DomainEvent),
    /// Client-side validation failure: message for a transient inline
    /// notice; the gesture reverts and nothing is written.
    Invalid(String),
    Cancelled,
}

/// Read-only view of the derived state a transition needs.
pub struct GestureContext<'a> {
    pub grid: &'a TimeGrid,
    pub pills: &'a [Pill],
    pub rows: &'a [FlatRow],
    pub multi_create: bool,
}

impl<'a> GestureContext<'a> {
    pub fn pill(&self, id: PillId) -> Option<&Pill> {
        self.pills.iter().find(|p| p.id == id)
    }

    pub fn row(&self, index: usize) -> Option<&FlatRow> {
        self.rows.get(index)
    }

    /// A row accepts drops and selection only when it is a leaf and not
    /// locked by a read-only group field.
    pub fn row_accepts_writes(&self, index: usize) -> bool {
        self.row(index)
            .map(|r| !r.is_group && !r.locked)
            .unwrap_or(false)
    }
}

/// Owns the per-gesture machines and enforces exclusivity: a pointer-down is
/// ignored while any other gesture is active.
pub struct InteractionEngine {
    pub drag: DragState,
    pub resize: ResizeState,
    pub connect: ConnectState,
    pub select: SelectState,
    pub selection: Selection,
}

impl Default for InteractionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionEngine {
    pub fn new() -> Self {
        Self {
            drag: DragState::Idle,
            resize: ResizeState::Idle,
            connect: ConnectState::Idle,
            select: SelectState::Idle,
            selection: Selection::new(),
        }
    }

    pub fn gesture_active(&self) -> bool {
        !matches!(self.drag, DragState::Idle)
            || !matches!(self.resize, ResizeState::Idle)
            || !matches!(self.connect, ConnectState::Idle)
            || !matches!(self.select, SelectState::Idle)
    }

    /// Pill ids are minted per derivation pass; any gesture holding one must
    /// die with the pass it came from. Cell-based selection survives.
    pub fn invalidate_pass_state(&mut self) {
        self.drag = DragState::Idle;
        self.resize = ResizeState::Idle;
        self.connect = ConnectState::Idle;
        self.select = SelectState::Idle;
    }

    pub fn handle(&mut self, event: PointerEvent, ctx: &GestureContext<'_>) -> GestureOutcome {
        match event {
            PointerEvent::Down {
                target,
                cell,
                modifiers,
            } => self.on_down(target, cell, modifiers, ctx),
            PointerEvent::Move { cell } => self.on_move(cell, ctx),
            PointerEvent::Up { target, cell } => self.on_up(target, cell, ctx),
            PointerEvent::Escape => self.on_escape(),
        }
    }

    fn on_down(
        &mut self,
        target: HitTarget,
        cell: CellRef,
        modifiers: Modifiers,
        ctx: &GestureContext<'_>,
    ) -> GestureOutcome {
        if self.gesture_active() {
            return GestureOutcome::Quiet;
        }
        match target {
            HitTarget::Pill(id) => {
                let Some(snapshot) = DragSnapshot::capture(id, ctx) else {
                    return GestureOutcome::Quiet;
                };
                if ctx.row(snapshot.row_index).map(|r| r.locked).unwrap_or(true) {
                    // Undraggable lock: read-only group rows veto the gesture.
                    return GestureOutcome::Quiet;
                }
                self.drag.begin(snapshot, cell, modifiers.copy);
                GestureOutcome::Quiet
            }
            HitTarget::StartHandle(id) | HitTarget::StopHandle(id) => {
                let edge = match target {
                    HitTarget::StartHandle(_) => ResizeEdge::Start,
                    _ => ResizeEdge::Stop,
                };
                let Some(snapshot) = DragSnapshot::capture(id, ctx) else {
                    return GestureOutcome::Quiet;
                };
                let resizable = ctx
                    .pill(id)
                    .map(|p| match edge {
                        ResizeEdge::Start => !p.disable_start_resize,
                        ResizeEdge::Stop => !p.disable_stop_resize,
                    })
                    .unwrap_or(false);
                if !resizable
                    || ctx.row(snapshot.row_index).map(|r| r.locked).unwrap_or(true)
                {
                    return GestureOutcome::Quiet;
                }
                self.resize.begin(snapshot, edge, cell.col);
                GestureOutcome::Quiet
            }
            HitTarget::LinkHandle(id) => {
                if ctx.pill(id).and_then(|p| p.record_id).is_none() {
                    return GestureOutcome::Quiet;
                }
                self.connect.begin(id, cell);
                GestureOutcome::Quiet
            }
            HitTarget::Cell => {
                if !ctx.row_accepts_writes(cell.row) {
                    return GestureOutcome::Quiet;
                }
                self.select.begin(cell, modifiers, ctx.multi_create);
                GestureOutcome::Quiet
            }
        }
    }

    fn on_move(&mut self, cell: CellRef, _ctx: &GestureContext<'_>) -> GestureOutcome {
        if !matches!(self.drag, DragState::Idle) {
            self.drag.on_move(cell);
        } else if !matches!(self.resize, ResizeState::Idle) {
            self.resize.on_move(cell.col);
        } else if !matches!(self.connect, ConnectState::Idle) {
            self.connect.on_move(cell);
        } else if !matches!(self.select, SelectState::Idle) {
            self.select.on_move(cell);
        }
        GestureOutcome::Quiet
    }

    fn on_up(
        &mut self,
        target: HitTarget,
        cell: CellRef,
        ctx: &GestureContext<'_>,
    ) -> GestureOutcome {
        if !matches!(self.drag, DragState::Idle) {
            self.drag.on_up(cell, ctx)
        } else if !matches!(self.resize, ResizeState::Idle) {
            self.resize.on_up(ctx)
        } else if !matches!(self.connect, ConnectState::Idle) {
            self.connect.on_up(target, ctx)
        } else if !matches!(self.select, SelectState::Idle) {
            self.select.on_up(cell, ctx, &mut self.selection)
        } else {
            GestureOutcome::Quiet
        }
    }

    fn on_escape(&mut self) -> GestureOutcome {
        if !self.gesture_active() {
            return GestureOutcome::Quiet;
        }
        self.invalidate_pass_state();
        GestureOutcome::Cancelled
    }

    /// Turn the accumulated multi-create selection into a domain event and
    /// clear it.
    pub fn commit_selection(&mut self) -> Option<DomainEvent> {
        let regions = self.selection.regions();
        if regions.is_empty() {
            return None;
        }
        self.selection.clear();
        Some(DomainEvent::MultiCreate { regions })
    }
}

use super::{CellRef, DomainEvent, GestureContext, GestureOutcome, HitTarget};
use crate::model::pill::PillId;

/// Connector-creation drag: starts on a pill's link handle, commits on a
/// different pill's body. The source pill is the master of the new
/// dependency.
#[derive(Debug, Clone)]
pub enum ConnectState {
    Idle,
    Pending { source: PillId, press: CellRef },
    Active { source: PillId, current: CellRef },
}

impl ConnectState {
    pub fn begin(&mut self, source: PillId, press: CellRef) {
        *self = ConnectState::Pending { source, press };
    }

    pub fn on_move(&mut self, cell: CellRef) {
        match *self {
            ConnectState::Pending { source, press } => {
                if cell != press {
                    *self = ConnectState::Active {
                        source,
                        current: cell,
                    };
                }
            }
            ConnectState::Active { source, .. } => {
                *self = ConnectState::Active {
                    source,
                    current: cell,
                };
            }
            ConnectState::Idle => {}
        }
    }

    pub fn on_up(&mut self, target: HitTarget, ctx: &GestureContext<'_>) -> GestureOutcome {
        let source = match std::mem::replace(self, ConnectState::Idle) {
            ConnectState::Idle => return GestureOutcome::Quiet,
            ConnectState::Pending { source, .. } | ConnectState::Active { source, .. } => source,
        };
        let dropped_on = match target {
            HitTarget::Pill(id)
            | HitTarget::StartHandle(id)
            | HitTarget::StopHandle(id)
            | HitTarget::LinkHandle(id) => Some(id),
            HitTarget::Cell => None,
        };
        match dropped_on {
            // Dropping back on the source pill is a no-op.
            Some(id) if id == source => GestureOutcome::Cancelled,
            Some(id) => {
                let master = ctx.pill(source).and_then(|p| p.record_id);
                let slave = ctx.pill(id).and_then(|p| p.record_id);
                match (master, slave) {
                    (Some(master), Some(slave)) => {
                        GestureOutcome::Event(DomainEvent::Connect { master, slave })
                    }
                    _ => GestureOutcome::Cancelled,
                }
            }
            None => GestureOutcome::Cancelled,
        }
    }

    /// Rubber-band anchor for the rendering adapter.
    pub fn preview(&self) -> Option<(PillId, CellRef)> {
        match self {
            ConnectState::Active { source, current } => Some((*source, *current)),
            _ => None,
        }
    }
}

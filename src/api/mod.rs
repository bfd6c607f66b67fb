pub mod memory;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::record::{FieldChanges, RecordId};
use types::{DependencyReschedule, FetchRequest, FetchResponse, RescheduleOutcome};

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend refused the values (constraint violation).
    #[error("validation failed: {0}")]
    Validation(String),
    /// The write was rejected (access rights, concurrent edit).
    #[error("write rejected: {0}")]
    Rejected(String),
    /// Transport or server failure.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// The scheduling backend wire contract. Implementations are opaque: the
/// board never interprets scheduling business rules, it only issues these
/// calls and refetches.
#[async_trait]
pub trait ScheduleBackend: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> BackendResult<FetchResponse>;

    /// Plain write of field values to a set of records.
    async fn reschedule(&self, ids: &[RecordId], changes: FieldChanges) -> BackendResult<()>;

    /// Dependency-aware reschedule; may succeed with a warning and returns
    /// the pre-write values for Undo.
    async fn reschedule_with_dependencies(
        &self,
        request: DependencyReschedule,
    ) -> BackendResult<RescheduleOutcome>;

    async fn duplicate(&self, id: RecordId, changes: FieldChanges) -> BackendResult<RecordId>;

    async fn create_dependency(&self, master: RecordId, slave: RecordId) -> BackendResult<()>;

    async fn remove_dependency(&self, master: RecordId, slave: RecordId) -> BackendResult<()>;

    async fn multi_create(&self, records: Vec<FieldChanges>) -> BackendResult<Vec<RecordId>>;

    async fn delete(&self, ids: &[RecordId]) -> BackendResult<()>;

    /// Corrective write restoring the given pre-drag values.
    async fn undo_drag_drop(&self, id: RecordId, old_values: FieldChanges) -> BackendResult<bool>;
}

pub mod meta;
pub mod pill;
pub mod record;
pub mod row;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::api::types::{
    DependencyReschedule, FetchRequest, FetchResponse, GroupBlock, OutcomeKind, ProgressBarInfo,
    TimeInterval,
};
use crate::api::{BackendResult, ScheduleBackend};
use self::meta::{MetaData, RescheduleMethod};
use self::record::{FieldChanges, Record, RecordId};

/// The fetched dataset. Rebuilt wholesale on every fetch; only auxiliary
/// state keyed by stable ids survives outside of it.
#[derive(Default)]
pub struct GanttData {
    pub records: Vec<Record>,
    index: HashMap<RecordId, usize>,
    pub groups: Vec<GroupBlock>,
    pub length: usize,
    pub unavailabilities: HashMap<String, HashMap<String, Vec<TimeInterval>>>,
    pub progress_bars: HashMap<String, HashMap<String, ProgressBarInfo>>,
}

impl GanttData {
    pub fn from_response(response: FetchResponse) -> Self {
        let index = response
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
        Self {
            index,
            records: response.records,
            groups: response.groups,
            length: response.length,
            unavailabilities: response.unavailabilities,
            progress_bars: response.progress_bars,
        }
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.index.get(&id).map(|&i| &self.records[i])
    }

    pub fn record_ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id).collect()
    }

    /// Slave → masters map over the configured dependency field, restricted
    /// to records present in this dataset.
    pub fn dependency_map(&self, meta: &MetaData) -> HashMap<RecordId, Vec<RecordId>> {
        let Some(field) = &meta.dependency_field else {
            return HashMap::new();
        };
        self.records
            .iter()
            .map(|record| {
                let masters: Vec<RecordId> = record
                    .id_list(field)
                    .into_iter()
                    .filter(|id| self.index.contains_key(id))
                    .collect();
                (record.id, masters)
            })
            .filter(|(_, masters)| !masters.is_empty())
            .collect()
    }

    pub fn record_times(
        &self,
        meta: &MetaData,
        id: RecordId,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let record = self.record(id)?;
        Some((
            record.datetime(&meta.date_start_field)?,
            record.datetime(&meta.date_stop_field)?,
        ))
    }
}

/// Pre-write values a corrective Undo write restores.
#[derive(Debug, Clone)]
pub struct UndoOperation {
    pub entries: Vec<(RecordId, FieldChanges)>,
}

/// What the app learns from a completed write.
#[derive(Debug, Clone, Default)]
pub struct WriteFeedback {
    pub message: Option<String>,
    pub warning: bool,
    pub undo: Option<UndoOperation>,
}

/// Concurrency-controlled gateway to the backend.
///
/// Reads are single-flight keep-last: every fetch takes a ticket and the app
/// applies a result only while its ticket is still the newest issued.
/// Writes serialize through one async mutex in FIFO issue order; a failed
/// write releases the lock like any other and never blocks the queue.
pub struct ModelService {
    backend: Arc<dyn ScheduleBackend>,
    write_lock: tokio::sync::Mutex<()>,
    fetch_ticket: AtomicU64,
}

impl ModelService {
    pub fn new(backend: Arc<dyn ScheduleBackend>) -> Self {
        Self {
            backend,
            write_lock: tokio::sync::Mutex::new(()),
            fetch_ticket: AtomicU64::new(0),
        }
    }

    pub fn issue_ticket(&self) -> u64 {
        self.fetch_ticket.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A fetch result may be applied only while its ticket is the newest.
    pub fn is_current(&self, ticket: u64) -> bool {
        self.fetch_ticket.load(Ordering::SeqCst) == ticket
    }

    pub async fn fetch(&self, meta: &MetaData) -> BackendResult<GanttData> {
        let request = FetchRequest {
            domain: Vec::new(),
            group_by: meta.grouped_by.clone(),
            scale_unit: meta.scale.label().to_lowercase(),
            start: meta.global_start,
            stop: meta.global_stop,
            unavailability_fields: meta.unavailability_fields.clone(),
            progress_bar_fields: meta.progress_bar_fields.clone(),
            limit: None,
            offset: 0,
        };
        let response = self.backend.fetch(request).await?;
        Ok(GanttData::from_response(response))
    }

    /// Drag/resize commit. Captures pre-write values so the caller can offer
    /// Undo; dependency-aware when the view configures it.
    pub async fn reschedule(
        &self,
        meta: &MetaData,
        record_id: RecordId,
        previous: FieldChanges,
        changes: FieldChanges,
    ) -> BackendResult<WriteFeedback> {
        let _guard = self.write_lock.lock().await;
        match (&meta.dependency_field, meta.reschedule_method) {
            (Some(field), RescheduleMethod::Cascade) => {
                let outcome = self
                    .backend
                    .reschedule_with_dependencies(DependencyReschedule {
                        changes,
                        method: meta.reschedule_method,
                        ids: vec![record_id],
                        dependency_field: field.clone(),
                        inverse_dependency_field: meta.inverse_dependency_field.clone(),
                        start_field: meta.date_start_field.clone(),
                        stop_field: meta.date_stop_field.clone(),
                    })
                    .await?;
                let mut entries: Vec<(RecordId, FieldChanges)> =
                    outcome.old_values.into_iter().collect();
                if entries.is_empty() && !previous.is_empty() {
                    entries.push((record_id, previous));
                }
                Ok(WriteFeedback {
                    warning: outcome.kind == OutcomeKind::Warning,
                    message: outcome.message,
                    undo: (!entries.is_empty()).then_some(UndoOperation { entries }),
                })
            }
            _ => {
                self.backend.reschedule(&[record_id], changes).await?;
                let undo = (!previous.is_empty()).then_some(UndoOperation {
                    entries: vec![(record_id, previous)],
                });
                Ok(WriteFeedback {
                    message: None,
                    warning: false,
                    undo,
                })
            }
        }
    }

    pub async fn duplicate(
        &self,
        record_id: RecordId,
        changes: FieldChanges,
    ) -> BackendResult<RecordId> {
        let _guard = self.write_lock.lock().await;
        self.backend.duplicate(record_id, changes).await
    }

    pub async fn create_dependency(
        &self,
        master: RecordId,
        slave: RecordId,
    ) -> BackendResult<()> {
        let _guard = self.write_lock.lock().await;
        self.backend.create_dependency(master, slave).await
    }

    pub async fn remove_dependency(
        &self,
        master: RecordId,
        slave: RecordId,
    ) -> BackendResult<()> {
        let _guard = self.write_lock.lock().await;
        self.backend.remove_dependency(master, slave).await
    }

    pub async fn multi_create(&self, records: Vec<FieldChanges>) -> BackendResult<Vec<RecordId>> {
        let _guard = self.write_lock.lock().await;
        self.backend.multi_create(records).await
    }

    pub async fn delete(&self, ids: Vec<RecordId>) -> BackendResult<()> {
        let _guard = self.write_lock.lock().await;
        self.backend.delete(&ids).await
    }

    /// Corrective write restoring the captured pre-drag values.
    pub async fn undo(&self, operation: &UndoOperation) -> BackendResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut all_restored = true;
        for (id, old_values) in &operation.entries {
            all_restored &= self.backend.undo_drag_drop(*id, old_values.clone()).await?;
        }
        Ok(all_restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryBackend;
    use crate::api::types::RescheduleOutcome;
    use crate::api::BackendError;
    use crate::model::meta::{tests::sample_view, CellPart, ScaleId};
    use crate::model::record::datetime_value;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use uuid::Uuid;

    fn dt(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn task(name: &str, team: &str, start: NaiveDateTime, stop: NaiveDateTime) -> Record {
        let mut fields = FieldChanges::new();
        fields.insert("name".into(), json!(name));
        fields.insert("team".into(), json!(team));
        fields.insert("date_start".into(), datetime_value(start));
        fields.insert("date_stop".into(), datetime_value(stop));
        fields.insert("depend_on".into(), json!([]));
        fields.insert("dependency_of".into(), json!([]));
        Record::new(Uuid::new_v4(), fields)
    }

    fn meta_for_window(start: NaiveDateTime, stop: NaiveDateTime) -> MetaData {
        MetaData::from_view(&sample_view(), ScaleId::Week, CellPart::Full, start, stop)
    }

    #[tokio::test]
    async fn test_keep_last_fetch_applies_newest_window() {
        // One record in the week of June 10, another in the week of June 17.
        let early = task("first", "Alpha", dt(11, 8), dt(12, 18));
        let late = task("second", "Alpha", dt(18, 8), dt(19, 18));
        let backend = MemoryBackend::new("date_start", "date_stop")
            .with_records(vec![early.clone(), late.clone()]);
        // Window A resolves slowly, window B quickly: A arrives after B.
        backend.queue_fetch_latency(Duration::from_millis(50));
        backend.queue_fetch_latency(Duration::from_millis(5));

        let service = Arc::new(ModelService::new(Arc::new(backend)));
        let meta_a = meta_for_window(dt(10, 0), dt(17, 0));
        let meta_b = meta_for_window(dt(17, 0), dt(24, 0));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let fetch = |meta: MetaData| {
            let service = Arc::clone(&service);
            let tx = tx.clone();
            async move {
                let ticket = service.issue_ticket();
                let data = service.fetch(&meta).await.unwrap();
                tx.send((ticket, data)).unwrap();
            }
        };
        tokio::join!(fetch(meta_a), fetch(meta_b));
        drop(tx);

        // Apply results in arrival order, keep-last style.
        let mut applied: Option<GanttData> = None;
        let mut arrivals = Vec::new();
        while let Some((ticket, data)) = rx.recv().await {
            arrivals.push(ticket);
            if service.is_current(ticket) {
                applied = Some(data);
            }
        }
        assert_eq!(arrivals, vec![2, 1], "window B must arrive first");
        let data = applied.expect("a result must be applied");
        assert_eq!(data.record_ids(), vec![late.id]);
    }

    /// Backend probe counting concurrent write round trips.
    struct ProbeBackend {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl ProbeBackend {
        fn new(fail_first: bool) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    #[async_trait::async_trait]
    impl ScheduleBackend for ProbeBackend {
        async fn fetch(&self, _request: FetchRequest) -> BackendResult<FetchResponse> {
            Ok(FetchResponse {
                records: Vec::new(),
                groups: Vec::new(),
                length: 0,
                unavailabilities: HashMap::new(),
                progress_bars: HashMap::new(),
            })
        }

        async fn reschedule(
            &self,
            _ids: &[RecordId],
            _changes: FieldChanges,
        ) -> BackendResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(BackendError::Rejected("simulated failure".into()));
            }
            Ok(())
        }

        async fn reschedule_with_dependencies(
            &self,
            _request: DependencyReschedule,
        ) -> BackendResult<RescheduleOutcome> {
            Err(BackendError::Unavailable("not probed".into()))
        }

        async fn duplicate(
            &self,
            _id: RecordId,
            _changes: FieldChanges,
        ) -> BackendResult<RecordId> {
            Ok(Uuid::new_v4())
        }

        async fn create_dependency(
            &self,
            _master: RecordId,
            _slave: RecordId,
        ) -> BackendResult<()> {
            Ok(())
        }

        async fn remove_dependency(
            &self,
            _master: RecordId,
            _slave: RecordId,
        ) -> BackendResult<()> {
            Ok(())
        }

        async fn multi_create(
            &self,
            _records: Vec<FieldChanges>,
        ) -> BackendResult<Vec<RecordId>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _ids: &[RecordId]) -> BackendResult<()> {
            Ok(())
        }

        async fn undo_drag_drop(
            &self,
            _id: RecordId,
            _old_values: FieldChanges,
        ) -> BackendResult<bool> {
            Ok(true)
        }
    }

    fn independent_meta() -> MetaData {
        let mut view = sample_view();
        view.reschedule_method = RescheduleMethod::Independent;
        MetaData::from_view(&view, ScaleId::Week, CellPart::Full, dt(10, 0), dt(17, 0))
    }

    #[tokio::test]
    async fn test_writes_never_overlap() {
        let probe = Arc::new(ProbeBackend::new(false));
        let service = Arc::new(ModelService::new(
            Arc::clone(&probe) as Arc<dyn ScheduleBackend>
        ));
        let meta = independent_meta();
        let id = Uuid::new_v4();

        let write = || {
            let service = Arc::clone(&service);
            let meta = meta.clone();
            async move {
                service
                    .reschedule(&meta, id, FieldChanges::new(), FieldChanges::new())
                    .await
            }
        };
        let (a, b, c, d) = tokio::join!(write(), write(), write(), write());
        assert!(a.is_ok() && b.is_ok() && c.is_ok() && d.is_ok());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            probe.max_in_flight.load(Ordering::SeqCst),
            1,
            "at most one write round trip may be in flight"
        );
    }

    #[tokio::test]
    async fn test_failed_write_does_not_block_queue() {
        let probe = Arc::new(ProbeBackend::new(true));
        let service = Arc::new(ModelService::new(
            Arc::clone(&probe) as Arc<dyn ScheduleBackend>
        ));
        let meta = independent_meta();
        let id = Uuid::new_v4();

        let first = service
            .reschedule(&meta, id, FieldChanges::new(), FieldChanges::new())
            .await;
        assert!(first.is_err());
        let second = service
            .reschedule(&meta, id, FieldChanges::new(), FieldChanges::new())
            .await;
        assert!(second.is_ok(), "queue must keep processing after a failure");
    }

    #[tokio::test]
    async fn test_cascade_reschedule_warns_and_undoes() {
        let mut master = task("master", "Alpha", dt(10, 8), dt(12, 18));
        let mut slave = task("slave", "Alpha", dt(13, 8), dt(14, 18));
        slave
            .fields
            .insert("depend_on".into(), json!([master.id.to_string()]));
        master
            .fields
            .insert("dependency_of".into(), json!([slave.id.to_string()]));
        let slave_id = slave.id;

        let backend = MemoryBackend::new("date_start", "date_stop")
            .dependency_fields("depend_on", "dependency_of")
            .with_records(vec![master, slave]);
        let service = ModelService::new(Arc::new(backend));
        let meta = meta_for_window(dt(10, 0), dt(17, 0));

        // Drag the slave to start inside the master's span.
        let mut previous = FieldChanges::new();
        previous.insert("date_start".into(), datetime_value(dt(13, 8)));
        previous.insert("date_stop".into(), datetime_value(dt(14, 18)));
        let mut changes = FieldChanges::new();
        changes.insert("date_start".into(), datetime_value(dt(11, 8)));
        changes.insert("date_stop".into(), datetime_value(dt(12, 18)));

        let feedback = service
            .reschedule(&meta, slave_id, previous, changes)
            .await
            .unwrap();
        assert!(feedback.warning);
        assert!(feedback.message.is_some());
        let undo = feedback.undo.expect("warning outcomes offer undo");

        let moved = service.fetch(&meta).await.unwrap();
        assert_eq!(moved.record_times(&meta, slave_id).unwrap().0, dt(11, 8));

        assert!(service.undo(&undo).await.unwrap());
        let restored = service.fetch(&meta).await.unwrap();
        assert_eq!(
            restored.record_times(&meta, slave_id).unwrap(),
            (dt(13, 8), dt(14, 18))
        );
    }

    #[tokio::test]
    async fn test_dependency_round_trip() {
        let master = task("master", "Alpha", dt(10, 8), dt(11, 18));
        let slave = task("slave", "Alpha", dt(12, 8), dt(13, 18));
        let (master_id, slave_id) = (master.id, slave.id);
        let backend = MemoryBackend::new("date_start", "date_stop")
            .dependency_fields("depend_on", "dependency_of")
            .with_records(vec![master, slave]);
        let service = ModelService::new(Arc::new(backend));
        let meta = meta_for_window(dt(10, 0), dt(17, 0));

        service.create_dependency(master_id, slave_id).await.unwrap();
        let data = service.fetch(&meta).await.unwrap();
        let deps = data.dependency_map(&meta);
        assert_eq!(deps.get(&slave_id), Some(&vec![master_id]));

        service.remove_dependency(master_id, slave_id).await.unwrap();
        let data = service.fetch(&meta).await.unwrap();
        assert!(data.dependency_map(&meta).is_empty());
    }
}

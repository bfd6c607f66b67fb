//! In-memory `ScheduleBackend` used by the demo profile and the tests.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDateTime};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::types::{
    DependencyReschedule, FetchRequest, FetchResponse, GroupBlock, OutcomeKind, ProgressBarInfo,
    RescheduleOutcome, TimeInterval, value_key,
};
use super::{BackendError, BackendResult, ScheduleBackend};
use crate::model::record::{parse_datetime, FieldChanges, Record, RecordId};

#[derive(Default)]
struct Store {
    order: Vec<RecordId>,
    rows: HashMap<RecordId, FieldChanges>,
}

impl Store {
    fn records(&self) -> Vec<Record> {
        self.order
            .iter()
            .filter_map(|id| self.rows.get(id).map(|f| Record::new(*id, f.clone())))
            .collect()
    }
}

pub struct MemoryBackend {
    start_field: String,
    stop_field: String,
    dependency_field: Option<String>,
    inverse_dependency_field: Option<String>,
    weekend_unavailability: bool,
    progress_capacity: f64,
    default_latency: Option<Duration>,
    /// Per-fetch latency overrides, popped in issue order. Lets tests stage
    /// out-of-order fetch completions deterministically.
    fetch_latencies: StdMutex<VecDeque<Duration>>,
    store: Mutex<Store>,
}

impl MemoryBackend {
    pub fn new(start_field: impl Into<String>, stop_field: impl Into<String>) -> Self {
        Self {
            start_field: start_field.into(),
            stop_field: stop_field.into(),
            dependency_field: None,
            inverse_dependency_field: None,
            weekend_unavailability: false,
            progress_capacity: 40.0,
            default_latency: None,
            fetch_latencies: StdMutex::new(VecDeque::new()),
            store: Mutex::new(Store::default()),
        }
    }

    pub fn dependency_fields(mut self, field: &str, inverse: &str) -> Self {
        self.dependency_field = Some(field.to_string());
        self.inverse_dependency_field = Some(inverse.to_string());
        self
    }

    pub fn weekend_unavailability(mut self, enabled: bool) -> Self {
        self.weekend_unavailability = enabled;
        self
    }

    pub fn progress_capacity(mut self, hours: f64) -> Self {
        self.progress_capacity = hours;
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.default_latency = Some(latency);
        self
    }

    pub fn with_records(self, records: Vec<Record>) -> Self {
        let mut store = Store::default();
        for record in records {
            store.order.push(record.id);
            store.rows.insert(record.id, record.fields);
        }
        Self {
            store: Mutex::new(store),
            ..self
        }
    }

    pub fn queue_fetch_latency(&self, latency: Duration) {
        if let Ok(mut queue) = self.fetch_latencies.lock() {
            queue.push_back(latency);
        }
    }

    async fn simulate_fetch_latency(&self) {
        let staged = self
            .fetch_latencies
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        if let Some(latency) = staged.or(self.default_latency) {
            tokio::time::sleep(latency).await;
        }
    }

    async fn simulate_write_latency(&self) {
        if let Some(latency) = self.default_latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn row_datetime(fields: &FieldChanges, field: &str) -> Option<NaiveDateTime> {
        fields.get(field).and_then(Value::as_str).and_then(parse_datetime)
    }

    fn row_id_list(fields: &FieldChanges, field: &str) -> Vec<RecordId> {
        match fields.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|s| Uuid::parse_str(s).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn push_link(fields: &mut FieldChanges, field: &str, id: RecordId) {
        let entry = fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = entry {
            let text = Value::String(id.to_string());
            if !items.contains(&text) {
                items.push(text);
            }
        }
    }

    fn drop_link(fields: &mut FieldChanges, field: &str, id: RecordId) {
        if let Some(Value::Array(items)) = fields.get_mut(field) {
            items.retain(|v| v.as_str() != Some(id.to_string().as_str()));
        }
    }

    fn matches_domain(fields: &FieldChanges, request: &FetchRequest) -> bool {
        request.domain.iter().all(|clause| {
            let actual = fields.get(&clause.field).cloned().unwrap_or(Value::Null);
            match clause.operator.as_str() {
                "=" => actual == clause.value,
                "!=" => actual != clause.value,
                _ => true,
            }
        })
    }

    fn weekend_intervals(&self, start: NaiveDateTime, stop: NaiveDateTime) -> Vec<TimeInterval> {
        let mut intervals = Vec::new();
        if !self.weekend_unavailability {
            return intervals;
        }
        let mut day = start.date();
        let last = stop.date();
        while day <= last {
            if day.weekday().num_days_from_monday() >= 5 {
                if let (Some(s), Some(e)) = (
                    day.and_hms_opt(0, 0, 0),
                    (day + ChronoDuration::days(1)).and_hms_opt(0, 0, 0),
                ) {
                    intervals.push(TimeInterval { start: s, stop: e });
                }
            }
            day += ChronoDuration::days(1);
        }
        intervals
    }
}

#[async_trait::async_trait]
impl ScheduleBackend for MemoryBackend {
    async fn fetch(&self, request: FetchRequest) -> BackendResult<FetchResponse> {
        self.simulate_fetch_latency().await;
        let store = self.store.lock().await;

        let mut matched: Vec<Record> = Vec::new();
        for record in store.records() {
            if !Self::matches_domain(&record.fields, &request) {
                continue;
            }
            let (Some(start), Some(stop)) = (
                record.datetime(&self.start_field),
                record.datetime(&self.stop_field),
            ) else {
                continue;
            };
            if start < request.stop && stop > request.start {
                matched.push(record);
            }
        }
        let length = matched.len();
        let offset = request.offset.min(matched.len());
        let mut window: Vec<Record> = matched.split_off(offset);
        if let Some(limit) = request.limit {
            window.truncate(limit);
        }

        let mut groups: Vec<GroupBlock> = Vec::new();
        if !request.group_by.is_empty() {
            for record in &window {
                let mut values = FieldChanges::new();
                for field in &request.group_by {
                    values.insert(field.clone(), record.value(field));
                }
                match groups.iter_mut().find(|g| g.values == values) {
                    Some(block) => block.record_ids.push(record.id),
                    None => groups.push(GroupBlock {
                        values,
                        record_ids: vec![record.id],
                    }),
                }
            }
        }

        let mut unavailabilities: HashMap<String, HashMap<String, Vec<TimeInterval>>> =
            HashMap::new();
        for field in &request.unavailability_fields {
            let per_value = unavailabilities.entry(field.clone()).or_default();
            for record in &window {
                let key = value_key(&record.value(field));
                per_value
                    .entry(key)
                    .or_insert_with(|| self.weekend_intervals(request.start, request.stop));
            }
        }

        let mut progress_bars: HashMap<String, HashMap<String, ProgressBarInfo>> = HashMap::new();
        for field in &request.progress_bar_fields {
            let per_value = progress_bars.entry(field.clone()).or_default();
            for record in &window {
                let key = value_key(&record.value(field));
                let hours = match (
                    record.datetime(&self.start_field),
                    record.datetime(&self.stop_field),
                ) {
                    (Some(start), Some(stop)) if stop > start => {
                        (stop - start).num_minutes() as f64 / 60.0
                    }
                    _ => 0.0,
                };
                let info = per_value.entry(key).or_insert(ProgressBarInfo {
                    value: 0.0,
                    max_value: self.progress_capacity,
                });
                info.value += hours;
            }
        }

        Ok(FetchResponse {
            records: window,
            groups,
            length,
            unavailabilities,
            progress_bars,
        })
    }

    async fn reschedule(&self, ids: &[RecordId], changes: FieldChanges) -> BackendResult<()> {
        self.simulate_write_latency().await;
        let mut store = self.store.lock().await;
        for id in ids {
            let fields = store
                .rows
                .get_mut(id)
                .ok_or_else(|| BackendError::Rejected(format!("unknown record {id}")))?;
            for (key, value) in &changes {
                fields.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn reschedule_with_dependencies(
        &self,
        request: DependencyReschedule,
    ) -> BackendResult<RescheduleOutcome> {
        self.simulate_write_latency().await;
        let mut store = self.store.lock().await;

        let mut old_values: HashMap<RecordId, FieldChanges> = HashMap::new();
        for id in &request.ids {
            let fields = store
                .rows
                .get_mut(id)
                .ok_or_else(|| BackendError::Rejected(format!("unknown record {id}")))?;
            let mut previous = FieldChanges::new();
            for (key, value) in &request.changes {
                previous.insert(key.clone(), fields.get(key).cloned().unwrap_or(Value::Null));
                fields.insert(key.clone(), value.clone());
            }
            old_values.insert(*id, previous);
        }

        // Soft-constraint scan: a rescheduled record starting before one of
        // its dependencies finishes succeeds with a warning.
        let mut message = None;
        for id in &request.ids {
            let Some(fields) = store.rows.get(id) else {
                continue;
            };
            let Some(slave_start) = Self::row_datetime(fields, &request.start_field) else {
                continue;
            };
            for master_id in Self::row_id_list(fields, &request.dependency_field) {
                let master_stop = store
                    .rows
                    .get(&master_id)
                    .and_then(|f| Self::row_datetime(f, &request.stop_field));
                if let Some(master_stop) = master_stop {
                    if slave_start < master_stop {
                        message = Some(
                            "The record now starts before a dependency finishes".to_string(),
                        );
                    }
                }
            }
        }

        Ok(RescheduleOutcome {
            kind: if message.is_some() {
                OutcomeKind::Warning
            } else {
                OutcomeKind::Ok
            },
            message,
            old_values,
        })
    }

    async fn duplicate(&self, id: RecordId, changes: FieldChanges) -> BackendResult<RecordId> {
        self.simulate_write_latency().await;
        let mut store = self.store.lock().await;
        let mut fields = store
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::Rejected(format!("unknown record {id}")))?;
        for (key, value) in &changes {
            fields.insert(key.clone(), value.clone());
        }
        let new_id = Uuid::new_v4();
        store.order.push(new_id);
        store.rows.insert(new_id, fields);
        Ok(new_id)
    }

    async fn create_dependency(&self, master: RecordId, slave: RecordId) -> BackendResult<()> {
        self.simulate_write_latency().await;
        let Some(field) = self.dependency_field.clone() else {
            return Err(BackendError::Validation(
                "dependencies are not enabled on this model".to_string(),
            ));
        };
        let mut store = self.store.lock().await;
        if !store.rows.contains_key(&master) || !store.rows.contains_key(&slave) {
            return Err(BackendError::Rejected("unknown record".to_string()));
        }
        if let Some(fields) = store.rows.get_mut(&slave) {
            Self::push_link(fields, &field, master);
        }
        if let Some(inverse) = &self.inverse_dependency_field {
            if let Some(fields) = store.rows.get_mut(&master) {
                Self::push_link(fields, inverse, slave);
            }
        }
        Ok(())
    }

    async fn remove_dependency(&self, master: RecordId, slave: RecordId) -> BackendResult<()> {
        self.simulate_write_latency().await;
        let Some(field) = self.dependency_field.clone() else {
            return Err(BackendError::Validation(
                "dependencies are not enabled on this model".to_string(),
            ));
        };
        let mut store = self.store.lock().await;
        if let Some(fields) = store.rows.get_mut(&slave) {
            Self::drop_link(fields, &field, master);
        }
        if let Some(inverse) = &self.inverse_dependency_field {
            if let Some(fields) = store.rows.get_mut(&master) {
                Self::drop_link(fields, inverse, slave);
            }
        }
        Ok(())
    }

    async fn multi_create(&self, records: Vec<FieldChanges>) -> BackendResult<Vec<RecordId>> {
        self.simulate_write_latency().await;
        let mut store = self.store.lock().await;
        let mut ids = Vec::with_capacity(records.len());
        for fields in records {
            let id = Uuid::new_v4();
            store.order.push(id);
            store.rows.insert(id, fields);
            ids.push(id);
        }
        Ok(ids)
    }

    async fn delete(&self, ids: &[RecordId]) -> BackendResult<()> {
        self.simulate_write_latency().await;
        let mut store = self.store.lock().await;
        store.order.retain(|id| !ids.contains(id));
        for id in ids {
            store.rows.remove(id);
        }
        Ok(())
    }

    async fn undo_drag_drop(&self, id: RecordId, old_values: FieldChanges) -> BackendResult<bool> {
        self.simulate_write_latency().await;
        let mut store = self.store.lock().await;
        let Some(fields) = store.rows.get_mut(&id) else {
            return Ok(false);
        };
        for (key, value) in &old_values {
            fields.insert(key.clone(), value.clone());
        }
        Ok(true)
    }
}

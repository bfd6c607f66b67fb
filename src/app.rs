use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde_json::json;
use std::collections::HashSet;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

use crate::api::memory::MemoryBackend;
use crate::api::BackendError;
use crate::config::Config;
use crate::grid::connectors::build_connectors;
use crate::grid::fold::{compute_foldable, compute_folded_grid, FoldedGrid};
use crate::grid::layout::{aggregate_pills, assign_levels};
use crate::grid::time_grid::TimeGrid;
use crate::interact::{CellRegion, DomainEvent, GestureOutcome, InteractionEngine};
use crate::model::meta::{
    CellPart, ConsolidationParams, MetaData, RescheduleMethod, ScaleId, ViewDefinition,
};
use crate::model::pill::{Connector, Pill, PillId};
use crate::model::record::{datetime_value, FieldChanges, Record, RecordId};
use crate::model::row::{build_rows, flatten, FlatRow, RowId};
use crate::model::{GanttData, ModelService, UndoOperation, WriteFeedback};
use crate::ui;
use crate::ui::notifications::{Notification, NotificationAction};

/// Everything the renderer derives from one (MetaData, GanttData) pair.
/// Rebuilt lazily behind a dirty flag; pill and connector ids are only valid
/// within the pass that minted them.
pub struct Derived {
    pub grid: TimeGrid,
    pub rows: Vec<FlatRow>,
    pub row_levels: Vec<u32>,
    pub pills: Vec<Pill>,
    pub connectors: Vec<Connector>,
    pub foldable: Vec<bool>,
    pub folded: FoldedGrid,
    pub unavailable_rows: Vec<Vec<bool>>,
}

enum AsyncResult {
    Fetched {
        ticket: u64,
        meta: MetaData,
        result: Result<GanttData, BackendError>,
    },
    WriteDone {
        description: String,
        result: Result<WriteFeedback, BackendError>,
    },
    UndoDone {
        result: Result<bool, BackendError>,
    },
}

/// Main application state: the composition root owning the model service,
/// the derived grid state and the interaction engine.
pub struct BoardApp {
    view: ViewDefinition,
    pub view_title: String,
    config: Config,
    service: Arc<ModelService>,

    pub meta: MetaData,
    data: GanttData,
    derived: Option<Derived>,
    dirty: bool,

    // Auxiliary state keyed by stable ids; survives wholesale rebuilds.
    closed_rows: HashSet<RowId>,
    expanded_folds: HashSet<u32>,
    selected_record: Option<RecordId>,

    pub interaction: InteractionEngine,
    pub multi_create: bool,

    pub focus_input: NaiveDate,
    pub loading: bool,
    pub status_message: String,
    notifications: Vec<Notification>,

    // Async communication
    egui_ctx: egui::Context,
    runtime: tokio::runtime::Runtime,
    result_tx: Sender<AsyncResult>,
    result_rx: Receiver<AsyncResult>,
}

impl BoardApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        // Register Phosphor icons as a font fallback so they render inline.
        let mut fonts = egui::FontDefinitions::default();
        egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
        cc.egui_ctx.set_fonts(fonts);

        let config = Config::load().unwrap_or_default();
        let view = demo_view();
        let backend = MemoryBackend::new(&view.date_start_field, &view.date_stop_field)
            .dependency_fields("depend_on", "dependency_of")
            .weekend_unavailability(true)
            .progress_capacity(40.0)
            .latency(Duration::from_millis(120))
            .with_records(sample_records());
        let service = Arc::new(ModelService::new(Arc::new(backend)));

        let runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
        let (result_tx, result_rx) = channel();

        let focus = config
            .focus_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let scale = config.scale;
        let cell_part = config.cell_part_for(scale);
        let (start, stop) = window_around(focus, scale, config.window_units);
        let mut meta = MetaData::from_view(&view, scale, cell_part, start, stop);
        if !config.grouping_enabled {
            meta.grouped_by = Vec::new();
        }

        let mut app = Self {
            view_title: view.title.clone(),
            view,
            config,
            service,
            meta,
            data: GanttData::default(),
            derived: None,
            dirty: false,
            closed_rows: HashSet::new(),
            expanded_folds: HashSet::new(),
            selected_record: None,
            interaction: InteractionEngine::new(),
            multi_create: false,
            focus_input: focus,
            loading: false,
            status_message: "Loading schedule".to_string(),
            notifications: Vec::new(),
            egui_ctx: cc.egui_ctx.clone(),
            runtime,
            result_tx,
            result_rx,
        };
        let meta = app.meta.clone();
        app.request_fetch(meta);
        app
    }

    // ── Window / scale controls ─────────────────────────────────────────

    pub fn grouping_enabled(&self) -> bool {
        !self.meta.grouped_by.is_empty()
    }

    fn request_window(&mut self, meta: MetaData) {
        // The active MetaData stays in place until the matching fetch lands;
        // the renderer never sees a half-updated window.
        self.expanded_folds.clear();
        self.request_fetch(meta);
    }

    pub fn set_scale(&mut self, scale: ScaleId) {
        let cell_part = self.config.cell_part_for(scale);
        let (start, stop) = window_around(self.focus_input, scale, self.config.window_units);
        let meta = self
            .meta
            .with_scale(scale, cell_part)
            .with_window(start, stop);
        self.config.scale = scale;
        self.save_config();
        self.request_window(meta);
    }

    pub fn set_cell_part(&mut self, part: CellPart) {
        let meta = self.meta.with_scale(self.meta.scale, part);
        self.config.cell_part = Some(part);
        self.save_config();
        self.request_window(meta);
    }

    pub fn shift_window(&mut self, delta: i64) {
        let scale = self.meta.scale;
        let mut start = scale.align_down(self.meta.start_date);
        let steps = delta * self.config.window_units as i64;
        for _ in 0..steps.abs() {
            start = if steps >= 0 {
                scale.next_unit(start)
            } else {
                scale.align_down(start - chrono::Duration::seconds(1))
            };
        }
        self.go_to_date(start.date());
    }

    pub fn go_to_today(&mut self) {
        self.go_to_date(chrono::Local::now().date_naive());
    }

    pub fn go_to_date(&mut self, date: NaiveDate) {
        self.focus_input = date;
        self.config.focus_date = Some(date);
        self.save_config();
        let (start, stop) = window_around(date, self.meta.scale, self.config.window_units);
        let meta = self.meta.with_window(start, stop);
        self.request_window(meta);
    }

    pub fn toggle_grouping(&mut self) {
        let grouped_by = if self.grouping_enabled() {
            Vec::new()
        } else {
            self.view.default_group_by.clone()
        };
        self.config.grouping_enabled = !grouped_by.is_empty();
        self.save_config();
        let meta = self.meta.with_group_by(grouped_by);
        self.request_window(meta);
    }

    pub fn refresh(&mut self) {
        self.request_fetch(self.meta.clone());
    }

    fn save_config(&mut self) {
        if let Err(error) = self.config.save() {
            log::warn!("Failed to save config: {error:#}");
        }
    }

    // ── Async plumbing ──────────────────────────────────────────────────

    fn request_fetch(&mut self, meta: MetaData) {
        self.loading = true;
        let ticket = self.service.issue_ticket();
        let service = Arc::clone(&self.service);
        let tx = self.result_tx.clone();
        let ctx = self.egui_ctx.clone();
        self.runtime.spawn(async move {
            let result = service.fetch(&meta).await;
            let _ = tx.send(AsyncResult::Fetched {
                ticket,
                meta,
                result,
            });
            ctx.request_repaint();
        });
    }

    fn spawn_write<F>(&self, description: String, future: F)
    where
        F: std::future::Future<Output = Result<WriteFeedback, BackendError>> + Send + 'static,
    {
        let tx = self.result_tx.clone();
        let ctx = self.egui_ctx.clone();
        self.runtime.spawn(async move {
            let result = future.await;
            let _ = tx.send(AsyncResult::WriteDone {
                description,
                result,
            });
            ctx.request_repaint();
        });
    }

    fn spawn_undo(&self, operation: UndoOperation) {
        let service = Arc::clone(&self.service);
        let tx = self.result_tx.clone();
        let ctx = self.egui_ctx.clone();
        self.runtime.spawn(async move {
            let result = service.undo(&operation).await;
            let _ = tx.send(AsyncResult::UndoDone { result });
            ctx.request_repaint();
        });
    }

    fn drain_results(&mut self) {
        while let Ok(message) = self.result_rx.try_recv() {
            match message {
                AsyncResult::Fetched {
                    ticket,
                    meta,
                    result,
                } => {
                    if !self.service.is_current(ticket) {
                        // Superseded by a newer fetch: dropped, never shown.
                        log::debug!("discarding stale fetch result (ticket {ticket})");
                        continue;
                    }
                    self.loading = false;
                    match result {
                        Ok(data) => {
                            self.meta = meta;
                            self.data = data;
                            self.dirty = true;
                            self.interaction.invalidate_pass_state();
                            self.status_message =
                                format!("{} records", self.data.records.len());
                        }
                        Err(error) => {
                            self.notifications
                                .push(Notification::error(error.to_string()));
                            self.status_message = "Load failed".to_string();
                        }
                    }
                }
                AsyncResult::WriteDone {
                    description,
                    result,
                } => {
                    match result {
                        Ok(feedback) => {
                            if feedback.warning {
                                let text = feedback
                                    .message
                                    .unwrap_or_else(|| "Rescheduled with a warning".to_string());
                                self.notifications
                                    .push(Notification::warning_with_undo(text, feedback.undo));
                            } else {
                                self.status_message = description;
                            }
                        }
                        Err(error) => {
                            self.notifications
                                .push(Notification::error(error.to_string()));
                        }
                    }
                    // Resync derived state no matter how the write went.
                    self.refresh();
                }
                AsyncResult::UndoDone { result } => {
                    match result {
                        Ok(true) => self.status_message = "Change undone".to_string(),
                        Ok(false) => self
                            .notifications
                            .push(Notification::error("Could not undo the change")),
                        Err(error) => self
                            .notifications
                            .push(Notification::error(error.to_string())),
                    }
                    self.refresh();
                }
            }
        }
    }

    // ── Domain events ───────────────────────────────────────────────────

    fn record_label(&self, id: RecordId) -> String {
        self.data
            .record(id)
            .and_then(|r| r.text(&self.meta.name_field))
            .unwrap_or("record")
            .to_string()
    }

    fn dispatch_event(&mut self, event: DomainEvent) {
        match event {
            DomainEvent::Reschedule {
                record_id,
                start,
                stop,
                row_changes,
            } => {
                let mut changes = FieldChanges::new();
                if let Some(start) = start {
                    changes.insert(self.meta.date_start_field.clone(), datetime_value(start));
                }
                if let Some(stop) = stop {
                    changes.insert(self.meta.date_stop_field.clone(), datetime_value(stop));
                }
                for (field, value) in row_changes {
                    changes.insert(field, value);
                }
                let previous: FieldChanges = self
                    .data
                    .record(record_id)
                    .map(|record| {
                        changes
                            .keys()
                            .map(|key| (key.clone(), record.value(key)))
                            .collect()
                    })
                    .unwrap_or_default();
                let description = format!("Rescheduled '{}'", self.record_label(record_id));
                let service = Arc::clone(&self.service);
                let meta = self.meta.clone();
                self.spawn_write(description, async move {
                    service.reschedule(&meta, record_id, previous, changes).await
                });
            }
            DomainEvent::Duplicate {
                record_id,
                start,
                stop,
                row_changes,
            } => {
                let mut changes = FieldChanges::new();
                changes.insert(self.meta.date_start_field.clone(), datetime_value(start));
                changes.insert(self.meta.date_stop_field.clone(), datetime_value(stop));
                for (field, value) in row_changes {
                    changes.insert(field, value);
                }
                let description = format!("Copied '{}'", self.record_label(record_id));
                let service = Arc::clone(&self.service);
                self.spawn_write(description, async move {
                    service
                        .duplicate(record_id, changes)
                        .await
                        .map(|_| WriteFeedback::default())
                });
            }
            DomainEvent::Connect { master, slave } => {
                let description = format!(
                    "Linked '{}' → '{}'",
                    self.record_label(master),
                    self.record_label(slave)
                );
                let service = Arc::clone(&self.service);
                self.spawn_write(description, async move {
                    service
                        .create_dependency(master, slave)
                        .await
                        .map(|_| WriteFeedback::default())
                });
            }
            DomainEvent::MultiCreate { regions } => {
                let records = self.records_for_regions(&regions);
                if records.is_empty() {
                    return;
                }
                let description = format!("Created {} records", records.len());
                let service = Arc::clone(&self.service);
                self.spawn_write(description, async move {
                    service
                        .multi_create(records)
                        .await
                        .map(|_| WriteFeedback::default())
                });
            }
        }
    }

    fn records_for_regions(&self, regions: &[CellRegion]) -> Vec<FieldChanges> {
        let Some(derived) = &self.derived else {
            return Vec::new();
        };
        regions
            .iter()
            .filter_map(|region| {
                let row = derived.rows.get(region.row)?;
                let start = derived.grid.sub_column_dates(region.first_col).start;
                let stop = derived
                    .grid
                    .sub_column_dates(region.last_col.saturating_sub(1))
                    .stop;
                let mut fields = FieldChanges::new();
                fields.insert(self.meta.name_field.clone(), json!("New task"));
                fields.insert(self.meta.date_start_field.clone(), datetime_value(start));
                fields.insert(self.meta.date_stop_field.clone(), datetime_value(stop));
                for (field, value) in &row.group_path {
                    fields.insert(field.clone(), value.clone());
                }
                Some(fields)
            })
            .collect()
    }

    fn remove_dependency(&mut self, master: RecordId, slave: RecordId) {
        let description = format!(
            "Unlinked '{}' → '{}'",
            self.record_label(master),
            self.record_label(slave)
        );
        let service = Arc::clone(&self.service);
        self.spawn_write(description, async move {
            service
                .remove_dependency(master, slave)
                .await
                .map(|_| WriteFeedback::default())
        });
    }

    fn delete_selected(&mut self) {
        let Some(record_id) = self.selected_record.take() else {
            return;
        };
        let description = format!("Deleted '{}'", self.record_label(record_id));
        let service = Arc::clone(&self.service);
        self.spawn_write(description, async move {
            service
                .delete(vec![record_id])
                .await
                .map(|_| WriteFeedback::default())
        });
    }

    pub fn create_in_selection(&mut self) {
        if let Some(event) = self.interaction.commit_selection() {
            self.dispatch_event(event);
        }
    }

    pub fn export_csv(&mut self) {
        if self.data.records.is_empty() {
            self.status_message = "Nothing to export".to_string();
            return;
        }
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .set_file_name(format!("{}.csv", self.view_title))
            .save_file()
        {
            match crate::io::csv_export::export_csv(&self.data.records, &self.meta, &path) {
                Ok(count) => self.status_message = format!("Exported {count} records"),
                Err(error) => self
                    .notifications
                    .push(Notification::error(format!("CSV export failed: {error:#}"))),
            }
        }
    }

    fn rebuild_derived(&mut self) {
        self.derived = Some(derive(
            &self.meta,
            &self.data,
            &self.view,
            &self.closed_rows,
            &self.expanded_folds,
            &self.config,
        ));
        self.dirty = false;
    }
}

impl eframe::App for BoardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ui::theme::apply_theme(ctx);
        self.drain_results();
        if self.dirty {
            self.rebuild_derived();
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Delete)) {
            self.delete_selected();
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui::toolbar::show_toolbar(self, ui);
        });

        egui::TopBottomPanel::bottom("status_bar")
            .exact_height(24.0)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(
                        egui::RichText::new(&self.status_message)
                            .font(ui::theme::font_sub())
                            .color(ui::theme::TEXT_SECONDARY),
                    );
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            egui::RichText::new(format!(
                                "{} · {} records",
                                self.meta.scale.label(),
                                self.data.length
                            ))
                            .size(10.5)
                            .color(ui::theme::TEXT_DIM),
                        );
                    });
                });
            });

        let mut board_result = None;
        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(ui::theme::BG_DARK))
            .show(ctx, |ui| {
                if let Some(derived) = &self.derived {
                    board_result = Some(ui::gantt_board::show_gantt_board(
                        &self.meta,
                        &self.data,
                        derived,
                        &mut self.interaction,
                        self.selected_record,
                        self.multi_create,
                        ui,
                    ));
                } else {
                    ui.centered_and_justified(|ui| {
                        ui.add(egui::Spinner::new().size(28.0));
                    });
                }
            });

        if let Some(result) = board_result {
            if let Some(record_id) = result.select_record {
                self.selected_record = Some(record_id);
            }
            if let Some(row_id) = result.toggle_row {
                if !self.closed_rows.remove(&row_id) {
                    self.closed_rows.insert(row_id);
                }
                self.dirty = true;
            }
            if let Some(run_start) = result.toggle_fold {
                if !self.expanded_folds.remove(&run_start) {
                    self.expanded_folds.insert(run_start);
                }
                self.dirty = true;
            }
            if let Some((master, slave)) = result.remove_dependency {
                self.remove_dependency(master, slave);
            }
            for outcome in result.outcomes {
                match outcome {
                    GestureOutcome::Event(event) => self.dispatch_event(event),
                    GestureOutcome::Invalid(message) => {
                        self.notifications.push(Notification::validation(message));
                    }
                    GestureOutcome::Quiet | GestureOutcome::Cancelled => {}
                }
            }
        }

        match ui::notifications::show_notifications(&mut self.notifications, ctx) {
            NotificationAction::Undo(operation) => self.spawn_undo(operation),
            NotificationAction::None => {}
        }
    }
}

/// One scale-aligned window of `units` around the focus date.
fn window_around(focus: NaiveDate, scale: ScaleId, units: u32) -> (NaiveDateTime, NaiveDateTime) {
    let anchor = focus.and_hms_opt(0, 0, 0).unwrap_or_default();
    let start = scale.align_down(anchor);
    let mut stop = start;
    for _ in 0..units.max(1) {
        stop = scale.next_unit(stop);
    }
    (start, stop)
}

/// Build the full derivation pass for one (MetaData, GanttData) pair.
pub fn derive(
    meta: &MetaData,
    data: &GanttData,
    view: &ViewDefinition,
    closed: &HashSet<RowId>,
    expanded_folds: &HashSet<u32>,
    config: &Config,
) -> Derived {
    let grid = TimeGrid::new(meta);
    let tree = build_rows(
        &data.groups,
        &data.record_ids(),
        &meta.grouped_by,
        &view.readonly_group_fields,
    );
    let rows = flatten(&tree, closed);

    let mut pills: Vec<Pill> = Vec::new();
    let mut row_levels = vec![1u32; rows.len()];
    let mut next_id = 0u32;

    let make_pill = |id: RecordId, row: &FlatRow, row_index: usize, next_id: &mut u32| {
        let (start, stop) = data.record_times(meta, id)?;
        if start >= meta.global_stop || stop <= meta.global_start {
            return None;
        }
        let first = grid.sub_index(grid.date_to_column(start));
        let last = grid.sub_index(grid.date_to_column(stop));
        let pill = Pill {
            id: PillId(*next_id),
            record_id: Some(id),
            row_id: row.id.clone(),
            row_index,
            first_col: first,
            last_col: last,
            level: 0,
            start,
            stop,
            disable_start_resize: row.locked || start < meta.global_start,
            disable_stop_resize: row.locked || stop > meta.global_stop,
            aggregate: None,
        };
        *next_id += 1;
        Some(pill)
    };

    let consolidation_value = |id: RecordId| -> Option<(f64, bool)> {
        let params = meta.consolidation.as_ref()?;
        let record = data.record(id)?;
        let value = record.number(&params.field).unwrap_or(0.0);
        let excluded = params
            .exclude_field
            .as_deref()
            .map(|field| record.flag(field))
            .unwrap_or(false);
        Some((value, excluded))
    };

    for (row_index, row) in rows.iter().enumerate() {
        let mut row_pills: Vec<Pill> = row
            .record_ids
            .iter()
            .filter_map(|&id| make_pill(id, row, row_index, &mut next_id))
            .collect();
        if row.is_group {
            let aggregates = aggregate_pills(
                &row_pills,
                &row.id,
                row_index,
                meta.consolidation.as_ref(),
                &consolidation_value,
                &mut next_id,
            );
            pills.extend(aggregates);
        } else {
            row_levels[row_index] = assign_levels(&mut row_pills).max(1);
            pills.extend(row_pills);
        }
    }

    // Per-leaf-row unavailability masks at sub-column granularity.
    let total = grid.total_sub_columns();
    let mut unavailable_rows: Vec<Vec<bool>> = Vec::with_capacity(rows.len());
    let mut leaf_masks: Vec<Vec<bool>> = Vec::new();
    for row in &rows {
        if row.is_group {
            unavailable_rows.push(Vec::new());
            continue;
        }
        let mut mask = vec![false; total as usize];
        for field in &meta.unavailability_fields {
            let Some((_, value)) = row.group_path.iter().find(|(f, _)| f == field) else {
                continue;
            };
            let key = crate::api::types::value_key(value);
            let Some(intervals) = data
                .unavailabilities
                .get(field)
                .and_then(|per_value| per_value.get(&key))
            else {
                continue;
            };
            for col in 1..=total {
                let span = grid.sub_column_dates(col);
                if intervals
                    .iter()
                    .any(|i| i.start <= span.start && i.stop >= span.stop)
                {
                    mask[(col - 1) as usize] = true;
                }
            }
        }
        leaf_masks.push(mask.clone());
        unavailable_rows.push(mask);
    }

    let foldable = compute_foldable(total, &leaf_masks, &pills);
    let folded = compute_folded_grid(&foldable, expanded_folds, &config.fold_policy(meta.scale));

    let connectors = build_connectors(&pills, &data.dependency_map(meta), &|id| {
        data.record_times(meta, id)
    });

    Derived {
        grid,
        rows,
        row_levels,
        pills,
        connectors,
        foldable,
        folded,
        unavailable_rows,
    }
}

fn demo_view() -> ViewDefinition {
    ViewDefinition {
        title: "Workshop Schedule".to_string(),
        date_start_field: "date_start".into(),
        date_stop_field: "date_stop".into(),
        name_field: "name".into(),
        progress_field: Some("progress".into()),
        color_field: Some("color".into()),
        dependency_field: Some("depend_on".into()),
        inverse_dependency_field: Some("dependency_of".into()),
        default_group_by: vec!["team".into(), "stage".into()],
        readonly_group_fields: HashSet::new(),
        unavailability_fields: vec!["team".into()],
        progress_bar_fields: vec!["team".into()],
        consolidation: Some(ConsolidationParams {
            field: "hours".into(),
            exclude_field: Some("draft".into()),
            max_value: Some(24.0),
        }),
        reschedule_method: RescheduleMethod::Cascade,
        default_scale: ScaleId::Week,
    }
}

/// Seed schedule for the in-memory demo backend, laid out around the
/// current week.
fn sample_records() -> Vec<Record> {
    let today = chrono::Local::now().date_naive();
    let monday = today - chrono::Duration::days(today.weekday().num_days_from_monday() as i64);
    let at = |day_offset: i64, hour: u32| {
        (monday + chrono::Duration::days(day_offset))
            .and_hms_opt(hour, 0, 0)
            .unwrap_or_default()
    };

    let mut records = Vec::new();
    let mut push = |name: &str,
                    team: &str,
                    stage: &str,
                    start: NaiveDateTime,
                    stop: NaiveDateTime,
                    progress: f64,
                    color: u32,
                    hours: f64|
     -> RecordId {
        let id = uuid::Uuid::new_v4();
        let mut fields = FieldChanges::new();
        fields.insert("name".into(), json!(name));
        fields.insert("team".into(), json!(team));
        fields.insert("stage".into(), json!(stage));
        fields.insert("date_start".into(), datetime_value(start));
        fields.insert("date_stop".into(), datetime_value(stop));
        fields.insert("progress".into(), json!(progress));
        fields.insert("color".into(), json!(color));
        fields.insert("hours".into(), json!(hours));
        fields.insert("draft".into(), json!(false));
        fields.insert("depend_on".into(), json!([]));
        fields.insert("dependency_of".into(), json!([]));
        records.push(Record::new(id, fields));
        id
    };

    let prep = push("Frame preparation", "Alpha", "Prep", at(0, 8), at(1, 17), 1.0, 0, 14.0);
    let weld = push("Welding", "Alpha", "Build", at(2, 8), at(3, 12), 0.6, 1, 10.0);
    let paint = push("Paint booth", "Alpha", "Build", at(3, 13), at(4, 17), 0.0, 3, 9.0);
    push("Inline QA", "Alpha", "Build", at(2, 9), at(2, 17), 0.2, 4, 6.0);
    let assembly = push("Assembly", "Beta", "Build", at(1, 8), at(3, 17), 0.4, 2, 20.0);
    push("Wiring", "Beta", "Build", at(2, 8), at(4, 12), 0.1, 5, 16.0);
    let inspect = push("Final inspection", "Beta", "Check", at(4, 13), at(4, 17), 0.0, 6, 4.0);

    // Dependency chains: prep → weld → paint, assembly → inspection.
    let link = |records: &mut Vec<Record>, master: RecordId, slave: RecordId| {
        for record in records.iter_mut() {
            if record.id == slave {
                if let Some(serde_json::Value::Array(items)) = record.fields.get_mut("depend_on") {
                    items.push(json!(master.to_string()));
                }
            }
            if record.id == master {
                if let Some(serde_json::Value::Array(items)) =
                    record.fields.get_mut("dependency_of")
                {
                    items.push(json!(slave.to_string()));
                }
            }
        }
    };
    link(&mut records, prep, weld);
    link(&mut records, weld, paint);
    link(&mut records, assembly, inspect);

    records
}

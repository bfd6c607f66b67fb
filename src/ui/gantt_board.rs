use chrono::{Datelike, Timelike};
use egui::{Color32, Pos2, Rect, Rounding, Sense, Stroke, Ui, Vec2};
use std::collections::HashMap;

use crate::app::Derived;
use crate::interact::{
    CellRef, GestureContext, GestureOutcome, HitTarget, InteractionEngine, Modifiers, PointerEvent,
};
use crate::model::meta::{MetaData, ScaleId};
use crate::model::pill::{ConnectorAlert, Pill, PillId};
use crate::model::record::RecordId;
use crate::model::row::RowId;
use crate::model::GanttData;
use crate::ui::theme;

const HEADER_HEIGHT: f32 = theme::HEADER_HEIGHT;
const NAME_W: f32 = theme::NAME_COLUMN_WIDTH;
const LEVEL_H: f32 = theme::LEVEL_HEIGHT;
const ROW_PAD: f32 = theme::ROW_PADDING;

/// Result details from interactions with the board.
#[derive(Default)]
pub struct BoardInteraction {
    pub outcomes: Vec<GestureOutcome>,
    pub select_record: Option<RecordId>,
    pub toggle_row: Option<RowId>,
    pub toggle_fold: Option<u32>,
    pub remove_dependency: Option<(RecordId, RecordId)>,
}

/// One straight piece of a drawn connector, kept for click hit-testing.
struct ConnectorSegment {
    from: Pos2,
    to: Pos2,
    master: RecordId,
    slave: RecordId,
}

/// Pixel geometry of the current frame: column offsets and row offsets,
/// derived purely from the fold maps and per-row level counts. This is the
/// only place cells become pixels.
struct BoardGeometry {
    col_x: Vec<f32>,
    row_y: Vec<f32>,
    grid_width: f32,
    body_height: f32,
}

impl BoardGeometry {
    fn new(derived: &Derived, meta: &MetaData) -> Self {
        let folded = &derived.folded;
        let cell_part = derived.grid.cell_part();
        let sub_w =
            (meta.scale.config().minimal_column_width / cell_part as f32).max(14.0);

        let display_count = folded.display_count.max(1);
        let mut col_x = Vec::with_capacity(display_count as usize + 1);
        let mut x = 0.0f32;
        col_x.push(0.0);
        for display in 1..=display_count {
            x += if folded.display_is_folded(display) {
                theme::FOLDED_COLUMN_WIDTH
            } else {
                sub_w
            };
            col_x.push(x);
        }

        let mut row_y = Vec::with_capacity(derived.rows.len() + 1);
        let mut y = 0.0f32;
        row_y.push(0.0);
        for levels in &derived.row_levels {
            y += (*levels).max(1) as f32 * LEVEL_H + ROW_PAD * 2.0;
            row_y.push(y);
        }

        Self {
            grid_width: x,
            body_height: y,
            col_x,
            row_y,
        }
    }

    fn row_top(&self, row: usize) -> f32 {
        self.row_y.get(row).copied().unwrap_or(self.body_height)
    }

    fn row_bottom(&self, row: usize) -> f32 {
        self.row_y
            .get(row + 1)
            .copied()
            .unwrap_or(self.body_height)
    }

    fn display_left(&self, display: u32) -> f32 {
        self.col_x
            .get((display - 1) as usize)
            .copied()
            .unwrap_or(self.grid_width)
    }

    fn display_right(&self, display: u32) -> f32 {
        self.col_x
            .get(display as usize)
            .copied()
            .unwrap_or(self.grid_width)
    }

    fn row_at(&self, y: f32) -> Option<usize> {
        if y < 0.0 || self.row_y.len() < 2 {
            return None;
        }
        match self.row_y.binary_search_by(|v| v.total_cmp(&y)) {
            Ok(i) => Some(i.min(self.row_y.len() - 2)),
            Err(0) => None,
            Err(i) => (i - 1 < self.row_y.len() - 1).then_some(i - 1),
        }
    }

    fn display_at(&self, x: f32) -> Option<u32> {
        if x < 0.0 || self.col_x.len() < 2 {
            return None;
        }
        match self.col_x.binary_search_by(|v| v.total_cmp(&x)) {
            Ok(i) => Some((i as u32 + 1).min(self.col_x.len() as u32 - 1)),
            Err(0) => None,
            Err(i) => (i < self.col_x.len()).then_some(i as u32),
        }
    }
}

/// Render the Gantt board (header, rows, pills, connectors) and translate
/// pointer activity into interaction-engine events.
#[allow(clippy::too_many_arguments)]
pub fn show_gantt_board(
    meta: &MetaData,
    data: &GanttData,
    derived: &Derived,
    engine: &mut InteractionEngine,
    selected: Option<RecordId>,
    multi_create: bool,
    ui: &mut Ui,
) -> BoardInteraction {
    let mut result = BoardInteraction::default();
    let geometry = BoardGeometry::new(derived, meta);

    egui::ScrollArea::both()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            let canvas = Vec2::new(
                NAME_W + geometry.grid_width + 40.0,
                HEADER_HEIGHT + geometry.body_height + 40.0,
            );
            let (response, painter) = ui.allocate_painter(
                canvas.max(ui.available_size()),
                Sense::click_and_drag(),
            );
            let origin = response.rect.min;
            let clip = ui.clip_rect();

            painter.rect_filled(response.rect, 0.0, theme::BG_DARK);

            let visible_rows = visible_row_range(&geometry, origin, clip);
            let visible_cols = visible_display_range(&geometry, derived, origin, clip);

            draw_columns(&painter, origin, &geometry, derived, meta, visible_cols);
            draw_rows(
                &painter,
                origin,
                &geometry,
                derived,
                engine,
                visible_rows,
                visible_cols,
            );
            draw_header(&painter, origin, &geometry, derived, meta, visible_cols);
            draw_today_line(&painter, origin, &geometry, derived);

            let rect_of = |pill: &Pill| pill_rect(&geometry, derived, origin, pill);
            let mut rects: Vec<(Rect, PillId)> = Vec::new();
            for pill in &derived.pills {
                if pill.row_index < visible_rows.0 || pill.row_index >= visible_rows.1 {
                    continue;
                }
                let rect = rect_of(pill);
                draw_pill(&painter, rect, pill, data, meta, selected);
                rects.push((rect, pill.id));
            }

            let connector_segments = draw_connectors(&painter, derived, &rect_of, clip);
            draw_name_column(
                &painter,
                origin,
                &geometry,
                derived,
                data,
                meta,
                visible_rows,
                &mut result,
                &response,
            );
            draw_gesture_previews(&painter, origin, &geometry, derived, engine, &rect_of);

            // ── Pointer translation ─────────────────────────────────────
            let ctx = GestureContext {
                grid: &derived.grid,
                pills: &derived.pills,
                rows: &derived.rows,
                multi_create,
            };
            let pointer = response
                .interact_pointer_pos()
                .or_else(|| ui.ctx().pointer_hover_pos());

            if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                result.outcomes.push(engine.handle(PointerEvent::Escape, &ctx));
            }

            if let Some(pos) = pointer {
                let target = target_at(pos, &rects, derived);
                let cell = cell_at(pos, origin, &geometry, derived);
                set_cursor(ui, target, engine);

                if response.drag_started() {
                    if let Some(cell) = cell {
                        let modifiers = ui.input(|i| Modifiers {
                            ctrl: i.modifiers.ctrl,
                            copy: i.modifiers.ctrl,
                        });
                        result.outcomes.push(engine.handle(
                            PointerEvent::Down {
                                target,
                                cell,
                                modifiers,
                            },
                            &ctx,
                        ));
                    }
                } else if response.dragged() {
                    if let Some(cell) = cell {
                        result
                            .outcomes
                            .push(engine.handle(PointerEvent::Move { cell }, &ctx));
                    }
                } else if response.drag_stopped() {
                    // A release outside any valid cell cancels, reverting
                    // visual state without emitting a domain event.
                    let event = match cell {
                        Some(cell) => PointerEvent::Up { target, cell },
                        None => PointerEvent::Escape,
                    };
                    result.outcomes.push(engine.handle(event, &ctx));
                }

                if response.clicked() {
                    match target {
                        HitTarget::Pill(id)
                        | HitTarget::StartHandle(id)
                        | HitTarget::StopHandle(id)
                        | HitTarget::LinkHandle(id) => {
                            result.select_record =
                                derived.pills.iter().find(|p| p.id == id).and_then(|p| p.record_id);
                        }
                        HitTarget::Cell => {
                            // A click on a folded-run header toggles it; a
                            // click on a connector removes the dependency.
                            if pos.y < origin.y + HEADER_HEIGHT {
                                if let Some(display) =
                                    geometry.display_at(pos.x - origin.x - NAME_W)
                                {
                                    let total = derived.folded.total_of(display);
                                    result.toggle_fold = derived.folded.run_start_at(total);
                                }
                            } else if let Some(segment) = connector_segments
                                .iter()
                                .find(|s| segment_distance(s.from, s.to, pos) <= 5.0)
                            {
                                result.remove_dependency =
                                    Some((segment.master, segment.slave));
                            }
                        }
                    }
                }

                if let HitTarget::Pill(id) = target {
                    show_pill_tooltip(ui, id, derived, data, meta);
                }
            }
        });

    result
}

fn visible_row_range(geometry: &BoardGeometry, origin: Pos2, clip: Rect) -> (usize, usize) {
    let top = clip.top() - origin.y - HEADER_HEIGHT;
    let bottom = clip.bottom() - origin.y - HEADER_HEIGHT;
    let count = geometry.row_y.len().saturating_sub(1);
    let first = (0..count)
        .find(|&r| geometry.row_bottom(r) >= top)
        .unwrap_or(count);
    let last = (first..count)
        .find(|&r| geometry.row_top(r) > bottom)
        .unwrap_or(count);
    (first, last)
}

fn visible_display_range(
    geometry: &BoardGeometry,
    derived: &Derived,
    origin: Pos2,
    clip: Rect,
) -> (u32, u32) {
    let left = clip.left() - origin.x - NAME_W;
    let right = clip.right() - origin.x - NAME_W;
    let count = derived.folded.display_count;
    let first = (1..=count)
        .find(|&d| geometry.display_right(d) >= left)
        .unwrap_or(count.max(1));
    let last = (first..=count)
        .find(|&d| geometry.display_left(d) > right)
        .unwrap_or(count + 1);
    (first, last)
}

fn draw_columns(
    painter: &egui::Painter,
    origin: Pos2,
    geometry: &BoardGeometry,
    derived: &Derived,
    _meta: &MetaData,
    (first, last): (u32, u32),
) {
    let cell_part = derived.grid.cell_part();
    let top = origin.y + HEADER_HEIGHT;
    let bottom = top + geometry.body_height;
    for display in first..last {
        let x0 = origin.x + NAME_W + geometry.display_left(display);
        let x1 = origin.x + NAME_W + geometry.display_right(display);
        if derived.folded.display_is_folded(display) {
            painter.rect_filled(
                Rect::from_min_max(Pos2::new(x0, top), Pos2::new(x1, bottom)),
                0.0,
                theme::FOLDED_COLUMN_FILL,
            );
        }
        let total = derived.folded.total_of(display);
        let interval_boundary = (total - 1) % cell_part == 0;
        painter.line_segment(
            [Pos2::new(x0, top), Pos2::new(x0, bottom)],
            Stroke::new(
                if interval_boundary { 0.8 } else { 0.4 },
                theme::GRID_LINE,
            ),
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_rows(
    painter: &egui::Painter,
    origin: Pos2,
    geometry: &BoardGeometry,
    derived: &Derived,
    engine: &InteractionEngine,
    (first_row, last_row): (usize, usize),
    (first_col, last_col): (u32, u32),
) {
    for row_index in first_row..last_row {
        let row = &derived.rows[row_index];
        let y0 = origin.y + HEADER_HEIGHT + geometry.row_top(row_index);
        let y1 = origin.y + HEADER_HEIGHT + geometry.row_bottom(row_index);
        let row_rect = Rect::from_min_max(
            Pos2::new(origin.x, y0),
            Pos2::new(origin.x + NAME_W + geometry.grid_width, y1),
        );

        if row.is_group {
            painter.rect_filled(row_rect, 0.0, theme::BG_GROUP_ROW);
        } else if row_index % 2 == 0 {
            painter.rect_filled(row_rect, 0.0, theme::BG_ROW_EVEN);
        }

        // Off-hours shading and accumulated selection, leaf rows only.
        if !row.is_group {
            let mask = &derived.unavailable_rows[row_index];
            for display in first_col..last_col {
                if derived.folded.display_is_folded(display) {
                    continue;
                }
                let total = derived.folded.total_of(display);
                let x0 = origin.x + NAME_W + geometry.display_left(display);
                let x1 = origin.x + NAME_W + geometry.display_right(display);
                let cell_rect =
                    Rect::from_min_max(Pos2::new(x0, y0), Pos2::new(x1, y1));
                if mask.get((total - 1) as usize).copied().unwrap_or(false) {
                    painter.rect_filled(cell_rect, 0.0, theme::UNAVAILABLE_FILL);
                }
                if engine.selection.contains(row_index, total) {
                    painter.rect_filled(cell_rect, 0.0, theme::SELECT_FILL);
                }
            }
        }

        painter.line_segment(
            [
                Pos2::new(origin.x, y1),
                Pos2::new(origin.x + NAME_W + geometry.grid_width, y1),
            ],
            Stroke::new(0.5, theme::BORDER_SUBTLE),
        );
    }
}

fn draw_header(
    painter: &egui::Painter,
    origin: Pos2,
    geometry: &BoardGeometry,
    derived: &Derived,
    meta: &MetaData,
    (first, last): (u32, u32),
) {
    let header_rect = Rect::from_min_size(
        origin,
        Vec2::new(NAME_W + geometry.grid_width + 40.0, HEADER_HEIGHT),
    );
    painter.rect_filled(header_rect, 0.0, theme::BG_HEADER);
    painter.line_segment(
        [
            Pos2::new(origin.x, origin.y + HEADER_HEIGHT),
            Pos2::new(header_rect.right(), origin.y + HEADER_HEIGHT),
        ],
        Stroke::new(1.0, theme::BORDER_SUBTLE),
    );

    let cell_part = derived.grid.cell_part();
    for display in first..last {
        let x0 = origin.x + NAME_W + geometry.display_left(display);
        if derived.folded.display_is_folded(display) {
            painter.text(
                Pos2::new(x0 + theme::FOLDED_COLUMN_WIDTH / 2.0, origin.y + 30.0),
                egui::Align2::CENTER_CENTER,
                "⋯",
                theme::font_small(),
                theme::TEXT_DIM,
            );
            continue;
        }
        let total = derived.folded.total_of(display);
        if (total - 1) % cell_part != 0 {
            continue;
        }
        let column = (total - 1) / cell_part + 1;
        let span = derived.grid.column_to_dates(column);
        let label = match meta.scale {
            ScaleId::Day => span.start.format("%H:00").to_string(),
            ScaleId::Week => span.start.format("%a %d").to_string(),
            ScaleId::Month => span.start.format("%d").to_string(),
            ScaleId::Year => span.start.format("%b").to_string(),
        };
        painter.text(
            Pos2::new(x0 + 3.0, origin.y + 28.0),
            egui::Align2::LEFT_CENTER,
            label,
            theme::font_sub(),
            theme::TEXT_SECONDARY,
        );

        // Upper band: one label per scale unit.
        let unit_label = match meta.scale {
            ScaleId::Day => (span.start.hour() == 0)
                .then(|| span.start.format("%A %d %B %Y").to_string()),
            ScaleId::Week => (span.start.weekday().num_days_from_monday() == 0)
                .then(|| span.start.format("Week %V · %B %Y").to_string()),
            ScaleId::Month => (span.start.day() == 1)
                .then(|| span.start.format("%B %Y").to_string()),
            ScaleId::Year => (span.start.month() == 1)
                .then(|| span.start.format("%Y").to_string()),
        };
        if let Some(text) = unit_label {
            painter.text(
                Pos2::new(x0 + 3.0, origin.y + 12.0),
                egui::Align2::LEFT_CENTER,
                text,
                theme::font_header(),
                theme::TEXT_PRIMARY,
            );
        }
    }
}

fn draw_today_line(
    painter: &egui::Painter,
    origin: Pos2,
    geometry: &BoardGeometry,
    derived: &Derived,
) {
    let now = chrono::Local::now().naive_local();
    let addr = derived.grid.date_to_column(now);
    let total = derived.grid.sub_index(addr);
    if total > derived.grid.total_sub_columns() {
        return;
    }
    let display = derived.folded.display_of(total);
    let x = origin.x + NAME_W + geometry.display_left(display);
    painter.line_segment(
        [
            Pos2::new(x, origin.y + HEADER_HEIGHT),
            Pos2::new(x, origin.y + HEADER_HEIGHT + geometry.body_height),
        ],
        Stroke::new(1.5, theme::TODAY_LINE),
    );
}

fn pill_rect(geometry: &BoardGeometry, derived: &Derived, origin: Pos2, pill: &Pill) -> Rect {
    let first_display = derived.folded.display_of(pill.first_col);
    let last_display = if pill.last_col > pill.first_col {
        derived.folded.display_of(pill.last_col - 1)
    } else {
        first_display
    };
    let x0 = origin.x + NAME_W + geometry.display_left(first_display);
    let x1 = if pill.last_col > pill.first_col {
        origin.x + NAME_W + geometry.display_right(last_display)
    } else {
        x0 + 6.0 // zero-span pills keep a minimal visual footprint
    };
    let y0 = origin.y
        + HEADER_HEIGHT
        + geometry.row_top(pill.row_index)
        + ROW_PAD
        + pill.level as f32 * LEVEL_H
        + theme::BAR_INSET;
    Rect::from_min_max(
        Pos2::new(x0, y0),
        Pos2::new(x1.max(x0 + 6.0), y0 + LEVEL_H - theme::BAR_INSET * 2.0),
    )
}

fn draw_pill(
    painter: &egui::Painter,
    rect: Rect,
    pill: &Pill,
    data: &GanttData,
    meta: &MetaData,
    selected: Option<RecordId>,
) {
    let rounding = Rounding::same(theme::BAR_ROUNDING);

    if let Some(aggregate) = &pill.aggregate {
        let fill = if aggregate.over_limit {
            theme::AGGREGATE_OVERLOAD
        } else {
            theme::AGGREGATE_BAR
        };
        painter.rect_filled(rect, rounding, fill);
        let label = match aggregate.value {
            Some(value) => format!("{} · {:.0}h", aggregate.count, value),
            None => aggregate.count.to_string(),
        };
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            label,
            theme::font_small(),
            theme::TEXT_ON_BAR,
        );
        return;
    }

    let record = pill.record_id.and_then(|id| data.record(id));
    let color = record
        .and_then(|r| meta.color_field.as_deref().and_then(|f| r.number(f)))
        .map(|i| theme::record_color(i as usize))
        .unwrap_or(theme::RECORD_COLORS[0]);

    // Soft shadow, then the bar itself.
    painter.rect_filled(
        rect.translate(Vec2::new(1.0, 2.0)),
        rounding,
        Color32::from_black_alpha(35),
    );
    painter.rect_filled(rect, rounding, color);

    if let Some(progress) = record
        .and_then(|r| meta.progress_field.as_deref().and_then(|f| r.number(f)))
    {
        let width = rect.width() * (progress as f32).clamp(0.0, 1.0);
        painter.rect_filled(
            Rect::from_min_size(rect.min, Vec2::new(width, rect.height())),
            rounding,
            theme::PROGRESS_OVERLAY,
        );
    }

    let is_selected = pill.record_id.is_some() && pill.record_id == selected;
    if is_selected {
        painter.rect_stroke(
            rect.expand(1.5),
            Rounding::same(theme::BAR_ROUNDING + 1.5),
            Stroke::new(2.0, theme::BORDER_ACCENT),
        );
    }

    if rect.width() > 30.0 {
        let name = record
            .and_then(|r| r.text(&meta.name_field))
            .unwrap_or_default()
            .to_string();
        let galley = painter.layout_no_wrap(name, theme::font_bar(), theme::TEXT_ON_BAR);
        let clipped = painter.with_clip_rect(rect);
        clipped.galley(
            Pos2::new(rect.left() + 6.0, rect.center().y - galley.size().y / 2.0),
            galley,
            Color32::TRANSPARENT,
        );
    }

    // Resize handle affordances and the dependency link handle.
    if !pill.disable_start_resize {
        painter.rect_filled(
            Rect::from_min_size(
                Pos2::new(rect.left() - 1.5, rect.center().y - rect.height() * 0.28),
                Vec2::new(4.0, rect.height() * 0.55),
            ),
            Rounding::same(2.0),
            theme::HANDLE_COLOR,
        );
    }
    if !pill.disable_stop_resize {
        painter.rect_filled(
            Rect::from_min_size(
                Pos2::new(rect.right() - 2.5, rect.center().y - rect.height() * 0.28),
                Vec2::new(4.0, rect.height() * 0.55),
            ),
            Rounding::same(2.0),
            theme::HANDLE_COLOR,
        );
    }
    if meta.dependency_field.is_some() {
        painter.circle_stroke(
            Pos2::new(rect.right() + 7.0, rect.center().y),
            theme::LINK_HANDLE_RADIUS,
            Stroke::new(1.5, theme::CONNECTOR_OK),
        );
    }
}

fn draw_connectors(
    painter: &egui::Painter,
    derived: &Derived,
    pill_rect: &dyn Fn(&Pill) -> Rect,
    clip: Rect,
) -> Vec<ConnectorSegment> {
    let by_id: HashMap<PillId, &Pill> = derived.pills.iter().map(|p| (p.id, p)).collect();
    let mut segments = Vec::new();
    for connector in &derived.connectors {
        let (Some(source), Some(target)) =
            (by_id.get(&connector.source), by_id.get(&connector.target))
        else {
            continue;
        };
        let (Some(master), Some(slave)) = (source.record_id, target.record_id) else {
            continue;
        };
        let from = pill_rect(source);
        let to = pill_rect(target);
        // Virtualization: draw only when an endpoint pill is in view.
        if !clip.intersects(from) && !clip.intersects(to) {
            continue;
        }
        let color = match connector.alert {
            ConnectorAlert::None => theme::CONNECTOR_OK,
            ConnectorAlert::Warning => theme::CONNECTOR_WARNING,
            ConnectorAlert::Error => theme::CONNECTOR_ERROR,
        };
        let stroke = Stroke::new(1.5, color);
        let start = Pos2::new(from.right() + 2.0, from.center().y);
        let end = Pos2::new(to.left() - 2.0, to.center().y);
        let elbow = start.x + 10.0;
        let points = [
            start,
            Pos2::new(elbow, start.y),
            Pos2::new(elbow, end.y),
            end,
        ];
        for pair in points.windows(2) {
            painter.line_segment([pair[0], pair[1]], stroke);
            segments.push(ConnectorSegment {
                from: pair[0],
                to: pair[1],
                master,
                slave,
            });
        }
        painter.add(egui::Shape::convex_polygon(
            vec![
                end,
                Pos2::new(end.x - 6.0, end.y - 3.5),
                Pos2::new(end.x - 6.0, end.y + 3.5),
            ],
            color,
            Stroke::NONE,
        ));
    }
    segments
}

fn segment_distance(a: Pos2, b: Pos2, p: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return a.distance(p);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t).distance(p)
}

#[allow(clippy::too_many_arguments)]
fn draw_name_column(
    painter: &egui::Painter,
    origin: Pos2,
    geometry: &BoardGeometry,
    derived: &Derived,
    data: &GanttData,
    meta: &MetaData,
    (first_row, last_row): (usize, usize),
    result: &mut BoardInteraction,
    response: &egui::Response,
) {
    for row_index in first_row..last_row {
        let row = &derived.rows[row_index];
        let y0 = origin.y + HEADER_HEIGHT + geometry.row_top(row_index);
        let y1 = origin.y + HEADER_HEIGHT + geometry.row_bottom(row_index);
        let indent = origin.x + 8.0 + row.level as f32 * 14.0;

        let mut label = String::new();
        if row.is_group {
            label.push_str(if row.closed { "▸ " } else { "▾ " });
        }
        label.push_str(if row.name.is_empty() {
            "Schedule"
        } else {
            &row.name
        });
        if row.locked {
            label.push_str("  🔒");
        }
        if row.is_group {
            label.push_str(&format!("  ({})", row.record_ids.len()));
        }
        painter.text(
            Pos2::new(indent, (y0 + y1) / 2.0 - 6.0),
            egui::Align2::LEFT_CENTER,
            label,
            if row.is_group {
                theme::font_header()
            } else {
                theme::font_sub()
            },
            if row.locked {
                theme::TEXT_DIM
            } else {
                theme::TEXT_PRIMARY
            },
        );

        // Capacity bar from the backend's progress-bar payload.
        if let Some((field, value)) = row.group_path.last() {
            if meta.progress_bar_fields.contains(field) {
                let key = crate::api::types::value_key(value);
                if let Some(info) = data
                    .progress_bars
                    .get(field)
                    .and_then(|per_value| per_value.get(&key))
                {
                    let bar = Rect::from_min_size(
                        Pos2::new(indent, (y0 + y1) / 2.0 + 4.0),
                        Vec2::new(90.0, 4.0),
                    );
                    painter.rect_filled(bar, Rounding::same(2.0), theme::BORDER_SUBTLE);
                    let ratio = if info.max_value > 0.0 {
                        (info.value / info.max_value).min(1.0) as f32
                    } else {
                        0.0
                    };
                    let fill = if info.value > info.max_value {
                        theme::CAPACITY_OVER
                    } else {
                        theme::CAPACITY_OK
                    };
                    painter.rect_filled(
                        Rect::from_min_size(bar.min, Vec2::new(bar.width() * ratio, 4.0)),
                        Rounding::same(2.0),
                        fill,
                    );
                    painter.text(
                        Pos2::new(bar.right() + 6.0, bar.center().y),
                        egui::Align2::LEFT_CENTER,
                        format!("{:.0}h / {:.0}h", info.value, info.max_value),
                        theme::font_small(),
                        theme::TEXT_DIM,
                    );
                }
            }
        }

        // Collapse toggle on group-row name clicks.
        if row.is_group && response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let name_rect = Rect::from_min_max(
                    Pos2::new(origin.x, y0),
                    Pos2::new(origin.x + NAME_W, y1),
                );
                if name_rect.contains(pos) {
                    result.toggle_row = Some(row.id.clone());
                }
            }
        }
    }

    // Separator between names and the grid.
    painter.line_segment(
        [
            Pos2::new(origin.x + NAME_W, origin.y),
            Pos2::new(
                origin.x + NAME_W,
                origin.y + HEADER_HEIGHT + geometry.body_height,
            ),
        ],
        Stroke::new(1.0, theme::BORDER_SUBTLE),
    );
}

fn draw_gesture_previews(
    painter: &egui::Painter,
    origin: Pos2,
    geometry: &BoardGeometry,
    derived: &Derived,
    engine: &InteractionEngine,
    pill_rect: &dyn Fn(&Pill) -> Rect,
) {
    let total_x = |col: i64| -> f32 {
        let clamped = col.clamp(1, derived.grid.total_sub_columns() as i64) as u32;
        let display = derived.folded.display_of(clamped);
        origin.x + NAME_W + geometry.display_left(display)
    };

    if let Some(preview) = engine.drag.preview() {
        let y0 = origin.y
            + HEADER_HEIGHT
            + geometry.row_top(preview.row_index)
            + ROW_PAD
            + theme::BAR_INSET;
        let ghost = Rect::from_min_max(
            Pos2::new(total_x(preview.first_col), y0),
            Pos2::new(
                total_x(preview.last_col).max(total_x(preview.first_col) + 6.0),
                y0 + LEVEL_H - theme::BAR_INSET * 2.0,
            ),
        );
        painter.rect_filled(ghost, Rounding::same(theme::BAR_ROUNDING), theme::GHOST_FILL);
        painter.rect_stroke(
            ghost,
            Rounding::same(theme::BAR_ROUNDING),
            Stroke::new(1.0, theme::BORDER_ACCENT),
        );
        if preview.copy {
            painter.text(
                Pos2::new(ghost.right() + 8.0, ghost.center().y),
                egui::Align2::LEFT_CENTER,
                "+",
                theme::font_header(),
                theme::BORDER_ACCENT,
            );
        }
    }

    if let Some((pill_id, edge, delta)) = engine.resize.preview() {
        if let Some(pill) = derived.pills.iter().find(|p| p.id == pill_id) {
            let rect = pill_rect(pill);
            let (first, last) = match edge {
                crate::interact::ResizeEdge::Start => {
                    (pill.first_col as i64 + delta, pill.last_col as i64)
                }
                crate::interact::ResizeEdge::Stop => {
                    (pill.first_col as i64, pill.last_col as i64 + delta)
                }
            };
            let ghost = Rect::from_min_max(
                Pos2::new(total_x(first), rect.top()),
                Pos2::new(total_x(last).max(total_x(first) + 6.0), rect.bottom()),
            );
            painter.rect_stroke(
                ghost,
                Rounding::same(theme::BAR_ROUNDING),
                Stroke::new(1.5, theme::BORDER_ACCENT),
            );
        }
    }

    if let Some((source, cell)) = engine.connect.preview() {
        if let Some(pill) = derived.pills.iter().find(|p| p.id == source) {
            let rect = pill_rect(pill);
            let from = Pos2::new(rect.right() + 7.0, rect.center().y);
            let display = derived.folded.display_of(cell.col.max(1));
            let to = Pos2::new(
                origin.x + NAME_W + geometry.display_left(display),
                origin.y
                    + HEADER_HEIGHT
                    + geometry.row_top(cell.row)
                    + LEVEL_H / 2.0,
            );
            painter.line_segment([from, to], Stroke::new(1.5, theme::BORDER_ACCENT));
        }
    }

    if let Some((a, b)) = engine.select.preview() {
        let x0 = total_x(a.col.min(b.col) as i64);
        let x1 = total_x((a.col.max(b.col) + 1) as i64);
        let y0 = origin.y + HEADER_HEIGHT + geometry.row_top(a.row.min(b.row));
        let y1 = origin.y + HEADER_HEIGHT + geometry.row_bottom(a.row.max(b.row));
        painter.rect_filled(
            Rect::from_min_max(Pos2::new(x0, y0), Pos2::new(x1, y1)),
            0.0,
            theme::SELECT_FILL,
        );
    }
}

fn target_at(pos: Pos2, rects: &[(Rect, PillId)], derived: &Derived) -> HitTarget {
    // Topmost pill wins; handles take priority over the body.
    for (rect, id) in rects.iter().rev() {
        let link_center = Pos2::new(rect.right() + 7.0, rect.center().y);
        if pos.distance(link_center) <= theme::LINK_HANDLE_RADIUS + 3.0 {
            return HitTarget::LinkHandle(*id);
        }
        if !rect.expand(theme::HANDLE_WIDTH * 0.5).contains(pos) {
            continue;
        }
        let record_pill = derived
            .pills
            .iter()
            .find(|p| p.id == *id)
            .is_some_and(|p| p.record_id.is_some());
        if record_pill {
            if (pos.x - rect.left()).abs() <= theme::HANDLE_WIDTH {
                return HitTarget::StartHandle(*id);
            }
            if (pos.x - rect.right()).abs() <= theme::HANDLE_WIDTH {
                return HitTarget::StopHandle(*id);
            }
        }
        if rect.contains(pos) {
            return HitTarget::Pill(*id);
        }
    }
    HitTarget::Cell
}

fn cell_at(
    pos: Pos2,
    origin: Pos2,
    geometry: &BoardGeometry,
    derived: &Derived,
) -> Option<CellRef> {
    let row = geometry.row_at(pos.y - origin.y - HEADER_HEIGHT)?;
    let display = geometry.display_at(pos.x - origin.x - NAME_W)?;
    let col = derived.folded.total_of(display);
    Some(CellRef { row, col })
}

fn set_cursor(ui: &Ui, target: HitTarget, engine: &InteractionEngine) {
    if engine.drag.preview().is_some() {
        ui.ctx().set_cursor_icon(egui::CursorIcon::Grabbing);
        return;
    }
    if engine.resize.preview().is_some() {
        ui.ctx().set_cursor_icon(egui::CursorIcon::ResizeHorizontal);
        return;
    }
    match target {
        HitTarget::StartHandle(_) | HitTarget::StopHandle(_) => {
            ui.ctx().set_cursor_icon(egui::CursorIcon::ResizeHorizontal);
        }
        HitTarget::Pill(_) => {
            ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
        }
        HitTarget::LinkHandle(_) => {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair);
        }
        HitTarget::Cell => {}
    }
}

fn show_pill_tooltip(
    ui: &Ui,
    id: PillId,
    derived: &Derived,
    data: &GanttData,
    meta: &MetaData,
) {
    let Some(pill) = derived.pills.iter().find(|p| p.id == id) else {
        return;
    };
    egui::show_tooltip_at_pointer(
        ui.ctx(),
        ui.layer_id(),
        egui::Id::new(("pill-tip", id.0)),
        |ui| {
            if let Some(aggregate) = &pill.aggregate {
                ui.strong(format!("{} records", aggregate.count));
                if let Some(value) = aggregate.value {
                    ui.label(format!("Total: {value:.1}h"));
                    if aggregate.over_limit {
                        ui.colored_label(theme::CONNECTOR_ERROR, "Over capacity");
                    }
                }
                return;
            }
            let record = pill.record_id.and_then(|r| data.record(r));
            if let Some(record) = record {
                ui.strong(record.text(&meta.name_field).unwrap_or("Unnamed"));
                ui.label(format!(
                    "{} → {}",
                    pill.start.format("%d/%m/%Y %H:%M"),
                    pill.stop.format("%d/%m/%Y %H:%M"),
                ));
                if let Some(progress) = meta
                    .progress_field
                    .as_deref()
                    .and_then(|f| record.number(f))
                {
                    ui.label(format!("Progress: {}%", (progress * 100.0) as i32));
                }
            }
        },
    );
}

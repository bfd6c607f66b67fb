use egui::{RichText, Ui};
use egui_phosphor::regular as icon;

use crate::app::BoardApp;
use crate::model::meta::ScaleId;
use crate::ui::theme;

/// Render the top toolbar: window navigation, scale and precision
/// selectors, grouping, multi-create, refresh and export.
pub fn show_toolbar(app: &mut BoardApp, ui: &mut Ui) {
    ui.horizontal(|ui| {
        if ui
            .button(RichText::new(icon::ARROW_LEFT).font(theme::font_menu()))
            .on_hover_text("Previous period")
            .clicked()
        {
            app.shift_window(-1);
        }
        if ui.button("Today").clicked() {
            app.go_to_today();
        }
        if ui
            .button(RichText::new(icon::ARROW_RIGHT).font(theme::font_menu()))
            .on_hover_text("Next period")
            .clicked()
        {
            app.shift_window(1);
        }

        let mut focus = app.focus_input;
        if ui
            .add(egui_extras::DatePickerButton::new(&mut focus))
            .changed()
        {
            app.go_to_date(focus);
        }

        ui.separator();

        let current_scale = app.meta.scale;
        for scale in ScaleId::all() {
            if ui
                .selectable_label(scale == current_scale, scale.label())
                .clicked()
                && scale != current_scale
            {
                app.set_scale(scale);
            }
        }

        let parts = current_scale.config().allowed_parts;
        if parts.len() > 1 {
            let current_part = app.meta.cell_part;
            egui::ComboBox::from_id_salt("cell-part")
                .selected_text(current_part.label())
                .show_ui(ui, |ui| {
                    for &part in parts {
                        if ui
                            .selectable_label(part == current_part, part.label())
                            .clicked()
                            && part != current_part
                        {
                            app.set_cell_part(part);
                        }
                    }
                });
        }

        ui.separator();

        let grouping = app.grouping_enabled();
        if ui
            .selectable_label(grouping, "Grouped")
            .on_hover_text("Group rows by the configured fields")
            .clicked()
        {
            app.toggle_grouping();
        }

        ui.separator();

        if ui
            .selectable_label(app.multi_create, "Multi-create")
            .on_hover_text("Drag over cells to select spans; Ctrl toggles")
            .clicked()
        {
            app.multi_create = !app.multi_create;
        }
        if app.multi_create {
            let has_selection = !app.interaction.selection.is_empty();
            if ui
                .add_enabled(
                    has_selection,
                    egui::Button::new(RichText::new(format!("{} Create", icon::PLUS))),
                )
                .clicked()
            {
                app.create_in_selection();
            }
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui
                .button(RichText::new(icon::EXPORT))
                .on_hover_text("Export CSV")
                .clicked()
            {
                app.export_csv();
            }
            if ui
                .button(RichText::new(icon::ARROWS_CLOCKWISE))
                .on_hover_text("Refresh")
                .clicked()
            {
                app.refresh();
            }
            if app.loading {
                ui.add(egui::Spinner::new().size(14.0));
            }
            ui.label(
                RichText::new(&app.view_title)
                    .size(11.0)
                    .weak(),
            );
        });
    });
}

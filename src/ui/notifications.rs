use egui::{Align2, Color32, RichText};
use std::time::{Duration, Instant};

use crate::model::UndoOperation;
use crate::ui::theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
}

/// A transient or sticky toast. Warning outcomes of dependency-aware
/// reschedules are sticky and carry the Undo payload.
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
    pub sticky: bool,
    pub undo: Option<UndoOperation>,
    pub created: Instant,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            text: text.into(),
            sticky: false,
            undo: None,
            created: Instant::now(),
        }
    }

    /// Backend failure: dismissible, stays until closed.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            text: text.into(),
            sticky: true,
            undo: None,
            created: Instant::now(),
        }
    }

    /// Client-side validation notice: transient, auto-dismissed.
    pub fn validation(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Warning,
            text: text.into(),
            sticky: false,
            undo: None,
            created: Instant::now(),
        }
    }

    pub fn warning_with_undo(text: impl Into<String>, undo: Option<UndoOperation>) -> Self {
        Self {
            kind: NotificationKind::Warning,
            text: text.into(),
            sticky: true,
            undo,
            created: Instant::now(),
        }
    }

    fn expired(&self) -> bool {
        !self.sticky && self.created.elapsed() > Duration::from_secs(5)
    }

    fn accent(&self) -> Color32 {
        match self.kind {
            NotificationKind::Info => theme::ACCENT,
            NotificationKind::Warning => theme::CONNECTOR_WARNING,
            NotificationKind::Error => theme::CONNECTOR_ERROR,
        }
    }
}

/// Action requested from the notification area this frame.
pub enum NotificationAction {
    None,
    Undo(UndoOperation),
}

/// Draw the toast stack bottom-right; expired toasts are dropped first.
pub fn show_notifications(
    notifications: &mut Vec<Notification>,
    ctx: &egui::Context,
) -> NotificationAction {
    notifications.retain(|n| !n.expired());
    if notifications.is_empty() {
        return NotificationAction::None;
    }
    // Keep repainting so timed dismissal fires without input events.
    ctx.request_repaint_after(Duration::from_millis(250));

    let mut action = NotificationAction::None;
    let mut dismiss: Option<usize> = None;

    egui::Area::new(egui::Id::new("notification-stack"))
        .anchor(Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -28.0))
        .show(ctx, |ui| {
            for (index, notification) in notifications.iter().enumerate() {
                egui::Frame::default()
                    .fill(theme::BG_PANEL)
                    .stroke(egui::Stroke::new(1.0, notification.accent()))
                    .rounding(egui::Rounding::same(6.0))
                    .inner_margin(egui::Margin::symmetric(10.0, 8.0))
                    .show(ui, |ui| {
                        ui.set_max_width(360.0);
                        ui.horizontal(|ui| {
                            ui.label(
                                RichText::new(&notification.text)
                                    .font(theme::font_sub())
                                    .color(theme::TEXT_PRIMARY),
                            );
                            if let Some(undo) = &notification.undo {
                                if ui
                                    .button(RichText::new("Undo").color(theme::ACCENT))
                                    .clicked()
                                {
                                    action = NotificationAction::Undo(undo.clone());
                                    dismiss = Some(index);
                                }
                            }
                            if notification.sticky
                                && ui.button(RichText::new("✕").size(10.0)).clicked()
                            {
                                dismiss = Some(index);
                            }
                        });
                    });
                ui.add_space(4.0);
            }
        });

    if let Some(index) = dismiss {
        notifications.remove(index);
    }
    action
}

// crates/capdeck-ui/src/modules/preview_module.rs
//
// Live camera preview. Shown in the central panel while a video session is
// pending or active; the texture itself is uploaded by the capture-event
// handler in app.rs, this module only draws it.

use capdeck_core::commands::AppCommand;
use capdeck_core::state::CaptureState;
use egui::{Color32, Rect, RichText, Sense, Stroke, Ui, Vec2};

use super::PanelModule;
use crate::context::AppContext;
use crate::helpers::format::format_elapsed;
use crate::theme::{DARK_TEXT_DIM, REC_RED};

pub struct PreviewModule;

impl PanelModule for PreviewModule {
    fn name(&self) -> &str { "Preview" }

    fn ui(&mut self, ui: &mut Ui, state: &CaptureState, actx: &AppContext, _cmd: &mut Vec<AppCommand>) {
        ui.vertical(|ui| {
            ui.add_space(4.0);

            // ── Pending: camera not up yet ───────────────────────────────────
            if state.video_pending.is_some() {
                ui.add_space(ui.available_height() * 0.4);
                ui.vertical_centered(|ui| {
                    ui.spinner();
                    ui.add_space(6.0);
                    ui.label(RichText::new("Starting camera…").size(12.0).color(DARK_TEXT_DIM));
                });
                return;
            }

            let Some(session) = state.video_session.as_ref() else { return };

            // ── Canvas, aspect-fit inside the panel ──────────────────────────
            let ratio = session
                .frame_size
                .map(|(w, h)| w as f32 / h.max(1) as f32)
                .unwrap_or(4.0 / 3.0);
            let panel_w = ui.available_width();
            let panel_h = (ui.available_height() - 30.0).max(80.0);

            let (canvas_w, canvas_h) = {
                let h = panel_w / ratio;
                if h <= panel_h { (panel_w, h) } else { (panel_h * ratio, panel_h) }
            };

            let (outer_rect, _) =
                ui.allocate_exact_size(Vec2::new(panel_w, canvas_h), Sense::hover());
            let canvas = Rect::from_center_size(outer_rect.center(), Vec2::new(canvas_w, canvas_h));
            let painter = ui.painter();

            painter.rect_stroke(
                canvas.expand(2.0), 4.0,
                Stroke::new(1.5, REC_RED.gamma_multiply(0.7)),
                egui::StrokeKind::Outside,
            );
            painter.rect_filled(canvas, 3.0, Color32::BLACK);

            if let Some(tex) = &actx.preview_tex {
                painter.image(
                    tex.id(),
                    canvas,
                    Rect::from_min_max(egui::Pos2::ZERO, egui::Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
            }

            // ── REC badge + elapsed, top-left of the canvas ──────────────────
            let badge_pos = canvas.left_top() + egui::vec2(10.0, 10.0);
            painter.circle_filled(badge_pos + egui::vec2(5.0, 6.0), 5.0, REC_RED);
            painter.text(
                badge_pos + egui::vec2(16.0, 0.0),
                egui::Align2::LEFT_TOP,
                format!("REC  {}", format_elapsed(session.started.elapsed())),
                egui::FontId::monospace(12.0),
                Color32::WHITE,
            );

            ui.add_space(6.0);
            ui.vertical_centered(|ui| {
                let frames = session.fragments.len();
                ui.label(
                    RichText::new(format!("{frames} frames captured"))
                        .size(10.0)
                        .color(DARK_TEXT_DIM),
                );
            });
        });
    }
}

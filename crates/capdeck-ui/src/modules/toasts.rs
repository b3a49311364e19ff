// crates/capdeck-ui/src/modules/toasts.rs
//
// Toast overlay. Not a panel — drawn as a floating Area over the whole
// window, anchored bottom-right, newest at the bottom. Click to dismiss;
// expiry is handled by CaptureState::expire_toasts in the per-frame tick.

use capdeck_core::commands::AppCommand;
use capdeck_core::state::CaptureState;
use capdeck_core::toast::ToastLevel;
use egui::{Align2, Color32, RichText, Stroke};

use crate::theme::{DARK_BG_2, TOAST_ERR, TOAST_INFO, TOAST_OK};

pub struct ToastsModule;

impl ToastsModule {
    pub fn show(ctx: &egui::Context, state: &CaptureState, cmd: &mut Vec<AppCommand>) {
        if state.toasts.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("toast_stack"))
            .anchor(Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                ui.set_max_width(320.0);
                for toast in &state.toasts {
                    let (accent, icon) = match toast.level {
                        ToastLevel::Info    => (TOAST_INFO, "ℹ"),
                        ToastLevel::Success => (TOAST_OK, "✔"),
                        ToastLevel::Error   => (TOAST_ERR, "⚠"),
                    };

                    let resp = egui::Frame::new()
                        .fill(DARK_BG_2)
                        .stroke(Stroke::new(1.0, accent))
                        .corner_radius(egui::CornerRadius::same(5))
                        .inner_margin(egui::Margin { left: 10, right: 10, top: 7, bottom: 7 })
                        .show(ui, |ui| {
                            ui.horizontal(|ui| {
                                ui.label(RichText::new(icon).size(13.0).color(accent));
                                ui.label(
                                    RichText::new(&toast.message)
                                        .size(11.0)
                                        .color(Color32::from_gray(215)),
                                );
                            });
                        })
                        .response;

                    if resp.interact(egui::Sense::click()).clicked() {
                        cmd.push(AppCommand::DismissToast(toast.id));
                    }
                    ui.add_space(4.0);
                }
            });

        // Expiry is time-based; make sure a repaint happens to remove them
        // even when the user isn't interacting.
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

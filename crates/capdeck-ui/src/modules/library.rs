// crates/capdeck-ui/src/modules/library.rs
use capdeck_core::commands::AppCommand;
use capdeck_core::state::{CaptureState, MediaKind, Provenance};
use egui::{Align, Id, Layout, RichText, Sense, Stroke, Ui};

use super::PanelModule;
use crate::context::AppContext;
use crate::helpers::format::{format_bytes, truncate};
use crate::theme::{ACCENT, DARK_BG_2, DARK_BG_3, DARK_BG_4, DARK_BORDER, DARK_TEXT_DIM};

pub struct LibraryModule;

impl PanelModule for LibraryModule {
    fn name(&self) -> &str { "Library" }

    fn ui(&mut self, ui: &mut Ui, state: &CaptureState, _actx: &AppContext, cmd: &mut Vec<AppCommand>) {
        ui.vertical(|ui| {
            // ── Header ──────────────────────────────────────────────────────
            egui::Frame::new()
                .fill(DARK_BG_2)
                .inner_margin(egui::Margin { left: 8, right: 8, top: 6, bottom: 6 })
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(RichText::new("🗂 Library").size(12.0).strong());
                        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                            if !state.library.is_empty() {
                                ui.label(
                                    RichText::new(format!("{} items", state.library.len()))
                                        .size(10.0)
                                        .color(DARK_TEXT_DIM),
                                );
                            }
                        });
                    });
                });

            ui.separator();

            // ── Item list ───────────────────────────────────────────────────
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(4.0);

                let bg_resp = ui.interact(
                    ui.available_rect_before_wrap(),
                    Id::new("library_bg"),
                    Sense::click(),
                );
                if bg_resp.clicked() {
                    cmd.push(AppCommand::SelectItem(None));
                }

                if state.library.is_empty() {
                    ui.add_space(40.0);
                    ui.vertical_centered(|ui| {
                        ui.label(RichText::new("🎬").size(32.0));
                        ui.add_space(6.0);
                        ui.label(
                            RichText::new("Record something,\ndrop files here, or Import")
                                .size(11.0)
                                .color(DARK_TEXT_DIM),
                        );
                    });
                    return;
                }

                for item in &state.library {
                    let id          = item.id;
                    let is_selected = state.selected_item == Some(id);
                    let is_playing  = state.now_playing == Some(id);

                    let border = if is_selected || is_playing { ACCENT } else { DARK_BORDER };
                    let fill   = if is_selected { DARK_BG_4 } else { DARK_BG_3 };

                    let card = egui::Frame::new()
                        .fill(fill)
                        .stroke(Stroke::new(if is_selected { 1.5 } else { 1.0 }, border))
                        .corner_radius(egui::CornerRadius::same(5))
                        .inner_margin(egui::Margin::same(6))
                        .show(ui, |ui| {
                            ui.set_width(ui.available_width() - 4.0);
                            ui.horizontal(|ui| {
                                let icon = match item.kind {
                                    MediaKind::Video => "🎬",
                                    MediaKind::Audio => "🎵",
                                };
                                ui.label(RichText::new(icon).size(18.0));

                                ui.vertical(|ui| {
                                    ui.label(RichText::new(truncate(&item.name, 28)).size(11.0));
                                    let prov = match item.provenance {
                                        Provenance::Recorded => "recorded",
                                        Provenance::Uploaded => "uploaded",
                                    };
                                    let detail = if item.is_empty() {
                                        format!("{prov} · empty")
                                    } else {
                                        format!("{prov} · {}", format_bytes(item.len()))
                                    };
                                    ui.label(RichText::new(detail).size(9.0).color(DARK_TEXT_DIM));
                                });

                                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                                    if is_playing {
                                        if ui.button(RichText::new("⏹").size(13.0)).clicked() {
                                            cmd.push(AppCommand::StopPlayback);
                                        }
                                        ui.label(RichText::new("▶").size(10.0).color(ACCENT));
                                    } else if ui.button(RichText::new("▶").size(13.0)).clicked() {
                                        cmd.push(AppCommand::PlayItem(id));
                                    }
                                });
                            });
                        })
                        .response;

                    let interact = ui.interact(card.rect, Id::new("lib_item").with(id), Sense::click());
                    if interact.clicked() {
                        cmd.push(AppCommand::SelectItem(Some(id)));
                    }
                    if interact.double_clicked() {
                        cmd.push(AppCommand::PlayItem(id));
                    }

                    ui.add_space(4.0);
                }

                ui.add_space(8.0);
            });
        });
    }
}

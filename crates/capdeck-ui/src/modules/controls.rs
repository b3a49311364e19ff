// crates/capdeck-ui/src/modules/controls.rs
//
// Capture transport: record-audio and record-video toggles, file import,
// the live input level meter, and the playback volume controls.

use capdeck_core::commands::AppCommand;
use capdeck_core::state::{CaptureState, MediaKind};
use egui::{Align, Color32, Layout, RichText, Sense, Stroke, Ui};
use rfd::FileDialog;

use super::PanelModule;
use crate::context::AppContext;
use crate::helpers::format::format_elapsed;
use crate::theme::{ACCENT, DARK_BG_3, DARK_BORDER, DARK_TEXT_DIM, REC_RED};

const METER_W: f32 = 70.0;
const METER_H: f32 = 8.0;

/// One elapsed readout per active session, labelled by kind — concurrent
/// audio and video recordings each get their own timer.
fn session_readouts(state: &CaptureState) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(s) = state.audio_session.as_ref() {
        out.push(format!("● 🎙 {}", format_elapsed(s.started.elapsed())));
    }
    if let Some(s) = state.video_session.as_ref() {
        out.push(format!("● 📷 {}", format_elapsed(s.started.elapsed())));
    }
    out
}

pub struct ControlsModule;

impl PanelModule for ControlsModule {
    fn name(&self) -> &str { "Controls" }

    fn ui(&mut self, ui: &mut Ui, state: &CaptureState, actx: &AppContext, cmd: &mut Vec<AppCommand>) {
        ui.horizontal_centered(|ui| {
            // ── Record toggles ───────────────────────────────────────────────
            let audio_active = state.is_recording(MediaKind::Audio);
            let audio_label = if audio_active { "⏹ Stop Audio" } else { "🎙 Record Audio" };
            let audio_btn = ui.add(
                egui::Button::new(
                    RichText::new(audio_label)
                        .size(12.0)
                        .color(if audio_active { REC_RED } else { crate::theme::DARK_TEXT }),
                ),
            );
            if audio_btn.clicked() {
                cmd.push(if audio_active {
                    AppCommand::StopAudioRecording
                } else {
                    AppCommand::StartAudioRecording
                });
            }

            let video_active = state.is_recording(MediaKind::Video);
            let video_label = if state.video_pending.is_some() {
                "⌛ Starting…"
            } else if video_active {
                "⏹ Stop Video"
            } else {
                "📷 Record Video"
            };
            let video_btn = ui.add(
                egui::Button::new(
                    RichText::new(video_label)
                        .size(12.0)
                        .color(if video_active { REC_RED } else { crate::theme::DARK_TEXT }),
                ),
            );
            if video_btn.clicked() {
                cmd.push(if video_active {
                    AppCommand::StopVideoRecording
                } else {
                    AppCommand::StartVideoRecording
                });
            }

            ui.separator();

            if ui.button(RichText::new("＋ Import").size(12.0)).clicked() {
                if let Some(path) = FileDialog::new()
                    .add_filter("Media", &["mp4", "mov", "mkv", "avi", "webm", "m4v",
                                           "mp3", "wav", "aac", "flac", "ogg", "m4a"])
                    .pick_file()
                {
                    cmd.push(AppCommand::ImportFile(path));
                }
            }

            // ── Elapsed + level meter while capturing ────────────────────────
            if audio_active || video_active {
                ui.separator();

                for readout in session_readouts(state) {
                    ui.label(
                        RichText::new(readout)
                            .size(12.0)
                            .color(REC_RED)
                            .monospace(),
                    );
                }

                if let Some(level) = actx.mic_level() {
                    let (rect, _) =
                        ui.allocate_exact_size(egui::vec2(METER_W, METER_H), Sense::hover());
                    let painter = ui.painter();
                    painter.rect_filled(rect, 2.0, DARK_BG_3);
                    // RMS of full-scale audio is ~0.7; stretch so speech is visible.
                    let fill = (level * 2.5).clamp(0.0, 1.0);
                    let mut bar = rect;
                    bar.set_width(rect.width() * fill);
                    let color = if fill > 0.85 { REC_RED } else { ACCENT };
                    painter.rect_filled(bar, 2.0, color);
                    painter.rect_stroke(
                        rect, 2.0,
                        Stroke::new(1.0, DARK_BORDER),
                        egui::StrokeKind::Outside,
                    );
                }
            }

            if actx.finalizes_in_flight > 0 {
                ui.separator();
                ui.label(RichText::new("Processing…").size(11.0).color(DARK_TEXT_DIM));
                ui.spinner();
            }

            // ── Volume / mute, right-aligned ─────────────────────────────────
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                let mut volume = state.volume;
                if ui
                    .add(egui::Slider::new(&mut volume, 0.0..=1.0).show_value(false))
                    .changed()
                {
                    cmd.push(AppCommand::SetVolume(volume));
                }

                let mute_icon = if state.muted { "🔇" } else { "🔊" };
                let mute_color = if state.muted { Color32::from_gray(110) } else { ACCENT };
                if ui
                    .add(egui::Button::new(RichText::new(mute_icon).size(13.0).color(mute_color)))
                    .clicked()
                {
                    cmd.push(AppCommand::ToggleMute);
                }
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_active_session_gets_its_own_readout() {
        let mut state = CaptureState::new();
        assert!(session_readouts(&state).is_empty());

        state.begin_audio(1, 48_000, 1);
        state.begin_video_pending(2, 3);
        state.begin_video(2, 48_000, 1);

        let readouts = session_readouts(&state);
        assert_eq!(readouts.len(), 2);
        assert!(readouts[0].contains("🎙"));
        assert!(readouts[1].contains("📷"));
    }
}

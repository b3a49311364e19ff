// crates/capdeck-ui/src/modules/player.rs
//
// Playback: the central-panel view for whatever is in the player context,
// plus the per-frame consumption of the decode thread's output.
//
// Frame pacing: the decode thread runs ahead of real time until the bounded
// channel fills. poll_playback() holds at most one frame beyond the channel
// and presents it only once its PTS (relative to playback start) is due, so
// video never plays faster than wall clock regardless of decode speed.

use std::time::Duration;

use capdeck_core::commands::AppCommand;
use capdeck_core::media_types::CaptureEvent;
use capdeck_core::state::{CaptureState, MediaKind};
use capdeck_core::toast::ToastLevel;
use egui::{Color32, Rect, RichText, Sense, Stroke, Ui, Vec2};

use super::PanelModule;
use crate::context::{AppContext, PendingFrame};
use crate::helpers::format::{format_elapsed, truncate};
use crate::theme::{ACCENT, DARK_TEXT_DIM};

/// A sink can read empty for a few ticks right after creation while rodio's
/// decode thread fills its buffer. Don't treat empty as finished before this
/// much wall-clock time has passed.
const MIN_PLAY_SECS: f64 = 0.75;

pub struct PlayerModule;

impl PlayerModule {
    /// Drain the playback frame channel and advance the player context.
    /// Called once per frame from app.rs, before the UI pass.
    pub fn poll_playback(state: &mut CaptureState, actx: &mut AppContext, ctx: &egui::Context) {
        let Some(player) = actx.player.as_mut() else {
            // No context — anything still in the channel is from a released
            // playback and must not survive into the next one.
            while actx.worker.playback_rx.try_recv().is_ok() {}
            return;
        };

        let mut failed: Option<String> = None;

        if player.kind == MediaKind::Video {
            // Pull until we hold one undue frame (or the channel is dry).
            while player.pending_frame.is_none() && !player.video_done {
                match actx.worker.playback_rx.try_recv() {
                    Ok(CaptureEvent::PlaybackFrame { epoch, timestamp, width, height, rgba })
                        if epoch == player.epoch =>
                    {
                        player.pending_frame = Some(PendingFrame { timestamp, width, height, rgba });
                    }
                    Ok(CaptureEvent::PlaybackEnded { epoch }) if epoch == player.epoch => {
                        player.video_done = true;
                    }
                    Ok(CaptureEvent::PlaybackFailed { epoch, msg }) if epoch == player.epoch => {
                        failed = Some(msg);
                        break;
                    }
                    Ok(_) => {} // stale epoch — drop
                    Err(_) => break,
                }
            }

            // Present the held frame once its PTS is due.
            let now = player.started.elapsed().as_secs_f64();
            if player
                .pending_frame
                .as_ref()
                .is_some_and(|f| f.timestamp <= now)
            {
                let frame = player.pending_frame.take().unwrap();
                player.frame_tex = Some(ctx.load_texture(
                    "playback-frame",
                    egui::ColorImage::from_rgba_unmultiplied(
                        [frame.width as usize, frame.height as usize],
                        &frame.rgba,
                    ),
                    egui::TextureOptions::LINEAR,
                ));
            }
        }

        // ── Finished? ────────────────────────────────────────────────────────
        let elapsed = player.started.elapsed().as_secs_f64();
        let sink_drained = player
            .sink
            .as_ref()
            .map(|s| s.empty() && elapsed >= MIN_PLAY_SECS)
            .unwrap_or(true);

        let done = match player.kind {
            MediaKind::Audio => sink_drained && elapsed >= MIN_PLAY_SECS,
            MediaKind::Video => player.video_done && player.pending_frame.is_none() && sink_drained,
        };

        if let Some(msg) = failed {
            state.push_toast(ToastLevel::Error, format!("Playback failed: {msg}"));
            state.now_playing = None;
            actx.stop_player();
        } else if done {
            state.now_playing = None;
            actx.stop_player();
        } else {
            // Keep frames coming while something is playing.
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }
}

impl PanelModule for PlayerModule {
    fn name(&self) -> &str { "Player" }

    fn ui(&mut self, ui: &mut Ui, state: &CaptureState, actx: &AppContext, cmd: &mut Vec<AppCommand>) {
        let playing_item = state.now_playing.and_then(|id| state.item(id));

        let Some(item) = playing_item else {
            ui.add_space(ui.available_height() * 0.4);
            ui.vertical_centered(|ui| {
                ui.label(RichText::new("⏯").size(32.0));
                ui.add_space(6.0);
                ui.label(
                    RichText::new("Nothing playing — pick an item from the library")
                        .size(11.0)
                        .color(DARK_TEXT_DIM),
                );
            });
            return;
        };

        ui.vertical(|ui| {
            ui.add_space(4.0);

            // ── Video canvas ─────────────────────────────────────────────────
            if item.kind == MediaKind::Video {
                let tex = actx.player.as_ref().and_then(|p| p.frame_tex.as_ref());
                let ratio = tex
                    .map(|t| {
                        let s = t.size();
                        s[0] as f32 / (s[1].max(1)) as f32
                    })
                    .unwrap_or(4.0 / 3.0);

                let panel_w = ui.available_width();
                let panel_h = (ui.available_height() - 44.0).max(80.0);
                let (canvas_w, canvas_h) = {
                    let h = panel_w / ratio;
                    if h <= panel_h { (panel_w, h) } else { (panel_h * ratio, panel_h) }
                };

                let (outer_rect, _) =
                    ui.allocate_exact_size(Vec2::new(panel_w, canvas_h), Sense::hover());
                let canvas =
                    Rect::from_center_size(outer_rect.center(), Vec2::new(canvas_w, canvas_h));
                let painter = ui.painter();

                painter.rect_stroke(
                    canvas.expand(2.0), 4.0,
                    Stroke::new(1.5, ACCENT.gamma_multiply(0.55)),
                    egui::StrokeKind::Outside,
                );
                painter.rect_filled(canvas, 3.0, Color32::BLACK);

                if let Some(tex) = tex {
                    painter.image(
                        tex.id(),
                        canvas,
                        Rect::from_min_max(egui::Pos2::ZERO, egui::Pos2::new(1.0, 1.0)),
                        Color32::WHITE,
                    );
                }
            } else {
                ui.add_space(ui.available_height() * 0.35);
                ui.vertical_centered(|ui| {
                    ui.label(RichText::new("🎵").size(40.0));
                });
            }

            // ── Transport bar ────────────────────────────────────────────────
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.add_space(8.0);
                if ui.button(RichText::new("⏹ Stop").size(12.0)).clicked() {
                    cmd.push(AppCommand::StopPlayback);
                }
                ui.label(RichText::new(truncate(&item.name, 40)).size(11.0));
                if let Some(player) = &actx.player {
                    ui.label(
                        RichText::new(format_elapsed(player.started.elapsed()))
                            .size(11.0)
                            .color(DARK_TEXT_DIM)
                            .monospace(),
                    );
                }
            });
        });
    }
}

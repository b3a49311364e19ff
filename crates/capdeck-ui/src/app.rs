// crates/capdeck-ui/src/app.rs
//
// CapDeckApp wires the three layers together: panel modules emit AppCommands
// during the UI pass, process_command applies them to CaptureState after the
// pass, and poll_capture routes background CaptureEvents into state at the
// top of every frame. Devices live in AppContext; state stays pure.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use eframe::egui;
use rodio::Decoder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use capdeck_core::commands::AppCommand;
use capdeck_core::media_types::CaptureEvent;
use capdeck_core::state::{CaptureState, MediaKind};
use capdeck_core::toast::ToastLevel;
use capdeck_capture::CaptureWorker;

use crate::capdeck_log;
use crate::context::{AppContext, PlayerContext};
use crate::modules::{
    controls::ControlsModule,
    library::LibraryModule,
    player::PlayerModule,
    preview_module::PreviewModule,
    toasts::ToastsModule,
    PanelModule,
};
use crate::theme::configure_style;

/// The library is deliberately in-memory only — recordings and imports live
/// for the session. Only the transport preferences persist across launches.
#[derive(Serialize, Deserialize)]
struct Prefs {
    volume: f32,
    muted:  bool,
}

impl Default for Prefs {
    fn default() -> Self {
        Self { volume: 1.0, muted: false }
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct CapDeckApp {
    state:   CaptureState,
    context: AppContext,
    // Panel modules as concrete types — typos become compile errors instead
    // of silently blank panels.
    controls: ControlsModule,
    library:  LibraryModule,
    preview:  PreviewModule,
    player:   PlayerModule,
    /// Commands emitted by modules each frame, processed after the UI pass.
    pending_cmds: Vec<AppCommand>,
    /// Events pulled off the capture channel by a stop-flush mid-frame;
    /// routed at the top of the next poll pass.
    deferred_events: Vec<CaptureEvent>,
}

impl CapDeckApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        configure_style(&cc.egui_ctx);
        // Pin to dark mode — prevents egui overwriting our theme on OS
        // light/dark changes.
        cc.egui_ctx.options_mut(|o| {
            o.theme_preference = egui::ThemePreference::Dark;
        });

        let prefs = cc
            .storage
            .and_then(|s| eframe::get_value::<Prefs>(s, eframe::APP_KEY))
            .unwrap_or_default();

        let mut state = CaptureState::new();
        state.volume = prefs.volume.clamp(0.0, 1.0);
        state.muted = prefs.muted;

        Self {
            state,
            context:      AppContext::new(CaptureWorker::new()),
            controls:     ControlsModule,
            library:      LibraryModule,
            preview:      PreviewModule,
            player:          PlayerModule,
            pending_cmds:    Vec::new(),
            deferred_events: Vec::new(),
        }
    }

    // ── Command processing ────────────────────────────────────────────────────

    fn process_command(&mut self, cmd: AppCommand) {
        match cmd {
            // ── Capture ──────────────────────────────────────────────────────
            AppCommand::StartAudioRecording => self.start_audio_recording(),
            AppCommand::StopAudioRecording => {
                // Chunks delivered during this frame's UI pass are still in
                // the channel; pull them in before the session is taken or
                // the tail of the recording is lost.
                flush_session_tail(
                    &mut self.state,
                    &self.context.worker.rx,
                    &mut self.deferred_events,
                );
                self.context.mic_handle = None;
                if let Some(finished) = self.state.end_session(MediaKind::Audio) {
                    self.start_finalize(finished);
                }
            }
            AppCommand::StartVideoRecording => self.start_video_recording(),
            AppCommand::StopVideoRecording => {
                if let Some(epoch) = self.state.video_pending.as_ref().map(|p| p.epoch) {
                    // Camera never came up — cancel the open instead.
                    self.state.abort_video_pending(epoch);
                    self.context.release_video_devices();
                    self.state.push_toast(ToastLevel::Info, "Camera start cancelled");
                } else {
                    flush_session_tail(
                        &mut self.state,
                        &self.context.worker.rx,
                        &mut self.deferred_events,
                    );
                    if let Some(finished) = self.state.end_session(MediaKind::Video) {
                        self.context.release_video_devices();
                        self.start_finalize(finished);
                    }
                }
            }

            // ── Library ──────────────────────────────────────────────────────
            AppCommand::ImportFile(path) => match std::fs::read(&path) {
                Ok(bytes) => {
                    let id = self.state.import_file(&path, bytes);
                    let name = self.state.item(id).map(|i| i.name.clone()).unwrap_or_default();
                    self.state.push_toast(ToastLevel::Success, format!("Imported {name}"));
                }
                Err(e) => {
                    capdeck_log!("[import] read failed for {}: {e}", path.display());
                    self.state.push_toast(
                        ToastLevel::Error,
                        format!("Could not read {}: {e}", path.display()),
                    );
                }
            },
            AppCommand::SelectItem(id) => {
                self.state.selected_item = id;
            }

            // ── Playback ─────────────────────────────────────────────────────
            AppCommand::PlayItem(id) => self.play_item(id),
            AppCommand::StopPlayback => {
                self.context.stop_player();
                self.state.now_playing = None;
            }
            AppCommand::SetVolume(v) => {
                self.state.volume = v.clamp(0.0, 1.0);
                self.apply_sink_volume();
            }
            AppCommand::ToggleMute => {
                self.state.muted = !self.state.muted;
                self.apply_sink_volume();
            }

            // ── Notifications ────────────────────────────────────────────────
            AppCommand::DismissToast(id) => {
                self.state.dismiss_toast(id);
            }
        }
    }

    fn start_audio_recording(&mut self) {
        if self.state.is_recording(MediaKind::Audio) {
            return;
        }
        let epoch = self.context.next_epoch();
        match self.context.worker.start_microphone(epoch) {
            Ok(handle) => {
                self.state.begin_audio(epoch, handle.sample_rate, handle.channels);
                self.context.mic_handle = Some(handle);
                self.state.push_toast(ToastLevel::Info, "Audio recording started");
            }
            Err(e) => {
                capdeck_log!("[capture] mic open failed: {e}");
                self.state
                    .push_toast(ToastLevel::Error, format!("Could not access microphone: {e}"));
            }
        }
    }

    fn start_video_recording(&mut self) {
        if self.state.is_recording(MediaKind::Video) {
            return;
        }
        let cam_epoch = self.context.next_epoch();
        let mic_epoch = self.context.next_epoch();

        // Mic first — a dead mic degrades to silent video, it doesn't block
        // the recording.
        match self.context.worker.start_microphone(mic_epoch) {
            Ok(handle) => self.context.video_mic_handle = Some(handle),
            Err(e) => {
                capdeck_log!("[capture] video mic open failed: {e}");
                self.state.push_toast(
                    ToastLevel::Error,
                    format!("Microphone unavailable — recording without sound: {e}"),
                );
            }
        }

        self.state.begin_video_pending(cam_epoch, mic_epoch);
        self.context.camera_handle = Some(self.context.worker.start_camera(cam_epoch));
    }

    fn start_finalize(&mut self, finished: capdeck_core::FinishedSession) {
        let job = Uuid::new_v4();
        capdeck_log!(
            "[finalize] job {job}: {} fragments, {:.1}s",
            finished.fragments.len(),
            finished.elapsed.as_secs_f64()
        );
        self.context.worker.finalize(job, finished);
        self.context.finalizes_in_flight += 1;
    }

    fn play_item(&mut self, id: Uuid) {
        // One playback context at a time — release the old one first.
        self.context.stop_player();
        self.state.now_playing = None;

        let Some(item) = self.state.item(id) else { return };
        if item.is_empty() {
            self.state
                .push_toast(ToastLevel::Info, "Nothing to play — the recording is empty");
            return;
        }
        let kind = item.kind;
        let name = item.name.clone();
        let bytes = Arc::clone(&item.bytes);
        let epoch = self.context.next_epoch();

        // Audio path for both kinds: the whole item when it's audio, the
        // sound track of the MP4 when it's video. A video without a sound
        // track just fails decode and plays silent.
        let mut decode_err = None;
        let sink = match self.context.ensure_audio_stream() {
            Some(stream) => match Decoder::new(Cursor::new(bytes.as_ref().clone())) {
                Ok(source) => {
                    let sink = rodio::Sink::connect_new(stream.mixer());
                    sink.append(source);
                    sink.set_volume(if self.state.muted { 0.0 } else { self.state.volume });
                    sink.play();
                    Some(sink)
                }
                Err(e) => {
                    decode_err = Some(e.to_string());
                    None
                }
            },
            None => None,
        };

        if kind == MediaKind::Audio && sink.is_none() {
            let msg = decode_err.unwrap_or_else(|| "audio output unavailable".into());
            self.state
                .push_toast(ToastLevel::Error, format!("Could not play {name}: {msg}"));
            return;
        }
        if let Some(msg) = decode_err {
            capdeck_log!("[playback] no decodable sound track in {name}: {msg}");
        }

        // Video payloads are staged to a temp file for the decode thread;
        // the file lives exactly as long as the player context.
        let staged = if kind == MediaKind::Video {
            match stage_payload(&bytes) {
                Ok(file) => {
                    self.context
                        .worker
                        .start_playback(epoch, file.path().to_path_buf());
                    Some(file)
                }
                Err(e) => {
                    self.state
                        .push_toast(ToastLevel::Error, format!("Could not play {name}: {e}"));
                    return;
                }
            }
        } else {
            None
        };

        self.context.player = Some(PlayerContext {
            item_id: id,
            kind,
            epoch,
            started: Instant::now(),
            sink,
            staged,
            frame_tex:     None,
            pending_frame: None,
            video_done:    false,
        });
        self.state.now_playing = Some(id);
    }

    fn apply_sink_volume(&mut self) {
        if let Some(sink) = self.context.player.as_ref().and_then(|p| p.sink.as_ref()) {
            sink.set_volume(if self.state.muted { 0.0 } else { self.state.volume });
        }
    }

    // ── Capture event routing ─────────────────────────────────────────────────

    fn poll_capture(&mut self, ctx: &egui::Context) {
        // Playback frames first, PTS-gated.
        PlayerModule::poll_playback(&mut self.state, &mut self.context, ctx);

        // A camera that never signalled ready must not pin the UI in the
        // pending state forever.
        if self.state.video_pending_expired(Instant::now()) {
            if let Some(epoch) = self.state.video_pending.as_ref().map(|p| p.epoch) {
                self.state.abort_video_pending(epoch);
            }
            self.context.release_video_devices();
            capdeck_log!("[capture] camera open timed out");
            self.state
                .push_toast(ToastLevel::Error, "Camera did not start — gave up waiting");
        }

        for event in std::mem::take(&mut self.deferred_events) {
            self.route_event(event, ctx);
        }
        while let Ok(event) = self.context.worker.rx.try_recv() {
            self.route_event(event, ctx);
        }

        self.enforce_session_budget();
    }

    fn route_event(&mut self, event: CaptureEvent, ctx: &egui::Context) {
        match event {
            CaptureEvent::AudioChunk { epoch, pcm } => {
                self.state.push_pcm(epoch, &pcm);
            }
            CaptureEvent::AudioLost { epoch, msg } => {
                self.handle_audio_lost(epoch, msg);
            }

            CaptureEvent::CameraReady { epoch, width, height } => {
                let (rate, channels) = self
                    .context
                    .video_mic_handle
                    .as_ref()
                    .map(|h| (h.sample_rate, h.channels))
                    .unwrap_or((48_000, 1));
                if self.state.begin_video(epoch, rate, channels) {
                    capdeck_log!("[capture] camera ready at {width}x{height}");
                    self.state.push_toast(ToastLevel::Info, "Video recording started");
                }
                // A stale ready means that open was already aborted; its
                // grab thread notices the dropped handle and exits.
            }
            CaptureEvent::CameraFrame { epoch, width, height, rgba } => {
                let live = self
                    .state
                    .video_session
                    .as_ref()
                    .is_some_and(|s| s.epoch == epoch);
                if live {
                    self.context.preview_tex = Some(ctx.load_texture(
                        "camera-preview",
                        egui::ColorImage::from_rgba_unmultiplied(
                            [width as usize, height as usize],
                            &rgba,
                        ),
                        egui::TextureOptions::LINEAR,
                    ));
                    self.state.push_frame(epoch, width, height, rgba);
                    ctx.request_repaint();
                }
            }
            CaptureEvent::CameraFailed { epoch, msg } => {
                self.handle_camera_failed(epoch, msg);
            }

            CaptureEvent::Finalized { job, kind, name, bytes } => {
                self.context.finalizes_in_flight =
                    self.context.finalizes_in_flight.saturating_sub(1);
                capdeck_log!("[finalize] job {job} done: {name} ({} bytes)", bytes.len());
                let label = name.clone();
                self.state.append_recorded(name, kind, bytes);
                self.state
                    .push_toast(ToastLevel::Success, format!("Saved {label}"));
                ctx.request_repaint();
            }
            CaptureEvent::FinalizeFailed { job, msg } => {
                self.context.finalizes_in_flight =
                    self.context.finalizes_in_flight.saturating_sub(1);
                capdeck_log!("[finalize] job {job} failed: {msg}");
                self.state
                    .push_toast(ToastLevel::Error, format!("Could not save recording: {msg}"));
            }

            // Playback events travel on the dedicated frame channel.
            CaptureEvent::PlaybackFrame { .. }
            | CaptureEvent::PlaybackEnded { .. }
            | CaptureEvent::PlaybackFailed { .. } => {}
        }
    }

    /// A session that has outgrown its byte ceiling is stopped and finalized
    /// as if the user had hit stop — degraded, never out-of-memory.
    fn enforce_session_budget(&mut self) {
        if self
            .state
            .audio_session
            .as_ref()
            .is_some_and(|s| s.over_budget())
        {
            self.context.mic_handle = None;
            self.state.push_toast(
                ToastLevel::Error,
                "Audio recording hit its size limit — saving what was captured",
            );
            if let Some(finished) = self.state.end_session(MediaKind::Audio) {
                self.start_finalize(finished);
            }
        }

        if self
            .state
            .video_session
            .as_ref()
            .is_some_and(|s| s.over_budget())
        {
            self.context.release_video_devices();
            self.state.push_toast(
                ToastLevel::Error,
                "Video recording hit its size limit — saving what was captured",
            );
            if let Some(finished) = self.state.end_session(MediaKind::Video) {
                self.start_finalize(finished);
            }
        }
    }

    fn handle_audio_lost(&mut self, epoch: u64, msg: String) {
        let owns_audio = self
            .state
            .audio_session
            .as_ref()
            .is_some_and(|s| s.epoch == epoch);
        if owns_audio {
            self.context.mic_handle = None;
            self.state.push_toast(
                ToastLevel::Error,
                format!("Microphone stream lost — saving what was captured: {msg}"),
            );
            if let Some(finished) = self.state.end_session(MediaKind::Audio) {
                self.start_finalize(finished);
            }
            return;
        }

        let owns_video_mic = self
            .state
            .video_session
            .as_ref()
            .is_some_and(|s| s.mic_epoch == epoch);
        if owns_video_mic {
            self.context.video_mic_handle = None;
            self.state.push_toast(
                ToastLevel::Error,
                format!("Microphone stream lost — video continues without sound: {msg}"),
            );
        } else {
            capdeck_log!("[capture] stale AudioLost (epoch {epoch}): {msg}");
        }
    }

    fn handle_camera_failed(&mut self, epoch: u64, msg: String) {
        if self.state.abort_video_pending(epoch).is_some() {
            self.context.release_video_devices();
            self.state
                .push_toast(ToastLevel::Error, format!("Could not access camera: {msg}"));
            return;
        }

        let owns_session = self
            .state
            .video_session
            .as_ref()
            .is_some_and(|s| s.epoch == epoch);
        if owns_session {
            self.context.release_video_devices();
            self.state.push_toast(
                ToastLevel::Error,
                format!("Camera failed — saving what was captured: {msg}"),
            );
            if let Some(finished) = self.state.end_session(MediaKind::Video) {
                self.start_finalize(finished);
            }
        } else {
            capdeck_log!("[capture] stale CameraFailed (epoch {epoch}): {msg}");
        }
    }

    fn handle_drag_and_drop(&mut self, ctx: &egui::Context) {
        let files = ctx.input(|i| i.raw.dropped_files.clone());
        for file in files {
            if let Some(path) = file.path {
                self.process_command(AppCommand::ImportFile(path));
            }
        }
    }
}

/// Pull whatever the capture threads have delivered up to this instant,
/// routing PCM chunks and camera frames into their sessions. Everything else
/// goes into `deferred` for the next regular event pass. Called right before
/// a session is ended so the tail of the stream lands in the recording.
fn flush_session_tail(
    state:    &mut CaptureState,
    rx:       &Receiver<CaptureEvent>,
    deferred: &mut Vec<CaptureEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            CaptureEvent::AudioChunk { epoch, pcm } => state.push_pcm(epoch, &pcm),
            CaptureEvent::CameraFrame { epoch, width, height, rgba } => {
                state.push_frame(epoch, width, height, rgba);
            }
            other => deferred.push(other),
        }
    }
}

/// Write an item's payload to a named temp file so FFmpeg can open it.
fn stage_payload(bytes: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    use std::io::Write;
    let mut file = tempfile::Builder::new()
        .prefix("capdeck-play-")
        .suffix(".mp4")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

// ── eframe::App ───────────────────────────────────────────────────────────────

impl eframe::App for CapDeckApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(
            storage,
            eframe::APP_KEY,
            &Prefs { volume: self.state.volume, muted: self.state.muted },
        );
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.context.stop_player();
        self.context.release_video_devices();
        self.context.mic_handle = None;
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_drag_and_drop(ctx);
        self.poll_capture(ctx);
        self.state.expire_toasts(Instant::now());

        egui::TopBottomPanel::top("top_panel")
            .exact_height(32.0)
            .show(ctx, |ui| {
                ui.horizontal_centered(|ui| {
                    ui.label(
                        egui::RichText::new("⏺ CapDeck")
                            .strong()
                            .size(15.0)
                            .color(crate::theme::ACCENT),
                    );
                    ui.separator();
                    ui.label(
                        egui::RichText::new("Drop media files to import")
                            .size(12.0)
                            .weak(),
                    );
                });
            });

        egui::TopBottomPanel::bottom("controls_panel")
            .exact_height(44.0)
            .show(ctx, |ui| {
                self.controls
                    .ui(ui, &self.state, &self.context, &mut self.pending_cmds);
            });

        egui::SidePanel::left("library_panel")
            .resizable(true)
            .default_width(260.0)
            .min_width(200.0)
            .show(ctx, |ui| {
                self.library
                    .ui(ui, &self.state, &self.context, &mut self.pending_cmds);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            // The live preview owns the center while a video session exists;
            // playback takes it otherwise.
            if self.state.is_recording(MediaKind::Video) {
                self.preview
                    .ui(ui, &self.state, &self.context, &mut self.pending_cmds);
            } else {
                self.player
                    .ui(ui, &self.state, &self.context, &mut self.pending_cmds);
            }
        });

        ToastsModule::show(ctx, &self.state, &mut self.pending_cmds);

        // ── Process commands emitted by modules this frame ────────────────────
        let cmds: Vec<AppCommand> = self.pending_cmds.drain(..).collect();
        for cmd in cmds {
            self.process_command(cmd);
        }

        // Keep the elapsed readout and level meter moving while capturing.
        if self.state.is_recording(MediaKind::Audio) || self.state.is_recording(MediaKind::Video) {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn stopping_flushes_the_pcm_tail_into_the_session() {
        let mut state = CaptureState::new();
        state.begin_audio(5, 48_000, 1);

        // Chunks already delivered but not yet polled when stop arrives,
        // plus a stale chunk and an unrelated event.
        let (tx, rx) = unbounded();
        tx.send(CaptureEvent::AudioChunk { epoch: 5, pcm: vec![1, 2, 3] }).unwrap();
        tx.send(CaptureEvent::AudioChunk { epoch: 4, pcm: vec![9; 8] }).unwrap();
        tx.send(CaptureEvent::PlaybackEnded { epoch: 1 }).unwrap();

        let mut deferred = Vec::new();
        flush_session_tail(&mut state, &rx, &mut deferred);

        let finished = state.end_session(MediaKind::Audio).expect("session ends");
        assert_eq!(finished.fragments.len(), 1);
        assert_eq!(finished.fragments[0].len(), 6); // 3 samples × 2 bytes
        assert_eq!(deferred.len(), 1);
    }

    #[test]
    fn flush_routes_camera_frames_too() {
        let mut state = CaptureState::new();
        state.begin_video_pending(1, 2);
        state.begin_video(1, 48_000, 1);

        let (tx, rx) = unbounded();
        tx.send(CaptureEvent::CameraFrame { epoch: 1, width: 4, height: 4, rgba: vec![0; 64] })
            .unwrap();

        let mut deferred = Vec::new();
        flush_session_tail(&mut state, &rx, &mut deferred);

        let finished = state.end_session(MediaKind::Video).expect("session ends");
        assert_eq!(finished.fragments.len(), 1);
        assert!(deferred.is_empty());
    }
}

// crates/capdeck-ui/src/context.rs
//
// AppContext owns all runtime handles that are NOT part of CaptureState.
// CapDeckApp holds one of these plus a CaptureState and the module list —
// nothing else.
//
// Sub-struct layout:
//   AppContext
//     ├── worker             — capture threads + all channel handles
//     ├── mic_handle         — live cpal stream for the audio session
//     ├── camera_handle /
//     │   video_mic_handle   — device handles for the video session
//     ├── preview_tex        — latest camera frame, GPU-resident
//     ├── audio_stream       — rodio OutputStream (must outlive all sinks)
//     └── player             — scoped playback context, None when idle

use std::time::Instant;

use eframe::egui;
use rodio::{OutputStream, Sink};
use tempfile::NamedTempFile;
use uuid::Uuid;

use capdeck_capture::{CameraHandle, CaptureWorker, InputStreamHandle};
use capdeck_core::MediaKind;

use crate::capdeck_log;

/// A video playback frame waiting for its presentation time. Held here so
/// the bounded frame channel's drain never races ahead of wall-clock time.
pub struct PendingFrame {
    pub timestamp: f64,
    pub width:     u32,
    pub height:    u32,
    pub rgba:      Vec<u8>,
}

/// Everything one playing item owns. Dropping this releases it all: the
/// rodio sink stops, the staged temp file is deleted, the texture is freed.
/// The decode thread is told to stop separately (see `AppContext::stop_player`).
pub struct PlayerContext {
    pub item_id: Uuid,
    pub kind:    MediaKind,
    pub epoch:   u64,
    pub started: Instant,

    /// Audio output for the item (the whole item for audio, the sound track
    /// for video). None when the item has no decodable audio.
    pub sink: Option<Sink>,

    /// Video-only: the payload staged to disk for the decode thread, plus
    /// the frame currently on screen and the one waiting for its PTS.
    pub staged:        Option<NamedTempFile>,
    pub frame_tex:     Option<egui::TextureHandle>,
    pub pending_frame: Option<PendingFrame>,
    /// Set when the decode thread reported EOF; playback ends once the
    /// pending frame (if any) has been shown and the sink has drained.
    pub video_done: bool,
}

// ── AppContext ────────────────────────────────────────────────────────────────

pub struct AppContext {
    pub worker: CaptureWorker,

    /// Monotonic source of device-acquisition epochs.
    next_epoch: u64,

    // ── Audio session device handle ──────────────────────────────────────────
    pub mic_handle: Option<InputStreamHandle>,

    // ── Video session device handles ─────────────────────────────────────────
    pub camera_handle:    Option<CameraHandle>,
    pub video_mic_handle: Option<InputStreamHandle>,

    /// Latest camera frame as a texture, for the live preview.
    pub preview_tex: Option<egui::TextureHandle>,

    /// Finalize jobs still running, for the "processing" indicator.
    pub finalizes_in_flight: usize,

    // ── Audio output (rodio 0.21) ────────────────────────────────────────────
    // OutputStream MUST stay alive as long as any sink exists — dropping it
    // stops all audio. Initialized lazily on the first play command; by then
    // the winit message loop is running, which WASAPI init requires in
    // GUI-subsystem (double-click) mode.
    pub audio_stream: Option<OutputStream>,

    pub player: Option<PlayerContext>,
}

impl AppContext {
    pub fn new(worker: CaptureWorker) -> Self {
        Self {
            worker,
            next_epoch:          1,
            mic_handle:          None,
            camera_handle:       None,
            video_mic_handle:    None,
            preview_tex:         None,
            finalizes_in_flight: 0,
            audio_stream:        None,
            player:              None,
        }
    }

    /// Hand out the next device-acquisition epoch. Never reused within a run.
    pub fn next_epoch(&mut self) -> u64 {
        let e = self.next_epoch;
        self.next_epoch += 1;
        e
    }

    /// Live input level of whichever mic stream is recording, if any.
    pub fn mic_level(&self) -> Option<f32> {
        self.mic_handle
            .as_ref()
            .or(self.video_mic_handle.as_ref())
            .map(|h| *h.level.lock())
    }

    /// Open the rodio output stream on first use.
    pub fn ensure_audio_stream(&mut self) -> Option<&OutputStream> {
        if self.audio_stream.is_none() {
            match rodio::OutputStreamBuilder::open_default_stream() {
                Ok(stream) => self.audio_stream = Some(stream),
                Err(e) => capdeck_log!("[audio] output stream init failed: {e}"),
            }
        }
        self.audio_stream.as_ref()
    }

    /// Release the current playback context, if any: stop the decode thread,
    /// drop the sink, delete the staged file. Safe to call when idle.
    pub fn stop_player(&mut self) {
        if let Some(player) = self.player.take() {
            if player.kind == MediaKind::Video {
                self.worker.stop_playback();
            }
            // sink + staged file + textures drop here
        }
    }

    /// Drop both video-session device handles and the preview texture.
    /// Handles' Drop impls stop the underlying streams.
    pub fn release_video_devices(&mut self) {
        self.camera_handle = None;
        self.video_mic_handle = None;
        self.preview_tex = None;
    }
}

// crates/capdeck-core/src/media_types.rs
//
// Types that flow across the channel between capdeck-capture and capdeck-ui.
// No egui, no ffmpeg — just plain data.

use uuid::Uuid;

use crate::state::MediaKind;

/// Events sent from the capture/playback background threads to the UI.
///
/// `epoch` identifies the device acquisition that produced the event; the
/// receiving side drops anything whose epoch no longer matches the live
/// session or playback context.
pub enum CaptureEvent {
    // ── Microphone ───────────────────────────────────────────────────────────
    /// One interleaved PCM chunk from a live input stream.
    AudioChunk  { epoch: u64, pcm: Vec<i16> },
    /// The stream's error callback fired; the stream is dead.
    AudioLost   { epoch: u64, msg: String },

    // ── Camera ───────────────────────────────────────────────────────────────
    /// The camera opened and is about to deliver frames.
    CameraReady { epoch: u64, width: u32, height: u32 },
    CameraFrame { epoch: u64, width: u32, height: u32, rgba: Vec<u8> },
    /// Open failed or the grab loop died.
    CameraFailed { epoch: u64, msg: String },

    // ── Finalize jobs ────────────────────────────────────────────────────────
    Finalized      { job: Uuid, kind: MediaKind, name: String, bytes: Vec<u8> },
    FinalizeFailed { job: Uuid, msg: String },

    // ── Video playback ───────────────────────────────────────────────────────
    PlaybackFrame  { epoch: u64, timestamp: f64, width: u32, height: u32, rgba: Vec<u8> },
    PlaybackEnded  { epoch: u64 },
    PlaybackFailed { epoch: u64, msg: String },
}

// crates/capdeck-core/src/commands.rs
//
// Every user action in CapDeck is expressed as an AppCommand.
// Modules emit these; app.rs processes them after the UI pass.
// Adding a new feature = add a variant here + one match arm in app.rs.

use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum AppCommand {
    // ── Capture ──────────────────────────────────────────────────────────────
    StartAudioRecording,
    StopAudioRecording,
    StartVideoRecording,
    StopVideoRecording,

    // ── Library ──────────────────────────────────────────────────────────────
    /// Read the file at `path` and append it as an uploaded item.
    ImportFile(PathBuf),
    SelectItem(Option<Uuid>),

    // ── Playback ─────────────────────────────────────────────────────────────
    /// Open a playback context for the item. Supersedes (and releases) any
    /// context that is already open.
    PlayItem(Uuid),
    StopPlayback,
    SetVolume(f32),
    ToggleMute,

    // ── Notifications ────────────────────────────────────────────────────────
    DismissToast(u64),
}

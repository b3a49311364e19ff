// crates/capdeck-core/src/state.rs
// Pure application data — no egui, no ffmpeg, no device handles.
// Used by both capdeck-ui and capdeck-capture consumers.
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::session::{PendingVideo, RecordingSession};
use crate::toast::{Toast, ToastLevel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Container extension used for finalized recordings of this kind.
    pub fn recording_ext(self) -> &'static str {
        match self {
            MediaKind::Audio => "wav",
            MediaKind::Video => "mp4",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    Uploaded,
    Recorded,
}

/// One playable unit in the library.
/// The payload is created exactly once (on import or on session finalize)
/// and never mutated afterward — Arc so handing bytes to a playback context
/// is a refcount bump, not a copy.
#[derive(Clone, Debug)]
pub struct MediaItem {
    pub id:         Uuid,
    pub name:       String,
    pub kind:       MediaKind,
    pub provenance: Provenance,
    pub bytes:      Arc<Vec<u8>>,
}

impl MediaItem {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ── CaptureState ──────────────────────────────────────────────────────────────

/// Central application state. Mutated only by app.rs command processing and
/// capture-event routing; panel modules read it and emit commands.
#[derive(Debug, Default)]
pub struct CaptureState {
    /// Insertion-ordered, append-only. No uniqueness constraint on names.
    pub library:       Vec<MediaItem>,

    /// At most one active session per kind; the two are independent.
    pub audio_session: Option<RecordingSession>,
    pub video_session: Option<RecordingSession>,
    /// Camera open in flight — start requests for video are ignored while set.
    pub video_pending: Option<PendingVideo>,

    pub selected_item: Option<Uuid>,
    /// Item currently bound to the playback context, if any.
    pub now_playing:   Option<Uuid>,

    pub toasts:        Vec<Toast>,
    next_toast_id:     u64,

    // Playback transport (persisted as UI prefs, not part of the library).
    pub volume:        f32,
    pub muted:         bool,
}

impl CaptureState {
    pub fn new() -> Self {
        Self {
            volume: 1.0,
            ..Default::default()
        }
    }

    pub fn item(&self, id: Uuid) -> Option<&MediaItem> {
        self.library.iter().find(|i| i.id == id)
    }

    /// Wrap a user-selected file as an uploaded item and append it.
    /// Kind is inferred from the extension the same way imports are classified
    /// everywhere else: known audio extensions → Audio, everything else Video.
    pub fn import_file(&mut self, path: &Path, bytes: Vec<u8>) -> Uuid {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let ext = path
            .extension()
            .unwrap_or_default()
            .to_string_lossy()
            .to_lowercase();

        let is_audio = matches!(ext.as_str(), "mp3" | "wav" | "aac" | "flac" | "ogg" | "m4a");

        self.append_item(
            name,
            if is_audio { MediaKind::Audio } else { MediaKind::Video },
            Provenance::Uploaded,
            bytes,
        )
    }

    /// Append a finalized recording. Invoked by the finalize-event handler.
    pub fn append_recorded(&mut self, name: String, kind: MediaKind, bytes: Vec<u8>) -> Uuid {
        self.append_item(name, kind, Provenance::Recorded, bytes)
    }

    fn append_item(
        &mut self,
        name:       String,
        kind:       MediaKind,
        provenance: Provenance,
        bytes:      Vec<u8>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.library.push(MediaItem {
            id,
            name,
            kind,
            provenance,
            bytes: Arc::new(bytes),
        });
        id
    }

    pub fn push_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        let id = self.next_toast_id;
        self.next_toast_id += 1;
        self.toasts.push(Toast::new(id, level, message.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn import_appends_one_item_with_file_name() {
        let mut state = CaptureState::new();
        state.import_file(&PathBuf::from("/music/clip.mp3"), vec![1, 2, 3]);

        assert_eq!(state.library.len(), 1);
        let item = &state.library[0];
        assert_eq!(item.name, "clip.mp3");
        assert_eq!(item.kind, MediaKind::Audio);
        assert_eq!(item.provenance, Provenance::Uploaded);
        assert_eq!(item.len(), 3);
    }

    #[test]
    fn unknown_extension_classifies_as_video() {
        let mut state = CaptureState::new();
        state.import_file(&PathBuf::from("holiday.mov"), vec![0]);
        assert_eq!(state.library[0].kind, MediaKind::Video);
    }

    #[test]
    fn library_preserves_insertion_order() {
        let mut state = CaptureState::new();
        state.import_file(&PathBuf::from("a.mp3"), vec![]);
        state.append_recorded("recording-1.wav".into(), MediaKind::Audio, vec![1]);
        state.import_file(&PathBuf::from("b.mp4"), vec![]);

        let names: Vec<_> = state.library.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["a.mp3", "recording-1.wav", "b.mp4"]);
    }

    #[test]
    fn duplicate_names_are_allowed() {
        let mut state = CaptureState::new();
        let first  = state.import_file(&PathBuf::from("clip.mp3"), vec![]);
        let second = state.import_file(&PathBuf::from("clip.mp3"), vec![]);
        assert_ne!(first, second);
        assert_eq!(state.library.len(), 2);
    }

    #[test]
    fn payload_is_shared_not_copied() {
        let mut state = CaptureState::new();
        let id = state.append_recorded("r.wav".into(), MediaKind::Audio, vec![9; 64]);
        let item = state.item(id).unwrap();
        let handle = item.bytes.clone();
        assert!(Arc::ptr_eq(&handle, &item.bytes));
    }
}

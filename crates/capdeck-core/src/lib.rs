// crates/capdeck-core/src/lib.rs
//
// Pure state for CapDeck: the recording-session state machine, the
// append-only media library, toasts, commands, and the event types shared
// with capdeck-capture. Nothing here touches a device or a GUI.

pub mod commands;
pub mod media_types;
pub mod session;
pub mod state;
pub mod toast;

pub use commands::AppCommand;
pub use media_types::CaptureEvent;
pub use session::{timestamp_name, FinishedSession, RecordingSession};
pub use state::{CaptureState, MediaItem, MediaKind, Provenance};
pub use toast::{Toast, ToastLevel};

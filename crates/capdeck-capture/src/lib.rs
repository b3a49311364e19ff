// crates/capdeck-capture/src/lib.rs
//
// Device capture and codecs for CapDeck: microphone input (cpal), webcam
// grab threads (nokhwa), session finalization to WAV/MP4 (hound + FFmpeg),
// and the video playback decode pipeline. The UI talks to all of it through
// CaptureWorker and receives CaptureEvents back.

pub mod audio;
pub mod camera;
pub mod encode;
pub mod error;
pub mod playback;
pub mod worker;

pub use audio::InputStreamHandle;
pub use camera::CameraHandle;
pub use error::{CaptureError, CaptureResult};
pub use playback::PlaybackCmd;
pub use worker::CaptureWorker;

// crates/capdeck-capture/src/worker.rs
//
// CaptureWorker: owns the event channel, the playback decode thread, and the
// finalize thread spawns. All public API that capdeck-ui calls lives here.

use std::sync::Once;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use uuid::Uuid;

use capdeck_core::media_types::CaptureEvent;
use capdeck_core::session::{timestamp_name, FinishedSession};

use crate::audio::{start_input_stream, InputStreamHandle};
use crate::camera::{spawn_camera, CameraHandle};
use crate::encode::finalize_session;
use crate::error::CaptureResult;
use crate::playback::{run_playback_loop, PlaybackCmd};

static FFMPEG_INIT: Once = Once::new();

/// Register FFmpeg codecs and muxers. Safe to call from any thread, any
/// number of times.
pub fn ensure_ffmpeg() {
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_the_third::init() {
            eprintln!("[capture] ffmpeg init failed: {e}");
        }
    });
}

pub struct CaptureWorker {
    /// Shared event channel: mic chunks, camera frames, finalize results.
    /// Drained by the UI every repaint. Unbounded — device callbacks must
    /// never block on a slow UI frame.
    pub rx: Receiver<CaptureEvent>,
    tx:     Sender<CaptureEvent>,

    /// Dedicated channel for playback frames and end/fail notices. Bounded —
    /// a full channel stalls the decode thread, which is exactly the pacing
    /// playback needs. Capacity 32 gives about a second of lookahead at 30 fps.
    pub playback_rx: Receiver<CaptureEvent>,
    pb_tx:           Sender<PlaybackCmd>,
}

impl CaptureWorker {
    pub fn new() -> Self {
        ensure_ffmpeg();

        let (tx, rx) = unbounded();
        let (pb_frame_tx, playback_rx) = bounded(32);
        let (pb_tx, pb_cmd_rx) = bounded::<PlaybackCmd>(4);

        thread::spawn(move || run_playback_loop(pb_cmd_rx, pb_frame_tx));

        Self { rx, tx, playback_rx, pb_tx }
    }

    /// Acquire the default microphone under `epoch`. The returned handle owns
    /// the stream; drop it to stop. Fails synchronously on device problems.
    pub fn start_microphone(&self, epoch: u64) -> CaptureResult<InputStreamHandle> {
        start_input_stream(epoch, self.tx.clone())
    }

    /// Start the camera grab thread under `epoch`. Open failures come back
    /// asynchronously as `CameraFailed` events.
    pub fn start_camera(&self, epoch: u64) -> CameraHandle {
        spawn_camera(epoch, self.tx.clone())
    }

    /// Encode a finished session on a background thread. The result lands on
    /// the shared channel as `Finalized { job }` or `FinalizeFailed { job }`.
    pub fn finalize(&self, job: Uuid, finished: FinishedSession) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            let kind = finished.kind;
            match finalize_session(&finished) {
                Ok(bytes) => {
                    let _ = tx.send(CaptureEvent::Finalized {
                        job,
                        kind,
                        name: timestamp_name(kind),
                        bytes,
                    });
                }
                Err(e) => {
                    let _ = tx.send(CaptureEvent::FinalizeFailed {
                        job,
                        msg: e.to_string(),
                    });
                }
            }
        });
    }

    /// Start video playback of the file at `path` under `epoch`.
    ///
    /// The command channel is small but the decode loop polls it even while
    /// streaming, so a blocking send only waits for the thread to catch up —
    /// it never drops the command the way `try_send` on a full channel would.
    pub fn start_playback(&self, epoch: u64, path: std::path::PathBuf) {
        // Flush frames left over from the previous playback session.
        while self.playback_rx.try_recv().is_ok() {}
        let _ = self.pb_tx.send(PlaybackCmd::Start { epoch, path });
    }

    /// Stop the playback decode thread's current file.
    pub fn stop_playback(&self) {
        let _ = self.pb_tx.send(PlaybackCmd::Stop);
    }
}

impl Default for CaptureWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn playback_commands_survive_a_command_burst() {
        let worker = CaptureWorker::new();

        // More stops than the command channel holds; none may be dropped,
        // and the start behind them must still reach the decode thread.
        for _ in 0..16 {
            worker.stop_playback();
        }
        worker.start_playback(7, PathBuf::from("definitely-missing.mp4"));

        let event = worker
            .playback_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("start command reached the decode thread");
        match event {
            CaptureEvent::PlaybackFailed { epoch, .. } => assert_eq!(epoch, 7),
            _ => panic!("expected a playback failure for a missing file"),
        }
    }
}

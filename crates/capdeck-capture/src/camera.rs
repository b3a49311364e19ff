// crates/capdeck-capture/src/camera.rs
//
// Webcam capture via nokhwa. Opening a camera can take seconds (or hang on
// a permission prompt), so everything runs on a dedicated grab thread:
// open → CameraReady → frames until the stop flag is set → stop_stream.
// The UI treats the session as pending until CameraReady arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use capdeck_core::media_types::CaptureEvent;

/// Capture format requested from the device. 640×480 keeps the in-memory
/// fragment list and the encode cheap; nokhwa picks the closest match the
/// hardware actually supports.
const REQUESTED_WIDTH:  u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const REQUESTED_FPS:    u32 = 30;

/// Owns a running grab thread. Dropping the handle raises the stop flag;
/// the thread notices on its next frame and shuts the stream down.
pub struct CameraHandle {
    stop:      Arc<AtomicBool>,
    pub epoch: u64,
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Spawn the grab thread for the default camera. Never fails synchronously —
/// open errors come back as `CameraFailed { epoch }` on the event channel.
pub fn spawn_camera(epoch: u64, tx: Sender<CaptureEvent>) -> CameraHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    thread::spawn(move || {
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
            CameraFormat::new_from(
                REQUESTED_WIDTH,
                REQUESTED_HEIGHT,
                FrameFormat::MJPEG,
                REQUESTED_FPS,
            ),
        ));

        let mut camera = match Camera::new(CameraIndex::Index(0), requested) {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(CaptureEvent::CameraFailed {
                    epoch,
                    msg: format!("could not open camera: {e}"),
                });
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            let _ = tx.send(CaptureEvent::CameraFailed {
                epoch,
                msg: format!("could not start camera stream: {e}"),
            });
            return;
        }

        let resolution = camera.resolution();
        if tx
            .send(CaptureEvent::CameraReady {
                epoch,
                width:  resolution.width(),
                height: resolution.height(),
            })
            .is_err()
        {
            let _ = camera.stop_stream();
            return;
        }

        // frame() blocks until the device delivers, so the loop runs at the
        // camera's native rate without explicit pacing.
        while !flag.load(Ordering::Relaxed) {
            let frame = match camera.frame() {
                Ok(f) => f,
                Err(e) => {
                    let _ = tx.send(CaptureEvent::CameraFailed {
                        epoch,
                        msg: format!("camera frame error: {e}"),
                    });
                    break;
                }
            };

            let rgba = match frame.decode_image::<RgbAFormat>() {
                Ok(img) => img,
                Err(e) => {
                    let _ = tx.send(CaptureEvent::CameraFailed {
                        epoch,
                        msg: format!("frame decode error: {e}"),
                    });
                    break;
                }
            };

            let (width, height) = rgba.dimensions();
            if tx
                .send(CaptureEvent::CameraFrame {
                    epoch,
                    width,
                    height,
                    rgba: rgba.into_raw(),
                })
                .is_err()
            {
                break; // UI is gone
            }
        }

        let _ = camera.stop_stream();
    });

    CameraHandle { stop, epoch }
}

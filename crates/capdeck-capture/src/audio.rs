// crates/capdeck-capture/src/audio.rs
//
// Microphone capture via cpal. One stream per acquisition; the stream's
// callback converts to interleaved i16 and sends chunks over the shared
// event channel tagged with the acquisition epoch. Drop the handle to stop.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use parking_lot::Mutex;

use capdeck_core::media_types::CaptureEvent;

use crate::error::{CaptureError, CaptureResult};

/// Owns a live cpal input stream. The stream stops when this is dropped.
/// Lives on the UI thread (cpal streams are not Send on every platform).
pub struct InputStreamHandle {
    // Held for its Drop impl only.
    _stream:         cpal::Stream,
    pub epoch:       u64,
    pub sample_rate: u32,
    pub channels:    u16,
    /// RMS of the most recent callback buffer, for the live level meter.
    pub level:       Arc<Mutex<f32>>,
}

/// Open the default input device and start delivering PCM chunks.
///
/// Fails synchronously on missing device or config/stream errors — the
/// caller surfaces that as a toast and leaves session state unchanged.
/// Errors after the stream is live arrive as `AudioLost` events.
pub fn start_input_stream(
    epoch: u64,
    tx:    Sender<CaptureEvent>,
) -> CaptureResult<InputStreamHandle> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceAccess(e.to_string()))?;

    let sample_rate = supported.sample_rate().0;
    let channels    = supported.channels();
    let config      = supported.config();

    let level = Arc::new(Mutex::new(0.0f32));

    let err_tx = tx.clone();
    let err_fn = move |err: cpal::StreamError| {
        let _ = err_tx.send(CaptureEvent::AudioLost {
            epoch,
            msg: err.to_string(),
        });
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => {
            let meter = Arc::clone(&level);
            device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        *meter.lock() = rms_f32(data);
                        let pcm: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let _ = tx.send(CaptureEvent::AudioChunk { epoch, pcm });
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| CaptureError::Stream(e.to_string()))?
        }
        cpal::SampleFormat::I16 => {
            let meter = Arc::clone(&level);
            device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        *meter.lock() = rms_i16(data);
                        let _ = tx.send(CaptureEvent::AudioChunk {
                            epoch,
                            pcm: data.to_vec(),
                        });
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| CaptureError::Stream(e.to_string()))?
        }
        other => {
            return Err(CaptureError::Stream(format!(
                "unsupported input sample format: {other:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    Ok(InputStreamHandle {
        _stream: stream,
        epoch,
        sample_rate,
        channels,
        level,
    })
}

fn rms_f32(data: &[f32]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = data.iter().map(|&s| s * s).sum();
    (sum_sq / data.len() as f32).sqrt()
}

fn rms_i16(data: &[i16]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = data
        .iter()
        .map(|&s| {
            let f = s as f64 / i16::MAX as f64;
            f * f
        })
        .sum();
    ((sum_sq / data.len() as f64) as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms_f32(&[0.0; 512]), 0.0);
        assert_eq!(rms_i16(&[0; 512]), 0.0);
        assert_eq!(rms_f32(&[]), 0.0);
    }

    #[test]
    fn rms_of_full_scale_square_wave_is_one() {
        let wave: Vec<f32> = (0..512).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms_f32(&wave) - 1.0).abs() < 1e-6);
    }
}

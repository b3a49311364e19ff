// crates/capdeck-capture/src/encode.rs
//
// Session finalization: turn a FinishedSession's fragments into a single
// immutable payload.
//
//   Audio sessions — interleaved i16 PCM → WAV bytes (hound, no transcode).
//   Video sessions — RGBA frames + mic PCM → H.264/AAC MP4. The mux goes
//     through a named temp file (FFmpeg wants a seekable target for the MP4
//     trailer); the bytes are read back and the file is deleted on drop.
//
// Stream layout in the MP4:
//   Stream 0 — H.264 video (YUV420P, CRF 18, preset fast)
//   Stream 1 — AAC audio at the capture sample rate, stereo FLTP
//              (omitted entirely when the session captured no mic audio)
//
// PTS strategy: video PTS is the frame index in 1/fps; audio PTS is the
// sample index in 1/sample_rate. Both start at zero.
//
// A session that delivered zero fragments finalizes to an empty payload —
// that is the defined behavior, not an error.

use std::io::Cursor;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::output as open_output;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::{Pixel, Sample};
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use capdeck_core::session::FinishedSession;
use capdeck_core::state::MediaKind;

use crate::error::{CaptureError, CaptureResult};
use crate::worker::ensure_ffmpeg;

/// Encode a finished session into its payload bytes. Blocking — run on a
/// finalize thread, not the UI thread.
pub fn finalize_session(finished: &FinishedSession) -> CaptureResult<Vec<u8>> {
    match finished.kind {
        MediaKind::Audio => {
            encode_wav(&finished.fragments, finished.sample_rate, finished.channels)
        }
        MediaKind::Video => encode_mp4(finished),
    }
}

// ── Audio → WAV ───────────────────────────────────────────────────────────────

/// Concatenate PCM fragments into 16-bit WAV bytes.
fn encode_wav(fragments: &[Vec<u8>], sample_rate: u32, channels: u16) -> CaptureResult<Vec<u8>> {
    if fragments.is_empty() {
        return Ok(Vec::new());
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    for fragment in fragments {
        for pair in fragment.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| CaptureError::Encode(e.to_string()))?;
        }
    }

    writer
        .finalize()
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    Ok(cursor.into_inner())
}

// ── Video → MP4 ───────────────────────────────────────────────────────────────

fn encode_mp4(finished: &FinishedSession) -> CaptureResult<Vec<u8>> {
    if finished.fragments.is_empty() {
        return Ok(Vec::new());
    }
    ensure_ffmpeg();

    let (width, height) = finished
        .frame_size
        .ok_or_else(|| CaptureError::Encode("video session has frames but no size".into()))?;

    // Effective frame rate: frames delivered over wall-clock session length.
    let elapsed = finished.elapsed.as_secs_f64().max(0.001);
    let fps = ((finished.fragments.len() as f64 / elapsed).round() as u32).clamp(1, 60);

    let tmp = tempfile::Builder::new()
        .prefix("capdeck-")
        .suffix(".mp4")
        .tempfile()?;

    run_mux(finished, width, height, fps, tmp.path())
        .map_err(CaptureError::Encode)?;

    Ok(std::fs::read(tmp.path())?)
}

/// Stereo FLTP (float planar) sample buffer feeding the AAC encoder.
///
/// AAC wants exactly `encoder.frame_size()` samples per input frame; mic
/// chunks arrive in arbitrary sizes, so everything is accumulated here and
/// popped frame-by-frame. Mono capture is duplicated to both channels.
struct AudioFifo {
    left:  Vec<f32>,
    right: Vec<f32>,
    rate:  u32,
}

impl AudioFifo {
    fn from_interleaved(samples: &[i16], channels: u16, rate: u32) -> Self {
        let ch = channels.max(1) as usize;
        let frames = samples.len() / ch;
        let mut left  = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for frame in samples.chunks_exact(ch) {
            let l = frame[0] as f32 / i16::MAX as f32;
            let r = if ch >= 2 {
                frame[1] as f32 / i16::MAX as f32
            } else {
                l
            };
            left.push(l);
            right.push(r);
        }
        Self { left, right, rate }
    }

    fn len(&self) -> usize {
        self.left.len()
    }

    /// Pop one encoder-sized frame from the front, zero-padding the tail on
    /// the final partial frame. PTS is `sample_idx` in 1/rate.
    fn pop_frame(&mut self, n: usize, sample_idx: i64) -> AudioFrame {
        let available = self.left.len().min(n);

        let mut frame = AudioFrame::new(
            Sample::F32(SampleType::Planar),
            n,
            ChannelLayoutMask::STEREO,
        );
        frame.set_rate(self.rate);
        frame.set_pts(Some(sample_idx));

        unsafe {
            let ldata = frame.data_mut(0);
            let ldst  = std::slice::from_raw_parts_mut(ldata.as_mut_ptr() as *mut f32, n);
            ldst[..available].copy_from_slice(&self.left[..available]);
            if available < n {
                ldst[available..].fill(0.0);
            }

            let rdata = frame.data_mut(1);
            let rdst  = std::slice::from_raw_parts_mut(rdata.as_mut_ptr() as *mut f32, n);
            rdst[..available].copy_from_slice(&self.right[..available]);
            if available < n {
                rdst[available..].fill(0.0);
            }
        }

        self.left.drain(..available);
        self.right.drain(..available);

        frame
    }
}

fn run_mux(
    finished: &FinishedSession,
    width:    u32,
    height:   u32,
    fps:      u32,
    output:   &std::path::Path,
) -> Result<(), String> {
    // YUV420P requires even dimensions.
    let out_w = (width & !1).max(2);
    let out_h = (height & !1).max(2);

    let has_audio  = !finished.mic_samples.is_empty();
    let audio_rate = finished.sample_rate.max(8_000);

    let mut octx = open_output(&output)
        .map_err(|e| format!("could not open output '{}': {e}", output.display()))?;

    // ── Video encoder (stream 0) ──────────────────────────────────────────────
    // Codec context is created independently of the output stream — Stream
    // does not expose a .codec() accessor in this version of ffmpeg-the-third.
    let frame_tb = Rational::new(1, fps as i32);

    let h264 = encoder::find(CodecId::H264)
        .ok_or_else(|| "H.264 encoder not found — is libx264 available?".to_string())?;

    let mut ost_video = octx.add_stream(h264)
        .map_err(|e| format!("add video stream: {e}"))?;
    ost_video.set_time_base(frame_tb);

    let video_enc_ctx = codec::context::Context::new_with_codec(h264);
    let mut video_enc = video_enc_ctx.encoder().video()
        .map_err(|e| format!("create video encoder context: {e}"))?;

    video_enc.set_width(out_w);
    video_enc.set_height(out_h);
    video_enc.set_format(Pixel::YUV420P);
    video_enc.set_time_base(frame_tb);
    video_enc.set_frame_rate(Some(Rational::new(fps as i32, 1)));
    video_enc.set_bit_rate(0); // CRF controls quality; bit_rate 0 signals VBR

    let mut opts = ffmpeg::Dictionary::new();
    opts.set("crf", "18");
    opts.set("preset", "fast");

    let mut video_encoder = video_enc.open_as_with(h264, opts)
        .map_err(|e| format!("open H.264 encoder: {e}"))?;

    video_encoder.set_aspect_ratio(Rational::new(1, 1));

    // Copy encoder params into the stream's codecpar so the muxer has
    // resolution, format, and codec-private data. set_parameters() requires
    // AsPtr<AVCodecParameters>, which encoder::Video does not implement, so
    // this goes through FFI.
    unsafe {
        let ret = ffmpeg::ffi::avcodec_parameters_from_context(
            (**(*octx.as_mut_ptr()).streams.add(0)).codecpar,
            video_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
        );
        if ret < 0 {
            return Err(format!("avcodec_parameters_from_context (video) failed: {ret}"));
        }
    }

    // ── Audio encoder (stream 1, only when the mic delivered samples) ─────────
    let audio_tb = Rational::new(1, audio_rate as i32);
    let mut audio_encoder = None;

    if has_audio {
        let aac = encoder::find(CodecId::AAC)
            .ok_or_else(|| "AAC encoder not found".to_string())?;

        let mut ost_audio = octx.add_stream(aac)
            .map_err(|e| format!("add audio stream: {e}"))?;
        ost_audio.set_time_base(audio_tb);

        let audio_enc_ctx = codec::context::Context::new_with_codec(aac);
        let mut audio_enc = audio_enc_ctx.encoder().audio()
            .map_err(|e| format!("create audio encoder context: {e}"))?;

        audio_enc.set_rate(audio_rate as i32);
        audio_enc.set_ch_layout(ChannelLayout::STEREO);
        audio_enc.set_format(Sample::F32(SampleType::Planar));
        audio_enc.set_bit_rate(128_000);

        let enc = audio_enc.open_as_with(aac, ffmpeg::Dictionary::new())
            .map_err(|e| format!("open AAC encoder: {e}"))?;

        unsafe {
            let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                (**(*octx.as_mut_ptr()).streams.add(1)).codecpar,
                enc.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
            );
            if ret < 0 {
                return Err(format!("avcodec_parameters_from_context (audio) failed: {ret}"));
            }
        }

        audio_encoder = Some(enc);
    }

    octx.write_header()
        .map_err(|e| format!("write output header: {e}"))?;

    let ost_video_tb = octx.stream(0).unwrap().time_base();

    // ── Video frames ──────────────────────────────────────────────────────────
    let mut scaler = ScaleCtx::get(
        Pixel::RGBA, width, height,
        Pixel::YUV420P, out_w, out_h,
        ScaleFlags::BILINEAR,
    )
    .map_err(|e| format!("create scaler: {e}"))?;

    let row_bytes = width as usize * 4;

    for (idx, rgba) in finished.fragments.iter().enumerate() {
        if rgba.len() < row_bytes * height as usize {
            return Err(format!("frame {idx} is truncated"));
        }

        let mut src = VideoFrame::new(Pixel::RGBA, width, height);
        let stride = src.stride(0);
        {
            let data = src.data_mut(0);
            for row in 0..height as usize {
                let s = row * row_bytes;
                let d = row * stride;
                data[d..d + row_bytes].copy_from_slice(&rgba[s..s + row_bytes]);
            }
        }

        let mut yuv = VideoFrame::empty();
        scaler.run(&src, &mut yuv).map_err(|e| format!("scale frame {idx}: {e}"))?;
        yuv.set_pts(Some(idx as i64));

        video_encoder.send_frame(&yuv)
            .map_err(|e| format!("send video frame: {e}"))?;
        write_video_packets(&mut video_encoder, &mut octx, frame_tb, ost_video_tb)?;
    }

    video_encoder.send_eof()
        .map_err(|e| format!("send EOF to video encoder: {e}"))?;
    write_video_packets(&mut video_encoder, &mut octx, frame_tb, ost_video_tb)?;

    // ── Audio track ───────────────────────────────────────────────────────────
    if let Some(mut enc) = audio_encoder {
        let ost_audio_tb = octx.stream(1).unwrap().time_base();
        let frame_size = (enc.frame_size() as usize).max(1024);

        let mut fifo = AudioFifo::from_interleaved(
            &finished.mic_samples,
            finished.channels,
            audio_rate,
        );

        let mut sample_idx: i64 = 0;
        while fifo.len() > 0 {
            let frame = fifo.pop_frame(frame_size, sample_idx);
            sample_idx += frame_size as i64;
            enc.send_frame(&frame)
                .map_err(|e| format!("send audio frame: {e}"))?;
            write_audio_packets(&mut enc, &mut octx, audio_tb, ost_audio_tb)?;
        }

        enc.send_eof()
            .map_err(|e| format!("send EOF to audio encoder: {e}"))?;
        write_audio_packets(&mut enc, &mut octx, audio_tb, ost_audio_tb)?;
    }

    octx.write_trailer()
        .map_err(|e| format!("write trailer: {e}"))?;

    Ok(())
}

fn write_video_packets(
    enc:  &mut encoder::Video,
    octx: &mut ffmpeg::format::context::Output,
    from: Rational,
    to:   Rational,
) -> Result<(), String> {
    let mut pkt = Packet::empty();
    while enc.receive_packet(&mut pkt).is_ok() {
        pkt.set_stream(0);
        pkt.rescale_ts(from, to);
        pkt.write_interleaved(octx)
            .map_err(|e| format!("write video packet: {e}"))?;
    }
    Ok(())
}

fn write_audio_packets(
    enc:  &mut encoder::Audio,
    octx: &mut ffmpeg::format::context::Output,
    from: Rational,
    to:   Rational,
) -> Result<(), String> {
    let mut pkt = Packet::empty();
    while enc.receive_packet(&mut pkt).is_ok() {
        pkt.set_stream(1);
        pkt.rescale_ts(from, to);
        pkt.write_interleaved(octx)
            .map_err(|e| format!("write audio packet: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn finished_audio(fragments: Vec<Vec<u8>>) -> FinishedSession {
        FinishedSession {
            kind:        MediaKind::Audio,
            fragments,
            sample_rate: 48_000,
            channels:    1,
            frame_size:  None,
            mic_samples: Vec::new(),
            elapsed:     Duration::from_secs(1),
        }
    }

    #[test]
    fn zero_fragments_finalize_to_empty_payload() {
        let bytes = finalize_session(&finished_audio(Vec::new())).unwrap();
        assert!(bytes.is_empty());

        let video = FinishedSession {
            kind:        MediaKind::Video,
            fragments:   Vec::new(),
            sample_rate: 48_000,
            channels:    1,
            frame_size:  None,
            mic_samples: Vec::new(),
            elapsed:     Duration::from_secs(1),
        };
        assert!(finalize_session(&video).unwrap().is_empty());
    }

    #[test]
    fn audio_fragments_become_a_riff_wav() {
        let fragment: Vec<u8> = (0i16..480)
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let bytes = finalize_session(&finished_audio(vec![fragment])).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        // 44-byte canonical header + 480 samples × 2 bytes.
        assert_eq!(bytes.len(), 44 + 960);
    }

    #[test]
    fn wav_concatenates_fragments_in_order() {
        let a: Vec<u8> = 100i16.to_le_bytes().to_vec();
        let b: Vec<u8> = 200i16.to_le_bytes().to_vec();
        let bytes = finalize_session(&finished_audio(vec![a, b])).unwrap();

        let data = &bytes[44..];
        assert_eq!(i16::from_le_bytes([data[0], data[1]]), 100);
        assert_eq!(i16::from_le_bytes([data[2], data[3]]), 200);
    }

    #[test]
    fn fifo_duplicates_mono_and_pads_the_tail() {
        let mut fifo = AudioFifo::from_interleaved(&[i16::MAX, 0, i16::MIN], 1, 48_000);
        assert_eq!(fifo.len(), 3);

        let frame = fifo.pop_frame(4, 0);
        assert_eq!(fifo.len(), 0);
        assert_eq!(frame.samples(), 4);
        assert_eq!(frame.pts(), Some(0));
    }
}

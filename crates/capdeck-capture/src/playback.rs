// crates/capdeck-capture/src/playback.rs
//
// Video playback: one long-lived decode thread fed by commands. A Start
// opens the staged file and streams RGBA frames to the UI over a bounded
// channel — the full channel is the pacing mechanism, the UI drains frames
// only as their presentation time arrives. Stop (or a superseding Start)
// abandons the current file mid-stream.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};

use capdeck_core::media_types::CaptureEvent;

/// Frames wider than this are scaled down before crossing the channel.
const MAX_PLAYBACK_WIDTH: u32 = 640;

#[derive(Debug)]
pub enum PlaybackCmd {
    Start { epoch: u64, path: PathBuf },
    Stop,
}

// ── Sequential reader ─────────────────────────────────────────────────────────

/// Stateful decoder over one file: open once, then pull frames in stream
/// order. No seeking — playback always starts at zero.
struct VideoReader {
    ictx:      ffmpeg::format::context::Input,
    decoder:   ffmpeg::decoder::video::Video,
    video_idx: usize,
    last_pts:  i64,
    tb_num:    i32,
    tb_den:    i32,
    out_w:     u32,
    out_h:     u32,
    scaler:    SwsContext,
}

impl VideoReader {
    fn open(path: &PathBuf) -> Result<Self> {
        let ictx = input(path)?;
        let video_idx = ictx
            .streams()
            .best(Type::Video)
            .ok_or_else(|| anyhow!("no video stream"))?
            .index();

        let (tb_num, tb_den) = {
            let stream = ictx.stream(video_idx).unwrap();
            let tb = stream.time_base();
            (tb.numerator(), tb.denominator())
        };

        // Second context for decoder params (Parameters borrows from ictx).
        let ictx2   = input(path)?;
        let stream2 = ictx2.stream(video_idx).unwrap();
        let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream2.parameters())?;
        let decoder = dec_ctx.decoder().video()?;

        let (raw_w, raw_h) = (decoder.width().max(2), decoder.height().max(2));
        let (out_w, out_h) = if raw_w <= MAX_PLAYBACK_WIDTH {
            ((raw_w & !1).max(2), (raw_h & !1).max(2))
        } else {
            let w = MAX_PLAYBACK_WIDTH;
            let h = ((raw_h as f32 * w as f32 / raw_w as f32) as u32).max(2) & !1;
            (w, h)
        };

        let scaler = SwsContext::get(
            decoder.format(), decoder.width(), decoder.height(),
            Pixel::RGBA, out_w, out_h, Flags::BILINEAR,
        )?;

        Ok(Self {
            ictx, decoder, video_idx,
            last_pts: 0, tb_num, tb_den, out_w, out_h, scaler,
        })
    }

    fn pts_to_secs(&self, pts: i64) -> f64 {
        pts as f64 * self.tb_num as f64 / self.tb_den as f64
    }

    /// Decode the next frame in stream order. `(rgba, w, h, ts_secs)`, or
    /// None at EOF.
    fn next_frame(&mut self) -> Option<(Vec<u8>, u32, u32, f64)> {
        for (stream, packet) in self.ictx.packets().flatten() {
            if stream.index() != self.video_idx { continue; }
            if self.decoder.send_packet(&packet).is_err() { continue; }
            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = decoded.pts().unwrap_or(self.last_pts + 1);
                self.last_pts = pts;
                let ts_secs = self.pts_to_secs(pts);
                let mut out = ffmpeg::util::frame::video::Video::empty();
                if self.scaler.run(&decoded, &mut out).is_err() { return None; }
                let stride = out.stride(0);
                let raw    = out.data(0);
                let data: Vec<u8> = (0..self.out_h as usize)
                    .flat_map(|row| {
                        let s = row * stride;
                        &raw[s..s + self.out_w as usize * 4]
                    })
                    .copied()
                    .collect();
                return Some((data, self.out_w, self.out_h, ts_secs));
            }
        }
        None
    }
}

// ── Decode thread ─────────────────────────────────────────────────────────────

/// Body of the playback thread. Returns when the command channel closes.
pub fn run_playback_loop(
    cmd_rx:   Receiver<PlaybackCmd>,
    frame_tx: Sender<CaptureEvent>,
) {
    let mut next = None;
    loop {
        let cmd = match next.take() {
            Some(cmd) => cmd,
            None => match cmd_rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => return,
            },
        };
        let PlaybackCmd::Start { epoch, path } = cmd else {
            continue; // Stop while idle
        };
        next = play_file(epoch, &path, &cmd_rx, &frame_tx);
    }
}

/// Play one file to completion, Stop, or error. Returns the command that
/// interrupted playback, if any, so the caller can act on it next.
fn play_file(
    epoch:    u64,
    path:     &PathBuf,
    cmd_rx:   &Receiver<PlaybackCmd>,
    frame_tx: &Sender<CaptureEvent>,
) -> Option<PlaybackCmd> {
    let mut reader = match VideoReader::open(path) {
        Ok(r) => r,
        Err(e) => {
            let _ = frame_tx.send(CaptureEvent::PlaybackFailed {
                epoch,
                msg: e.to_string(),
            });
            return None;
        }
    };

    loop {
        let Some((rgba, width, height, timestamp)) = reader.next_frame() else {
            let _ = frame_tx.send(CaptureEvent::PlaybackEnded { epoch });
            return None;
        };

        let mut event = CaptureEvent::PlaybackFrame {
            epoch, timestamp, width, height, rgba,
        };

        // The frame channel is bounded; full means the UI hasn't consumed
        // earlier frames yet. Wait for space, but keep watching the command
        // channel so a Stop or superseding Start tears down promptly.
        loop {
            match frame_tx.try_send(event) {
                Ok(()) => break,
                Err(TrySendError::Disconnected(_)) => return None,
                Err(TrySendError::Full(ev)) => {
                    event = ev;
                    match cmd_rx.recv_timeout(Duration::from_millis(10)) {
                        Ok(PlaybackCmd::Stop) => return None,
                        Ok(start) => return Some(start),
                        Err(_) => {} // timeout, retry the send
                    }
                }
            }
        }

        match cmd_rx.try_recv() {
            Ok(PlaybackCmd::Stop) => return None,
            Ok(start) => return Some(start),
            Err(_) => {}
        }
    }
}

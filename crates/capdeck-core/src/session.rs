// crates/capdeck-core/src/session.rs
//
// Recording-session lifecycle: one optional session per kind, pure
// transitions driven by commands and capture events.
//
// Epochs: every device acquisition (mic stream, camera thread, the mic
// stream belonging to a video session) gets a unique epoch from the UI side.
// Capture events carry the epoch of the stream that produced them, and every
// push below rejects mismatches — a chunk from a stream that was stopped and
// superseded can never land in the wrong session's fragment list.

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::state::{CaptureState, MediaKind};

/// Ceiling on the bytes a session may hold before it is force-stopped.
/// Raw RGBA frames are large (640×480@30fps is ~37 MB/s); without a ceiling
/// a long video recording exhausts memory and takes the whole capture down
/// with it. The owner watches `over_budget` and finalizes what was captured.
pub const MAX_SESSION_BYTES: usize = 2 * 1024 * 1024 * 1024;

/// One continuous device-capture activity, from start to stop.
///
/// `fragments` is the ordered chunk sequence delivered by the capture
/// subsystem: interleaved i16 PCM (as little-endian bytes) for audio
/// sessions, full RGBA frames for video sessions. A video session carries
/// its microphone track separately in `mic_samples`; the two are muxed at
/// finalize time.
#[derive(Debug)]
pub struct RecordingSession {
    pub kind:        MediaKind,
    pub epoch:       u64,
    pub started:     Instant,
    pub fragments:   Vec<Vec<u8>>,

    // Audio format of the PCM track (fragments for Audio, mic for Video).
    pub sample_rate: u32,
    pub channels:    u16,

    // Video-only.
    pub frame_size:  Option<(u32, u32)>,
    pub mic_epoch:   u64,
    pub mic_samples: Vec<i16>,

    /// Total bytes held across `fragments` and `mic_samples`.
    pub stored_bytes: usize,
}

impl RecordingSession {
    /// True once the session holds `MAX_SESSION_BYTES` or more.
    pub fn over_budget(&self) -> bool {
        self.stored_bytes >= MAX_SESSION_BYTES
    }
}

/// Snapshot handed to the finalize job when a session ends.
/// Plain data, `Send` — the encode runs on a background thread.
#[derive(Debug)]
pub struct FinishedSession {
    pub kind:        MediaKind,
    pub fragments:   Vec<Vec<u8>>,
    pub sample_rate: u32,
    pub channels:    u16,
    pub frame_size:  Option<(u32, u32)>,
    pub mic_samples: Vec<i16>,
    pub elapsed:     Duration,
}

/// Camera open in flight. Start requests are ignored while this exists;
/// `requested` drives the give-up timeout so a camera that never produces a
/// frame cannot leave the UI stuck pending forever.
#[derive(Debug)]
pub struct PendingVideo {
    pub epoch:     u64,
    pub mic_epoch: u64,
    pub requested: Instant,
}

/// How long a pending camera open may go without a ready signal before the
/// start request is abandoned.
pub const CAMERA_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

impl CaptureState {
    pub fn is_recording(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.audio_session.is_some(),
            MediaKind::Video => self.video_session.is_some() || self.video_pending.is_some(),
        }
    }

    /// Idle → Recording(audio). Returns false (no transition) when an audio
    /// session is already active — a repeated start request is ignored.
    pub fn begin_audio(&mut self, epoch: u64, sample_rate: u32, channels: u16) -> bool {
        if self.audio_session.is_some() {
            return false;
        }
        self.audio_session = Some(RecordingSession {
            kind: MediaKind::Audio,
            epoch,
            started: Instant::now(),
            fragments: Vec::new(),
            sample_rate,
            channels,
            frame_size: None,
            mic_epoch: epoch,
            mic_samples: Vec::new(),
            stored_bytes: 0,
        });
        true
    }

    /// Record the in-flight camera open. Refused while a video session is
    /// active or another open is pending.
    pub fn begin_video_pending(&mut self, epoch: u64, mic_epoch: u64) -> bool {
        if self.video_session.is_some() || self.video_pending.is_some() {
            return false;
        }
        self.video_pending = Some(PendingVideo {
            epoch,
            mic_epoch,
            requested: Instant::now(),
        });
        true
    }

    /// Pending → Recording(video), on the camera's ready signal.
    /// A ready event from a stale epoch (camera stopped before it came up)
    /// is dropped.
    pub fn begin_video(&mut self, epoch: u64, sample_rate: u32, channels: u16) -> bool {
        let Some(pending) = self.video_pending.take_if(|p| p.epoch == epoch) else {
            return false;
        };
        self.video_session = Some(RecordingSession {
            kind: MediaKind::Video,
            epoch,
            started: Instant::now(),
            fragments: Vec::new(),
            sample_rate,
            channels,
            frame_size: None,
            mic_epoch: pending.mic_epoch,
            mic_samples: Vec::new(),
            stored_bytes: 0,
        });
        true
    }

    /// Abort a pending camera open (failure or timeout). Returns the pending
    /// record so the caller can release the mic stream it acquired alongside.
    pub fn abort_video_pending(&mut self, epoch: u64) -> Option<PendingVideo> {
        self.video_pending.take_if(|p| p.epoch == epoch)
    }

    /// True when the pending camera open has exceeded its timeout.
    pub fn video_pending_expired(&self, now: Instant) -> bool {
        self.video_pending
            .as_ref()
            .is_some_and(|p| now.duration_since(p.requested) >= CAMERA_OPEN_TIMEOUT)
    }

    /// Route a PCM chunk to whichever session owns its epoch: the audio
    /// session's fragment list, or the video session's mic track. Chunks
    /// from stale epochs are dropped.
    pub fn push_pcm(&mut self, epoch: u64, pcm: &[i16]) {
        if let Some(s) = self.audio_session.as_mut().filter(|s| s.epoch == epoch) {
            let mut bytes = Vec::with_capacity(pcm.len() * 2);
            for sample in pcm {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
            s.stored_bytes += bytes.len();
            s.fragments.push(bytes);
            return;
        }
        if let Some(s) = self.video_session.as_mut().filter(|s| s.mic_epoch == epoch) {
            s.stored_bytes += pcm.len() * 2;
            s.mic_samples.extend_from_slice(pcm);
        }
    }

    /// Append one camera frame to the active video session.
    pub fn push_frame(&mut self, epoch: u64, width: u32, height: u32, rgba: Vec<u8>) {
        let Some(s) = self.video_session.as_mut().filter(|s| s.epoch == epoch) else {
            return;
        };
        let size = s.frame_size.get_or_insert((width, height));
        // Cameras can renegotiate mid-stream; frames that no longer match the
        // session's negotiated size would corrupt the encode, so skip them.
        if *size != (width, height) {
            return;
        }
        s.stored_bytes += rgba.len();
        s.fragments.push(rgba);
    }

    /// Recording(kind) → Idle. Returns the finished session for finalization,
    /// or None when there was nothing to stop.
    pub fn end_session(&mut self, kind: MediaKind) -> Option<FinishedSession> {
        let session = match kind {
            MediaKind::Audio => self.audio_session.take(),
            MediaKind::Video => self.video_session.take(),
        }?;
        Some(FinishedSession {
            kind:        session.kind,
            elapsed:     session.started.elapsed(),
            fragments:   session.fragments,
            sample_rate: session.sample_rate,
            channels:    session.channels,
            frame_size:  session.frame_size,
            mic_samples: session.mic_samples,
        })
    }
}

// ── Recording names ───────────────────────────────────────────────────────────

/// `recording-<unix-millis>.<ext>` — the timestamp pattern recordings carry.
pub fn recording_name(kind: MediaKind, unix_millis: i64) -> String {
    format!("recording-{unix_millis}.{}", kind.recording_ext())
}

/// Name for a recording finalized now.
pub fn timestamp_name(kind: MediaKind) -> String {
    recording_name(kind, Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_start_stop_roundtrip() {
        let mut state = CaptureState::new();
        assert!(state.begin_audio(1, 48_000, 1));
        assert!(state.is_recording(MediaKind::Audio));

        state.push_pcm(1, &[0, 1, -1, 32767]);
        let finished = state.end_session(MediaKind::Audio).expect("session ends");

        assert!(!state.is_recording(MediaKind::Audio));
        assert_eq!(finished.fragments.len(), 1);
        assert_eq!(finished.fragments[0].len(), 8); // 4 samples × 2 bytes
        assert_eq!(finished.sample_rate, 48_000);
    }

    #[test]
    fn second_audio_start_is_ignored() {
        let mut state = CaptureState::new();
        assert!(state.begin_audio(1, 48_000, 1));
        // The repeated start must not create a second session or clobber
        // the first one's epoch.
        assert!(!state.begin_audio(2, 44_100, 2));
        assert_eq!(state.audio_session.as_ref().unwrap().epoch, 1);
    }

    #[test]
    fn stale_pcm_is_dropped() {
        let mut state = CaptureState::new();
        state.begin_audio(3, 48_000, 1);
        state.push_pcm(2, &[5; 100]); // stream from a previous acquisition
        assert!(state.audio_session.as_ref().unwrap().fragments.is_empty());
    }

    #[test]
    fn zero_fragment_stop_yields_empty_session() {
        let mut state = CaptureState::new();
        state.begin_audio(1, 48_000, 1);
        let finished = state.end_session(MediaKind::Audio).unwrap();
        assert!(finished.fragments.is_empty());
    }

    #[test]
    fn stop_when_idle_is_a_noop() {
        let mut state = CaptureState::new();
        assert!(state.end_session(MediaKind::Audio).is_none());
        assert!(state.end_session(MediaKind::Video).is_none());
    }

    #[test]
    fn video_start_is_guarded_while_pending() {
        let mut state = CaptureState::new();
        assert!(state.begin_video_pending(1, 2));
        assert!(state.is_recording(MediaKind::Video));
        assert!(!state.begin_video_pending(3, 4));

        assert!(state.begin_video(1, 48_000, 1));
        assert!(state.video_pending.is_none());
        assert!(!state.begin_video_pending(5, 6));
    }

    #[test]
    fn stale_camera_ready_is_dropped() {
        let mut state = CaptureState::new();
        state.begin_video_pending(1, 2);
        assert!(!state.begin_video(9, 48_000, 1));
        assert!(state.video_pending.is_some());
    }

    #[test]
    fn video_session_separates_frames_and_mic() {
        let mut state = CaptureState::new();
        state.begin_video_pending(1, 2);
        state.begin_video(1, 48_000, 1);

        state.push_frame(1, 4, 4, vec![0; 64]);
        state.push_pcm(2, &[1, 2, 3]);

        let s = state.video_session.as_ref().unwrap();
        assert_eq!(s.fragments.len(), 1);
        assert_eq!(s.mic_samples, [1, 2, 3]);
        assert_eq!(s.frame_size, Some((4, 4)));
    }

    #[test]
    fn mismatched_frame_size_is_skipped() {
        let mut state = CaptureState::new();
        state.begin_video_pending(1, 2);
        state.begin_video(1, 48_000, 1);

        state.push_frame(1, 4, 4, vec![0; 64]);
        state.push_frame(1, 8, 8, vec![0; 256]);
        assert_eq!(state.video_session.as_ref().unwrap().fragments.len(), 1);
    }

    #[test]
    fn audio_and_video_sessions_are_independent() {
        let mut state = CaptureState::new();
        assert!(state.begin_audio(1, 48_000, 1));
        assert!(state.begin_video_pending(2, 3));
        assert!(state.begin_video(2, 48_000, 1));

        assert!(state.is_recording(MediaKind::Audio));
        assert!(state.is_recording(MediaKind::Video));

        assert!(state.end_session(MediaKind::Audio).is_some());
        assert!(state.is_recording(MediaKind::Video));
    }

    #[test]
    fn sessions_track_stored_bytes() {
        let mut state = CaptureState::new();
        state.begin_video_pending(1, 2);
        state.begin_video(1, 48_000, 1);

        state.push_frame(1, 4, 4, vec![0; 64]);
        state.push_pcm(2, &[1, 2, 3]); // 3 samples × 2 bytes
        assert_eq!(state.video_session.as_ref().unwrap().stored_bytes, 64 + 6);

        state.begin_audio(3, 48_000, 1);
        state.push_pcm(3, &[0; 100]);
        assert_eq!(state.audio_session.as_ref().unwrap().stored_bytes, 200);
    }

    #[test]
    fn over_budget_trips_exactly_at_the_ceiling() {
        let mut state = CaptureState::new();
        state.begin_audio(1, 48_000, 1);

        let s = state.audio_session.as_mut().unwrap();
        assert!(!s.over_budget());
        s.stored_bytes = MAX_SESSION_BYTES - 1;
        assert!(!s.over_budget());
        s.stored_bytes = MAX_SESSION_BYTES;
        assert!(s.over_budget());
    }

    #[test]
    fn recording_names_follow_the_timestamp_pattern() {
        assert_eq!(recording_name(MediaKind::Audio, 1700000000123), "recording-1700000000123.wav");
        assert_eq!(recording_name(MediaKind::Video, 1700000000123), "recording-1700000000123.mp4");

        let name = timestamp_name(MediaKind::Audio);
        let stem = name.strip_prefix("recording-").unwrap();
        let millis = stem.strip_suffix(".wav").unwrap();
        assert!(millis.parse::<i64>().is_ok());
    }
}

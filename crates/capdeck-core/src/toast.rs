// crates/capdeck-core/src/toast.rs
//
// Transient notifications. The UI draws whatever is in CaptureState::toasts;
// expiry is a pure function of time so it can run in the per-frame tick.

use std::time::{Duration, Instant};

use crate::state::CaptureState;

/// Info toasts disappear quickly; errors linger long enough to read.
const INFO_TTL:  Duration = Duration::from_secs(3);
const ERROR_TTL: Duration = Duration::from_secs(6);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub id:      u64,
    pub level:   ToastLevel,
    pub message: String,
    pub created: Instant,
}

impl Toast {
    pub fn new(id: u64, level: ToastLevel, message: String) -> Self {
        Self { id, level, message, created: Instant::now() }
    }

    pub fn ttl(&self) -> Duration {
        match self.level {
            ToastLevel::Error => ERROR_TTL,
            _ => INFO_TTL,
        }
    }

    pub fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.created) >= self.ttl()
    }
}

impl CaptureState {
    /// Drop expired toasts. Called once per frame.
    pub fn expire_toasts(&mut self, now: Instant) {
        self.toasts.retain(|t| !t.expired(now));
    }

    pub fn dismiss_toast(&mut self, id: u64) {
        self.toasts.retain(|t| t.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_expire_after_ttl() {
        let mut state = CaptureState::new();
        state.push_toast(ToastLevel::Info, "Audio recording started");
        assert_eq!(state.toasts.len(), 1);

        let created = state.toasts[0].created;
        state.expire_toasts(created + Duration::from_millis(100));
        assert_eq!(state.toasts.len(), 1);

        state.expire_toasts(created + INFO_TTL);
        assert!(state.toasts.is_empty());
    }

    #[test]
    fn errors_outlive_info() {
        let mut state = CaptureState::new();
        state.push_toast(ToastLevel::Info, "started");
        state.push_toast(ToastLevel::Error, "Could not access microphone");

        let created = state.toasts[0].created;
        state.expire_toasts(created + INFO_TTL);
        assert_eq!(state.toasts.len(), 1);
        assert_eq!(state.toasts[0].level, ToastLevel::Error);
    }

    #[test]
    fn dismiss_removes_only_the_target() {
        let mut state = CaptureState::new();
        state.push_toast(ToastLevel::Info, "a");
        state.push_toast(ToastLevel::Info, "b");
        let first = state.toasts[0].id;
        state.dismiss_toast(first);
        assert_eq!(state.toasts.len(), 1);
        assert_eq!(state.toasts[0].message, "b");
    }
}

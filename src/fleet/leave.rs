//! Global leave coordination: fleet-wide, time-boxed withdrawal.

use tokio::time::{Duration, Instant};

/// How long the fleet stays withdrawn per activation
pub const LEAVE_WINDOW: Duration = Duration::from_secs(60);

/// Deferred connection attempts target this offset past activation, so they
/// fire shortly after deactivation
pub const LEAVE_RETRY_OFFSET: Duration = Duration::from_secs(61);

/// Maximum random stagger applied before each slot quits
pub const LEAVE_STAGGER_MAX: Duration = Duration::from_secs(3);

/// Chat substring (case-insensitive) that triggers a global leave
pub const LEAVE_TRIGGER: &str = "bot leave";

/// Process-wide global leave state.
///
/// Active for exactly one [`LEAVE_WINDOW`] per activation; re-activating
/// while already active is a no-op and does not move the window.
#[derive(Debug, Default)]
pub struct GlobalLeaveState {
    activated_at: Option<Instant>,
}

impl GlobalLeaveState {
    /// Create an inactive state
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether leave mode is currently active
    pub fn is_active(&self) -> bool {
        self.activated_at.is_some()
    }

    /// Activate leave mode; returns `false` if already active
    pub fn activate(&mut self, now: Instant) -> bool {
        if self.activated_at.is_some() {
            return false;
        }
        self.activated_at = Some(now);
        true
    }

    /// End leave mode
    pub fn deactivate(&mut self) {
        self.activated_at = None;
    }

    /// Delay until a deferred connection attempt should fire: no sooner than
    /// [`LEAVE_RETRY_OFFSET`] past the current activation
    pub fn retry_delay(&self, now: Instant) -> Duration {
        match self.activated_at {
            Some(at) => (at + LEAVE_RETRY_OFFSET).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }
}

/// Whether a chat message triggers the global leave protocol
pub fn is_leave_trigger(text: &str) -> bool {
    text.to_lowercase().contains(LEAVE_TRIGGER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_is_idempotent() {
        let mut leave = GlobalLeaveState::new();
        let t0 = Instant::now();

        assert!(leave.activate(t0));
        assert!(!leave.activate(t0 + Duration::from_secs(30)));

        // Window anchored to the first activation
        let delay = leave.retry_delay(t0 + Duration::from_secs(30));
        assert_eq!(delay, Duration::from_secs(31));
    }

    #[test]
    fn retry_delay_clamps_to_zero_past_window() {
        let mut leave = GlobalLeaveState::new();
        let t0 = Instant::now();
        leave.activate(t0);

        assert_eq!(leave.retry_delay(t0 + Duration::from_secs(120)), Duration::ZERO);
    }

    #[test]
    fn deactivate_clears_state() {
        let mut leave = GlobalLeaveState::new();
        leave.activate(Instant::now());
        leave.deactivate();
        assert!(!leave.is_active());
    }

    #[test]
    fn trigger_matches_case_insensitive_substring() {
        assert!(is_leave_trigger("bot leave"));
        assert!(is_leave_trigger("hey BOT LEAVE now"));
        assert!(is_leave_trigger("robot leaves"));
        assert!(!is_leave_trigger("bots leaving"));
        assert!(!is_leave_trigger("please depart"));
    }
}

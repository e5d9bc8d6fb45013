use crate::notification::domain::announcer::Announcer;
use crate::notification::domain::throttle_state::ThrottleState;
use crate::shared::constants::{DEFAULT_GREETING, DEFAULT_THROTTLE_PERIOD, UNKNOWN_LABEL};

/// Limits spoken greetings for an identity recognized on every tick.
///
/// A greeting fires when the identity's counter, before this event is
/// counted, is a multiple of `period`: the 1st, `period + 1`th, ... events.
pub struct NotificationThrottler {
    state: ThrottleState,
    period: u64,
    greeting: String,
    announcer: Box<dyn Announcer>,
}

impl NotificationThrottler {
    pub fn new(announcer: Box<dyn Announcer>, period: u64, greeting: impl Into<String>) -> Self {
        Self::with_state(ThrottleState::new(), announcer, period, greeting)
    }

    /// Resumes from an existing state. `period` of 0 is treated as 1.
    pub fn with_state(
        state: ThrottleState,
        announcer: Box<dyn Announcer>,
        period: u64,
        greeting: impl Into<String>,
    ) -> Self {
        Self {
            state,
            period: period.max(1),
            greeting: greeting.into(),
            announcer,
        }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn state(&self) -> &ThrottleState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Counts one recognition of `identity`, returning the greeting if one fired.
    ///
    /// `"unknown"` is ignored entirely. A failing announcer is logged; the
    /// event still counts as announced.
    pub fn on_recognized(&mut self, identity: &str) -> Option<String> {
        if identity == UNKNOWN_LABEL {
            return None;
        }

        let previous = self.state.record(identity);
        if previous % self.period != 0 {
            return None;
        }

        let message = self.greeting.replace("{name}", identity);
        log::info!("Greeting {identity} (recognition #{})", previous + 1);
        if let Err(e) = self.announcer.announce(&message) {
            log::warn!("Announcement for {identity} failed: {e}");
        }
        Some(message)
    }
}

impl std::fmt::Debug for NotificationThrottler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationThrottler")
            .field("state", &self.state)
            .field("period", &self.period)
            .field("greeting", &self.greeting)
            .finish_non_exhaustive()
    }
}

/// Default throttling with the default greeting.
pub fn default_throttler(announcer: Box<dyn Announcer>) -> NotificationThrottler {
    NotificationThrottler::new(announcer, DEFAULT_THROTTLE_PERIOD, DEFAULT_GREETING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingAnnouncer {
        spoken: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Announcer for RecordingAnnouncer {
        fn announce(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error>> {
            self.spoken.lock().unwrap().push(message.to_string());
            if self.fail {
                Err("speaker unplugged".into())
            } else {
                Ok(())
            }
        }
    }

    fn throttler(period: u64) -> (NotificationThrottler, Arc<Mutex<Vec<String>>>) {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let announcer = RecordingAnnouncer {
            spoken: spoken.clone(),
            fail: false,
        };
        (
            NotificationThrottler::new(Box::new(announcer), period, "Hello {name}"),
            spoken,
        )
    }

    #[test]
    fn test_first_recognition_announces() {
        let (mut throttler, spoken) = throttler(15);
        assert_eq!(throttler.on_recognized("Alice").as_deref(), Some("Hello Alice"));
        assert_eq!(*spoken.lock().unwrap(), vec!["Hello Alice".to_string()]);
    }

    #[test]
    fn test_fifteen_recognitions_announce_once() {
        let (mut throttler, spoken) = throttler(15);
        let fired: Vec<usize> = (1..=15)
            .filter(|_| throttler.on_recognized("Alice").is_some())
            .collect();
        assert_eq!(fired, vec![1]);
        assert_eq!(spoken.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_sixteenth_recognition_announces_again() {
        let (mut throttler, _) = throttler(15);
        let fired: Vec<usize> = (1..=31)
            .filter(|_| throttler.on_recognized("Alice").is_some())
            .collect();
        assert_eq!(fired, vec![1, 16, 31]);
    }

    #[test]
    fn test_unknown_never_announces_or_counts() {
        let (mut throttler, spoken) = throttler(15);
        for _ in 0..20 {
            assert!(throttler.on_recognized("unknown").is_none());
        }
        assert!(throttler.state().is_empty());
        assert!(spoken.lock().unwrap().is_empty());
    }

    #[test]
    fn test_identities_are_throttled_independently() {
        let (mut throttler, spoken) = throttler(3);
        throttler.on_recognized("Alice");
        throttler.on_recognized("Bob");
        throttler.on_recognized("Alice");
        throttler.on_recognized("Bob");
        assert_eq!(
            *spoken.lock().unwrap(),
            vec!["Hello Alice".to_string(), "Hello Bob".to_string()]
        );
        assert_eq!(throttler.state().count("Alice"), 2);
    }

    #[test]
    fn test_reset_restarts_counting() {
        let (mut throttler, _) = throttler(15);
        throttler.on_recognized("Alice");
        assert!(throttler.on_recognized("Alice").is_none());
        throttler.reset();
        assert!(throttler.on_recognized("Alice").is_some());
    }

    #[test]
    fn test_failing_announcer_still_counts() {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let announcer = RecordingAnnouncer {
            spoken: spoken.clone(),
            fail: true,
        };
        let mut throttler = NotificationThrottler::new(Box::new(announcer), 2, "Hi {name}");
        assert!(throttler.on_recognized("Alice").is_some());
        assert!(throttler.on_recognized("Alice").is_none());
        assert_eq!(spoken.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_zero_period_announces_every_time() {
        let (mut throttler, _) = throttler(0);
        assert_eq!(throttler.period(), 1);
        assert!(throttler.on_recognized("Alice").is_some());
        assert!(throttler.on_recognized("Alice").is_some());
    }

    #[test]
    fn test_resume_from_state() {
        let mut state = ThrottleState::new();
        state.record("Alice");
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let announcer = RecordingAnnouncer {
            spoken,
            fail: false,
        };
        let mut throttler = NotificationThrottler::with_state(state, Box::new(announcer), 15, "Hi");
        assert!(throttler.on_recognized("Alice").is_none());
    }
}

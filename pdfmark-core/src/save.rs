//! Save coalescing. Callers pass the clock in, so the policy stays
//! deterministic and never owns a timer.

use std::time::{Duration, Instant};

use crate::config::SaveConfig;

#[derive(Debug, Clone)]
pub struct Debouncer {
    wait: Duration,
    leading: bool,
    trailing: bool,
    deadline: Option<Instant>,
    pending: bool,
}

impl Debouncer {
    pub fn new(wait: Duration, leading: bool, trailing: bool) -> Self {
        Self {
            wait,
            leading,
            trailing,
            deadline: None,
            pending: false,
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Records a call. Returns true when the caller should act right now,
    /// either as the leading edge of a new burst or because a trailing call
    /// from an expired burst was never polled.
    pub fn call(&mut self, now: Instant) -> bool {
        let overdue = self.poll(now);
        let idle = self.deadline.is_none();
        self.deadline = Some(now + self.wait);
        if idle && self.leading {
            self.pending = false;
            return true;
        }
        self.pending = self.trailing;
        overdue
    }

    /// Returns true once per burst, when the quiet period has elapsed and a
    /// trailing call is owed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                std::mem::take(&mut self.pending)
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Auto-save after edits (leading and trailing) plus explicit saves
/// (trailing only).
#[derive(Debug, Clone)]
pub struct SavePolicy {
    pub auto: Debouncer,
    pub explicit: Debouncer,
}

impl SavePolicy {
    pub fn from_config(config: &SaveConfig) -> Self {
        Self {
            auto: Debouncer::new(Duration::from_millis(config.auto_save_ms), true, true),
            explicit: Debouncer::new(Duration::from_millis(config.explicit_save_ms), false, true),
        }
    }

    pub fn request_auto_save(&mut self, now: Instant) -> bool {
        self.auto.call(now)
    }

    pub fn request_save(&mut self, now: Instant) -> bool {
        self.explicit.call(now)
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        let auto = self.auto.poll(now);
        let explicit = self.explicit.poll(now);
        auto || explicit
    }

    pub fn is_pending(&self) -> bool {
        self.auto.is_pending() || self.explicit.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn leading_and_trailing_fire_once_each_per_burst() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(3000), true, true);

        assert!(debouncer.call(start));
        assert!(!debouncer.call(start + ms(1000)));
        assert!(!debouncer.call(start + ms(2000)));
        assert!(!debouncer.poll(start + ms(4000)));
        assert!(debouncer.poll(start + ms(5000)));
        assert!(!debouncer.poll(start + ms(9000)));

        assert!(debouncer.call(start + ms(10_000)));
    }

    #[test]
    fn single_leading_call_owes_no_trailing_fire() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(100), true, true);
        assert!(debouncer.call(start));
        assert!(!debouncer.is_pending());
        assert!(!debouncer.poll(start + ms(200)));
    }

    #[test]
    fn trailing_only_waits_for_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(100), false, true);
        assert!(!debouncer.call(start));
        assert!(!debouncer.call(start + ms(50)));
        assert!(!debouncer.poll(start + ms(120)));
        assert!(debouncer.poll(start + ms(150)));
    }

    #[test]
    fn unpolled_trailing_call_flushes_on_next_call() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(100), false, true);
        assert!(!debouncer.call(start));
        assert!(debouncer.call(start + ms(500)));
        assert!(debouncer.is_pending());
    }

    #[test]
    fn policy_uses_configured_intervals() {
        let policy = SavePolicy::from_config(&SaveConfig::default());
        assert_eq!(policy.auto.wait(), ms(3000));
        assert_eq!(policy.explicit.wait(), ms(100));
    }
}

//! Failed-login throttling per identity.
//!
//! Counters live in process memory and reset on restart; a restart therefore
//! forgives an in-progress lockout. That tradeoff is accepted here in
//! exchange for keeping the limiter independent of the credential store, so a
//! store outage can never be read as "not locked".
//!
//! Entries are dropped once stale (lock expired, or no failure within the
//! cooldown window), so the map only ever holds identities with recent
//! failures.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lockout policy. Injected from `AppConfig` rather than hard-coded at the
/// call sites.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Failed attempts before the identity is locked.
    pub max_attempts: u32,
    /// How long a locked identity stays locked.
    pub cooldown: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct AttemptEntry {
    failures: u32,
    locked_until: Option<Instant>,
    last_failure: Instant,
}

impl AttemptEntry {
    fn is_stale(&self, now: Instant, cooldown: Duration) -> bool {
        match self.locked_until {
            Some(until) => now >= until,
            None => now.duration_since(self.last_failure) >= cooldown,
        }
    }
}

/// Tracks consecutive failed logins per identity (normalized email). Each
/// transition is a single read-modify-write under the map lock, so concurrent
/// attempts against one identity cannot lose updates.
pub struct LoginRateLimiter {
    config: RateLimitConfig,
    state: Mutex<HashMap<String, AttemptEntry>>,
}

impl LoginRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Gate called before any credential lookup. `Err(remaining)` means the
    /// identity is locked; the attempt must be rejected without touching the
    /// counter or the store. An expired lock clears the entry and the attempt
    /// proceeds as if the identity were clear.
    pub fn check(&self, identity: &str) -> Result<(), Duration> {
        let mut state = self.state.lock();
        let Some(entry) = state.get_mut(identity) else {
            return Ok(());
        };
        if let Some(until) = entry.locked_until {
            let now = Instant::now();
            if now < until {
                return Err(until - now);
            }
            state.remove(identity);
        }
        Ok(())
    }

    /// Record a failed verification. Reaching the threshold starts the
    /// cooldown clock. Stale entries, this identity's included, are swept
    /// out first; a sub-threshold streak therefore restarts from one once
    /// the cooldown has passed without further failures.
    pub fn record_failure(&self, identity: &str) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.retain(|_, entry| !entry.is_stale(now, self.config.cooldown));
        let entry = state
            .entry(identity.to_string())
            .or_insert_with(|| AttemptEntry {
                failures: 0,
                locked_until: None,
                last_failure: now,
            });
        entry.failures += 1;
        entry.last_failure = now;
        if entry.failures >= self.config.max_attempts && entry.locked_until.is_none() {
            entry.locked_until = Some(now + self.config.cooldown);
        }
    }

    /// Full reset after a successful login.
    pub fn reset(&self, identity: &str) {
        self.state.lock().remove(identity);
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.state.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn failures(&self, identity: &str) -> u32 {
        self.state
            .lock()
            .get(identity)
            .map(|e| e.failures)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(max_attempts: u32, cooldown: Duration) -> LoginRateLimiter {
        LoginRateLimiter::new(RateLimitConfig {
            max_attempts,
            cooldown,
        })
    }

    #[test]
    fn clear_identity_passes() {
        let l = limiter(5, Duration::from_secs(60));
        assert!(l.check("a@x.com").is_ok());
    }

    #[test]
    fn locks_at_threshold() {
        let l = limiter(5, Duration::from_secs(60));
        for _ in 0..4 {
            l.record_failure("a@x.com");
            assert!(l.check("a@x.com").is_ok(), "warned but not locked");
        }
        l.record_failure("a@x.com");
        let remaining = l.check("a@x.com").expect_err("locked after 5 failures");
        assert!(remaining <= Duration::from_secs(60));
    }

    #[test]
    fn rejected_attempt_does_not_touch_counter() {
        let l = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            l.record_failure("a@x.com");
        }
        assert!(l.check("a@x.com").is_err());
        assert!(l.check("a@x.com").is_err());
        assert_eq!(l.failures("a@x.com"), 3);
    }

    #[test]
    fn lock_expires_back_to_clear() {
        let l = limiter(2, Duration::from_millis(20));
        l.record_failure("a@x.com");
        l.record_failure("a@x.com");
        assert!(l.check("a@x.com").is_err());

        std::thread::sleep(Duration::from_millis(40));
        assert!(l.check("a@x.com").is_ok());
        assert_eq!(l.failures("a@x.com"), 0, "expired lock clears the entry");
    }

    #[test]
    fn success_resets_counter() {
        let l = limiter(5, Duration::from_secs(60));
        for _ in 0..3 {
            l.record_failure("a@x.com");
        }
        l.reset("a@x.com");
        assert_eq!(l.failures("a@x.com"), 0);
        l.record_failure("a@x.com");
        assert_eq!(l.failures("a@x.com"), 1, "counts from one after a success");
    }

    #[test]
    fn identities_do_not_contend() {
        let l = limiter(2, Duration::from_secs(60));
        l.record_failure("a@x.com");
        l.record_failure("a@x.com");
        assert!(l.check("a@x.com").is_err());
        assert!(l.check("b@x.com").is_ok());
    }

    #[test]
    fn stale_subthreshold_entries_are_evicted() {
        let l = limiter(5, Duration::from_millis(20));
        l.record_failure("a@x.com");
        l.record_failure("b@x.com");
        assert_eq!(l.tracked(), 2);

        std::thread::sleep(Duration::from_millis(40));
        l.record_failure("c@x.com");
        assert_eq!(l.tracked(), 1, "only the fresh identity remains");
        assert_eq!(l.failures("a@x.com"), 0);
        assert_eq!(l.failures("c@x.com"), 1);
    }

    #[test]
    fn recent_entries_survive_the_sweep() {
        let l = limiter(5, Duration::from_secs(60));
        l.record_failure("a@x.com");
        l.record_failure("b@x.com");
        assert_eq!(l.tracked(), 2);
        assert_eq!(l.failures("a@x.com"), 1);
    }

    #[test]
    fn concurrent_failures_lose_no_updates() {
        let l = Arc::new(limiter(10_000, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let l = Arc::clone(&l);
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    l.record_failure("a@x.com");
                }
            }));
        }
        for h in handles {
            h.join().expect("thread");
        }
        assert_eq!(l.failures("a@x.com"), 200);
    }
}

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use tracing::warn;
use uuid::Uuid;

pub const DEFAULT_LIMIT: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
}

/// Fixed-window counter keyed by `(user_id, action)`.
///
/// State lives in process memory, so limits are per instance.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<(Uuid, &'static str), Window>>,
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl FixedWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one call. `Err` carries how long until the window resets.
    pub fn check(&self, user_id: Uuid, action: &'static str) -> Result<(), Duration> {
        self.check_at(user_id, action, Instant::now())
    }

    pub fn check_at(&self, user_id: Uuid, action: &'static str, now: Instant) -> Result<(), Duration> {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Drop expired windows so the map does not grow with every user ever seen.
        let window = self.window;
        windows.retain(|_, entry| now.duration_since(entry.started_at) < window);

        let entry = windows.entry((user_id, action)).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if entry.count >= self.limit {
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(entry.started_at));
            warn!(
                %user_id,
                action,
                retry_after_secs = retry_after.as_secs(),
                "rate_limiter: limit reached"
            );
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_call_in_window_is_rejected() {
        let limiter = FixedWindowRateLimiter::default();
        let user_id = Uuid::new_v4();
        let now = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_at(user_id, "cancel", now).is_ok());
        }

        let retry_after = limiter.check_at(user_id, "cancel", now).unwrap_err();
        assert_eq!(retry_after, DEFAULT_WINDOW);
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        let user_id = Uuid::new_v4();
        let start = Instant::now();

        assert!(limiter.check_at(user_id, "cancel", start).is_ok());
        assert!(limiter.check_at(user_id, "cancel", start + Duration::from_secs(30)).is_err());
        assert!(limiter.check_at(user_id, "cancel", start + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn actions_and_users_have_separate_budgets() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60));
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let now = Instant::now();

        assert!(limiter.check_at(alice, "cancel", now).is_ok());
        assert!(limiter.check_at(alice, "upgrade", now).is_ok());
        assert!(limiter.check_at(bob, "cancel", now).is_ok());
        assert!(limiter.check_at(alice, "cancel", now).is_err());
    }
}

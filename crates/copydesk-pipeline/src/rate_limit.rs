//! In-memory sliding-window rate limiting for outbound service calls.
//!
//! Each `(service, client)` pair owns a list of call timestamps. Every
//! check prunes timestamps older than the window before counting, so the
//! window slides continuously rather than resetting on a fixed boundary.
//! Nothing is persisted; a process restart clears all windows.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

/// Capacity of one window: at most `capacity` events per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub capacity: usize,
    pub window: Duration,
}

impl WindowConfig {
    #[must_use]
    pub const fn new(capacity: usize, window: Duration) -> Self {
        Self { capacity, window }
    }

    /// `per_minute` events over a one-minute window.
    #[must_use]
    pub const fn per_minute(per_minute: usize) -> Self {
        Self::new(per_minute, Duration::from_secs(60))
    }
}

/// Outcome of a non-recording limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Slots left in the window (0 when denied).
    pub remaining: usize,
    /// How long until the next slot frees. Zero when a slot is free now,
    /// and also zero for capacity-0 windows where nothing ever frees.
    pub reset_after: Duration,
}

/// One row of [`RateLimiter::snapshot`], shaped for API serialization.
#[derive(Debug, Clone, Serialize)]
pub struct WindowStatus {
    pub service: String,
    pub client: String,
    pub in_window: usize,
    pub capacity: usize,
    pub reset_after_secs: u64,
}

/// Sliding-window request counter keyed by `(service, client)`.
pub struct RateLimiter {
    default_config: WindowConfig,
    limits: HashMap<String, WindowConfig>,
    windows: Mutex<HashMap<(String, String), Vec<Instant>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(default_config: WindowConfig) -> Self {
        Self {
            default_config,
            limits: HashMap::new(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Sets a per-service limit overriding the default.
    #[must_use]
    pub fn with_limit(mut self, service: &str, config: WindowConfig) -> Self {
        self.limits.insert(service.to_string(), config);
        self
    }

    fn config_for(&self, service: &str) -> WindowConfig {
        self.limits
            .get(service)
            .copied()
            .unwrap_or(self.default_config)
    }

    /// Reports the current window state without recording a call.
    pub async fn check(&self, service: &str, client: &str) -> Decision {
        let config = self.config_for(service);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        match windows.get_mut(&(service.to_string(), client.to_string())) {
            Some(events) => {
                prune(events, config.window, now);
                decide(events, config, now)
            }
            None => decide(&[], config, now),
        }
    }

    /// Records a call if the window has room.
    ///
    /// # Errors
    ///
    /// Returns the time until the next slot frees when the window is full.
    /// A zero duration means the window can never admit a call
    /// (capacity 0).
    pub async fn try_acquire(&self, service: &str, client: &str) -> Result<(), Duration> {
        let config = self.config_for(service);
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let events = windows
            .entry((service.to_string(), client.to_string()))
            .or_default();
        prune(events, config.window, now);
        let decision = decide(events, config, now);
        if decision.allowed {
            events.push(now);
            Ok(())
        } else {
            Err(decision.reset_after)
        }
    }

    /// Waits for a slot, sleeping until the window frees, up to `max_wait`
    /// in total.
    ///
    /// # Errors
    ///
    /// Returns the outstanding reset delay when the slot cannot be had
    /// within the wait budget.
    pub async fn acquire(
        &self,
        service: &str,
        client: &str,
        max_wait: Duration,
    ) -> Result<(), Duration> {
        let mut waited = Duration::ZERO;
        loop {
            match self.try_acquire(service, client).await {
                Ok(()) => return Ok(()),
                Err(reset_after) => {
                    // Zero means a capacity-0 window; waiting cannot help.
                    if reset_after.is_zero() || waited + reset_after > max_wait {
                        return Err(reset_after);
                    }
                    tracing::debug!(
                        service,
                        client,
                        wait_ms = u64::try_from(reset_after.as_millis()).unwrap_or(u64::MAX),
                        "rate window full, waiting for a slot"
                    );
                    tokio::time::sleep(reset_after).await;
                    waited += reset_after;
                }
            }
        }
    }

    /// Drops every key whose window holds no live timestamps. Returns the
    /// number of keys removed.
    pub async fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|(service, _), events| {
            let window = self.config_for(service).window;
            prune(events, window, now);
            !events.is_empty()
        });
        before - windows.len()
    }

    /// Current state of every live window, for the limits endpoint.
    pub async fn snapshot(&self) -> Vec<WindowStatus> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let mut rows: Vec<WindowStatus> = windows
            .iter_mut()
            .map(|((service, client), events)| {
                let config = self.config_for(service);
                prune(events, config.window, now);
                let decision = decide(events, config, now);
                WindowStatus {
                    service: service.clone(),
                    client: client.clone(),
                    in_window: events.len(),
                    capacity: config.capacity,
                    reset_after_secs: decision.reset_after.as_secs(),
                }
            })
            .collect();
        rows.sort_by(|a, b| (&a.service, &a.client).cmp(&(&b.service, &b.client)));
        rows
    }
}

/// Drops timestamps that have left the window.
fn prune(events: &mut Vec<Instant>, window: Duration, now: Instant) {
    events.retain(|t| now.duration_since(*t) < window);
}

/// Computes the decision for an already-pruned event list.
///
/// When the window is full, the next slot frees once the oldest of the
/// newest `capacity` events leaves the window.
fn decide(events: &[Instant], config: WindowConfig, now: Instant) -> Decision {
    if config.capacity == 0 {
        return Decision {
            allowed: false,
            remaining: 0,
            reset_after: Duration::ZERO,
        };
    }
    let len = events.len();
    if len < config.capacity {
        return Decision {
            allowed: true,
            remaining: config.capacity - len,
            reset_after: Duration::ZERO,
        };
    }
    let pivot = events[len - config.capacity];
    let age = now.duration_since(pivot);
    Decision {
        allowed: false,
        remaining: 0,
        reset_after: config.window.saturating_sub(age),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn seconds_ago(now: Instant, secs: u64) -> Instant {
        now - Duration::from_secs(secs)
    }

    #[test]
    fn decide_allows_below_capacity() {
        let now = Instant::now();
        let events = vec![seconds_ago(now, 10)];
        let decision = decide(&events, WindowConfig::new(3, WINDOW), now);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_after, Duration::ZERO);
    }

    #[test]
    fn decide_denies_at_capacity_with_reset_from_oldest_relevant_event() {
        let now = Instant::now();
        // Three events, capacity two: the slot frees when the middle event
        // (oldest of the newest two) leaves the window.
        let events = vec![
            seconds_ago(now, 50),
            seconds_ago(now, 40),
            seconds_ago(now, 10),
        ];
        let decision = decide(&events, WindowConfig::new(2, WINDOW), now);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_after, Duration::from_secs(20));
    }

    #[test]
    fn decide_capacity_zero_never_allows_and_never_resets() {
        let now = Instant::now();
        let decision = decide(&[], WindowConfig::new(0, WINDOW), now);
        assert!(!decision.allowed);
        assert_eq!(decision.reset_after, Duration::ZERO);
    }

    #[test]
    fn prune_drops_only_expired_events() {
        let now = Instant::now();
        let mut events = vec![
            seconds_ago(now, 70),
            seconds_ago(now, 59),
            seconds_ago(now, 1),
        ];
        prune(&mut events, WINDOW, now);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn try_acquire_honours_capacity_per_key() {
        let limiter = RateLimiter::new(WindowConfig::new(2, WINDOW));
        assert!(limiter.try_acquire("research", "alice").await.is_ok());
        assert!(limiter.try_acquire("research", "alice").await.is_ok());
        let reset = limiter
            .try_acquire("research", "alice")
            .await
            .expect_err("third call in window must be denied");
        assert!(reset > Duration::ZERO);

        // A different client has its own window.
        assert!(limiter.try_acquire("research", "bob").await.is_ok());
        // So does a different service for the same client.
        assert!(limiter.try_acquire("writer", "alice").await.is_ok());
    }

    #[tokio::test]
    async fn per_service_limits_override_the_default() {
        let limiter = RateLimiter::new(WindowConfig::new(100, WINDOW))
            .with_limit("image", WindowConfig::new(1, WINDOW));
        assert!(limiter.try_acquire("image", "c").await.is_ok());
        assert!(limiter.try_acquire("image", "c").await.is_err());
        assert!(limiter.try_acquire("research", "c").await.is_ok());
    }

    #[tokio::test]
    async fn check_does_not_record() {
        let limiter = RateLimiter::new(WindowConfig::new(1, WINDOW));
        let first = limiter.check("research", "c").await;
        assert!(first.allowed);
        let second = limiter.check("research", "c").await;
        assert!(second.allowed, "check must not consume the slot");
    }

    #[tokio::test]
    async fn acquire_waits_for_a_freed_slot() {
        let limiter = RateLimiter::new(WindowConfig::new(1, Duration::from_millis(50)));
        limiter
            .try_acquire("research", "c")
            .await
            .expect("first slot");
        let start = Instant::now();
        limiter
            .acquire("research", "c", Duration::from_secs(2))
            .await
            .expect("slot should free within the window");
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn acquire_gives_up_when_wait_exceeds_budget() {
        let limiter = RateLimiter::new(WindowConfig::new(1, Duration::from_secs(60)));
        limiter
            .try_acquire("research", "c")
            .await
            .expect("first slot");
        let reset = limiter
            .acquire("research", "c", Duration::from_millis(10))
            .await
            .expect_err("60 s reset cannot fit a 10 ms budget");
        assert!(reset > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn acquire_fails_fast_on_capacity_zero() {
        let limiter = RateLimiter::new(WindowConfig::new(0, WINDOW));
        let reset = limiter
            .acquire("research", "c", Duration::from_secs(600))
            .await
            .expect_err("capacity 0 never admits");
        assert_eq!(reset, Duration::ZERO);
    }

    #[tokio::test]
    async fn cleanup_removes_fully_expired_keys() {
        let limiter = RateLimiter::new(WindowConfig::new(5, Duration::from_millis(20)));
        limiter.try_acquire("research", "a").await.expect("record");
        limiter.try_acquire("writer", "b").await.expect("record");
        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.try_acquire("writer", "b").await.expect("record");

        let removed = limiter.cleanup().await;
        assert_eq!(removed, 1, "only the fully-expired key goes away");

        let statuses = limiter.snapshot().await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].service, "writer");
        assert_eq!(statuses[0].in_window, 1);
    }

    #[tokio::test]
    async fn snapshot_reports_sorted_window_state() {
        let limiter = RateLimiter::new(WindowConfig::new(3, WINDOW));
        limiter.try_acquire("writer", "c").await.expect("record");
        limiter.try_acquire("research", "c").await.expect("record");
        limiter.try_acquire("research", "c").await.expect("record");

        let statuses = limiter.snapshot().await;
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].service, "research");
        assert_eq!(statuses[0].in_window, 2);
        assert_eq!(statuses[0].capacity, 3);
        assert_eq!(statuses[1].service, "writer");
    }
}

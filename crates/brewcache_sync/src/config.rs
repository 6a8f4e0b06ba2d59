//! Configuration for background sync.

use std::time::Duration;

/// Configuration for the periodic sync task.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between passes while passes succeed.
    pub sync_interval: Duration,
    /// Delay policy after passes that reported failures.
    pub backoff: BackoffConfig,
}

impl SyncConfig {
    /// Creates a configuration with the given interval.
    pub fn new(sync_interval: Duration) -> Self {
        Self {
            sync_interval,
            backoff: BackoffConfig::default(),
        }
    }

    /// Sets the sync interval.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the backoff configuration.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before the next pass after `consecutive_failures` unsuccessful
    /// passes in a row.
    pub fn next_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            self.sync_interval
        } else {
            self.backoff.delay_for_attempt(consecutive_failures)
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Exponential backoff between unsuccessful passes.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first unsuccessful pass.
    pub initial_delay: Duration,
    /// Upper bound on the delay, before jitter.
    pub max_delay: Duration,
    /// Multiplier applied per further unsuccessful pass.
    pub multiplier: f64,
    /// Whether to add up to 25% jitter.
    pub add_jitter: bool,
}

impl BackoffConfig {
    /// Creates a backoff starting at `initial_delay`.
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(600),
            multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A fixed delay with no growth and no jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let delay_secs = base.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            let jitter = delay_secs * 0.25 * time_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Cheap pseudo-random factor in `[0, 1)` from the clock's sub-second nanos.
fn time_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

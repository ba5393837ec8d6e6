// Retry wrapper for rate-limited calls. Only "429 Too Many Requests" errors
// are retried, with exponential backoff; everything else surfaces at once.

use std::fmt::Display;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(7);
pub const MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: MAX_DELAY,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Run `op`, sleeping on the calling thread between rate-limited attempts.
    pub fn run<T, E, F>(&self, label: &str, op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        self.run_with_sleep(label, op, std::thread::sleep)
    }

    /// Same as [`RetryPolicy::run`] with the sleep function supplied.
    pub fn run_with_sleep<T, E, F, S>(&self, label: &str, mut op: F, mut sleep: S) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
        S: FnMut(Duration),
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && is_rate_limited(&err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        call = label,
                        delay_secs = delay.as_secs_f64(),
                        retry = attempt + 1,
                        max_retries = self.max_retries,
                        "rate limited, backing off"
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Whether an error's text reports HTTP 429.
pub fn is_rate_limited<E: Display>(err: &E) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("429") && text.contains("too many requests")
}

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponent ceiling; keeps `factor^n` finite long after the cap is reached.
const MAX_EXPONENT: u32 = 32;

// ---------------------------------------------------------------------------
// BackoffConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// First retry delay, and the floor for every retry.
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    /// Ceiling once the exponential curve has grown past it.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Additive jitter as a fraction of the computed delay, in `[0, 1]`.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_base_ms() -> u64 {
    1_000
}

fn default_max_ms() -> u64 {
    30_000
}

fn default_factor() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            factor: default_factor(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffConfig {
    pub fn base(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    /// Same curve with jitter disabled, for deterministic schedules.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Delay before retry number `attempt` (0-based), jitter excluded.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.clamp(self.curve(attempt)) as u64)
    }

    fn curve(&self, attempt: u32) -> f64 {
        let exp = attempt.min(MAX_EXPONENT) as i32;
        let raw = self.base_ms as f64 * self.factor.max(1.0).powi(exp);
        raw.min(self.max_ms as f64)
    }

    fn clamp(&self, ms: f64) -> f64 {
        ms.min(self.max_ms as f64).max(self.base_ms as f64)
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Exponential retry schedule with a floor and a cap.
///
/// There is no attempt limit: once the cap is reached every further call to
/// [`Backoff::next_delay`] returns a delay near `max`. Call
/// [`Backoff::reset`] after a successful connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.config.curve(self.attempt);
        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let extra = if jitter > 0.0 {
            delay * jitter * rand::random::<f64>()
        } else {
            0.0
        };
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(self.config.clamp(delay + extra) as u64)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

//! Retry policy and failure classification for task attempts

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, ErrorKind};

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Abort,
}

/// Exponential backoff with an error-kind override
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Randomize each delay between 1x and 2x before capping
    pub jitter: bool,
    /// Fixed delay after a transient infrastructure failure
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            jitter: true,
            transient_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` is 1-based
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let base = self.min_delay.as_secs_f64() * self.factor.powi(exponent);
        let delay = if self.jitter {
            base * rand::thread_rng().gen_range(1.0..2.0)
        } else {
            base
        };
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }

    /// Decide what follows failed attempt `attempt` (1-based)
    pub fn decide(&self, error: &Error, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Abort;
        }
        match error.kind() {
            ErrorKind::Transient => RetryDecision::RetryAfter(self.transient_delay),
            ErrorKind::ResourceExhausted | ErrorKind::Fatal => RetryDecision::Abort,
            ErrorKind::Unclassified => RetryDecision::RetryAfter(self.backoff(attempt)),
        }
    }
}

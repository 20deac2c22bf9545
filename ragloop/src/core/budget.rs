//! Time budget helpers for the conversation loop.

use std::fmt;
use std::time::{Duration, Instant};

/// The conversation deadline has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

impl fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("conversation deadline exceeded")
    }
}

impl std::error::Error for DeadlineExceeded {}

/// Return the remaining time budget until the provided deadline.
pub fn remaining_budget(deadline: Instant) -> Result<Duration, DeadlineExceeded> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return Err(DeadlineExceeded);
    }
    Ok(remaining)
}

/// Exponential backoff before retry `attempt` (1-based), capped by `remaining`.
pub fn backoff_delay(base: Duration, attempt: u32, remaining: Duration) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor).min(remaining)
}

//! Exponential backoff policy for transient Share failures.
//!
//! ```text
//! attempt:  1    2     3     4     5      6      7 ...
//! delay:    5s   10s   20s   40s   80s    160s   300s (cap)
//! ```

use std::time::Duration;

/// Computes the wait before retry attempt `n` after `n` consecutive failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub base: Duration,
    /// Upper bound for any single delay.
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            cap: Duration::from_secs(300),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
        }
    }

    /// Returns `min(base * 2^(failures-1), cap)`, or zero when `failures == 0`.
    ///
    /// The sequence is non-decreasing in `failures` and never exceeds `cap`,
    /// including when the multiplication would overflow.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.cap)
            .min(self.cap)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

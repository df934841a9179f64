//! Linear retry delay.

use std::time::Duration;

/// Delay before retrying after failed attempt number `attempt` (1-based).
///
/// Grows linearly: attempt 1 waits one `unit`, attempt 2 waits two, and so on.
pub fn linear_delay(attempt: u32, unit: Duration) -> Duration {
    unit.saturating_mul(attempt)
}

/// Total time spent waiting when every one of `max_attempts` attempts fails.
///
/// No delay follows the final attempt.
pub fn total_delay(max_attempts: u32, unit: Duration) -> Duration {
    (1..max_attempts).map(|a| linear_delay(a, unit)).sum()
}

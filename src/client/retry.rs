//! Retry delay policy

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(1000);
const MAX_JITTER_MS: u64 = 1000;

/// Exponential backoff before `attempt` (1-based retry number):
/// `1000ms * 2^(attempt - 1)` plus up to one second of jitter.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    let jitter = rand::thread_rng().gen_range(0..MAX_JITTER_MS);
    INITIAL_RETRY_DELAY
        .saturating_mul(factor)
        .saturating_add(Duration::from_millis(jitter))
}

/// Parse a `Retry-After` header as delta-seconds or an HTTP date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let millis = date.with_timezone(&Utc).signed_duration_since(now).num_milliseconds();
    Some(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
}

/// Delay before retry `attempt`.
///
/// A server hint wins over backoff, clamped to `max_hint`. A zero hint counts as
/// no hint.
pub fn retry_delay(attempt: u32, hint: Option<Duration>, max_hint: Duration) -> Duration {
    match hint.filter(|delay| !delay.is_zero()) {
        Some(delay) => delay.min(max_hint),
        None => backoff_delay(attempt),
    }
}

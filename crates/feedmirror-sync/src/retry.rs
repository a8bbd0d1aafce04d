use std::time::Duration;

/// Delay before retry number `retry_count` (0 = first retry): `base * 2^retry_count`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use feedmirror_sync::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(500)), Duration::from_millis(500));
/// assert_eq!(retry_delay(1, Duration::from_millis(500)), Duration::from_secs(1));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(retry_count))
}

//! Time utilities for remote-run

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in nanoseconds.
///
/// Used to make temporary file names unique per invocation. Returns 0 if
/// the system clock is set before the Unix epoch.
///
/// # Examples
/// ```
/// use rr_core::time::current_time_nanos;
///
/// assert!(current_time_nanos() > 0);
/// ```
pub fn current_time_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

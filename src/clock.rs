use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix epoch seconds.
///
/// A clock set before 1970 reads as zero rather than panicking.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

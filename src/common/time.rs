//! Time-related utilities with clock abstraction for testability.
//!
//! Presence notifications carry a human-readable timestamp rendered in
//! Bangladesh Standard Time (Asia/Dhaka, UTC+6) using a 12-hour clock.

use chrono::{FixedOffset, TimeZone, Utc};

/// BST (Asia/Dhaka) offset from UTC, in seconds.
const DHAKA_OFFSET_SECS: i32 = 6 * 3600;

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp in milliseconds
    fn now_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        get_timestamp()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// Get current Unix timestamp in milliseconds
pub fn get_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a Unix timestamp (milliseconds) as a Dhaka-local presence
/// timestamp: `MM/DD/YYYY, hh:mm AM/PM`
pub fn format_dhaka_timestamp(timestamp_millis: i64) -> String {
    let dhaka_offset = FixedOffset::east_opt(DHAKA_OFFSET_SECS).expect("valid UTC+6 offset");
    let seconds = timestamp_millis.div_euclid(1000);
    let nanos = (timestamp_millis.rem_euclid(1000) * 1_000_000) as u32;
    match dhaka_offset.timestamp_opt(seconds, nanos).single() {
        Some(dt) => dt.format("%m/%d/%Y, %I:%M %p").to_string(),
        None => String::new(),
    }
}

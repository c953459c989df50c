//! Time utilities
//!
//! Time-addressed annotations carry offsets in integer milliseconds since
//! media start; source documents store them as fractional seconds.

use chrono::{DateTime, Utc};

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert fractional seconds (as stored in source documents) to integer
/// milliseconds since media start.
pub fn secs_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_to_ms_whole() {
        assert_eq!(secs_to_ms(5.0), 5000);
    }

    #[test]
    fn test_secs_to_ms_fractional() {
        assert_eq!(secs_to_ms(1.234), 1234);
        assert_eq!(secs_to_ms(0.0015), 1);
    }

    #[test]
    fn test_secs_to_ms_zero() {
        assert_eq!(secs_to_ms(0.0), 0);
    }

    #[test]
    fn test_now_is_plausible() {
        let timestamp = now();
        // after 2020, before 2100
        assert!(timestamp.timestamp() > 1_577_836_800);
        assert!(timestamp.timestamp() < 4_102_444_800);
    }
}

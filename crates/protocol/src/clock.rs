//! Shared wall-clock source
//!
//! All three timestamps on the wire (`send`, `pick_up`, `response`) must be
//! comparable, so every component stamps them through this one helper.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as fractional seconds since the Unix epoch.
pub fn wall_clock_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_clock_is_non_decreasing() {
        let first = wall_clock_secs();
        let second = wall_clock_secs();

        assert!(first > 0.0);
        assert!(second >= first);
    }
}

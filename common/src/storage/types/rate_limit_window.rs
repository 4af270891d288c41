#![allow(clippy::module_name_repetitions)]
use crate::stored_object;

stored_object!(RateLimitWindow, "rate_limit_window", {
    tenant_id: String,
    endpoint: String,
    /// Epoch seconds truncated to the window boundary.
    window_start: i64,
    request_count: i64
});

/// Truncate an epoch timestamp to its fixed-window boundary.
pub fn window_start_for(epoch_seconds: i64, window_seconds: i64) -> i64 {
    let width = window_seconds.max(1);
    epoch_seconds - epoch_seconds.rem_euclid(width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start_truncates_to_boundary() {
        assert_eq!(window_start_for(125, 60), 120);
        assert_eq!(window_start_for(120, 60), 120);
        assert_eq!(window_start_for(179, 60), 120);
        assert_eq!(window_start_for(180, 60), 180);
    }

    #[test]
    fn test_window_start_survives_degenerate_width() {
        assert_eq!(window_start_for(125, 0), 125);
    }
}

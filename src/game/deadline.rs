//! Turn Deadline Display
//!
//! The ledger expresses deadlines as block heights. Converting a block delta
//! to wall time assumes a fixed block period, which real chains only
//! approximate. The result is for display only; expiry itself is decided
//! from ledger block heights in [`crate::game::turn`], never from the local
//! clock.

use std::time::Duration;

/// Advisory time until `deadline`, seen from `observed_block`.
///
/// Returns `None` without a deadline and `Some(ZERO)` once it has passed.
pub fn remaining_time(
    deadline: Option<u64>,
    observed_block: u64,
    block_period: Duration,
) -> Option<Duration> {
    let deadline = deadline?;
    let blocks = deadline.saturating_sub(observed_block);
    let blocks = u32::try_from(blocks).unwrap_or(u32::MAX);
    Some(block_period.saturating_mul(blocks))
}

/// Whether `observed_block` is past `deadline`.
#[inline]
pub fn is_expired(deadline: Option<u64>, observed_block: u64) -> bool {
    matches!(deadline, Some(d) if observed_block > d)
}

/// Render as `MM:SS`, or `Not Active` without a deadline.
pub fn format_remaining(remaining: Option<Duration>) -> String {
    match remaining {
        Some(remaining) => {
            let secs = remaining.as_secs();
            format!("{:02}:{:02}", secs / 60, secs % 60)
        }
        None => "Not Active".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_secs(2);

    #[test]
    fn test_remaining_time() {
        assert_eq!(remaining_time(Some(130), 100, PERIOD), Some(Duration::from_secs(60)));
        assert_eq!(remaining_time(Some(100), 100, PERIOD), Some(Duration::ZERO));
        assert_eq!(remaining_time(Some(90), 100, PERIOD), Some(Duration::ZERO));
        assert_eq!(remaining_time(None, 100, PERIOD), None);
    }

    #[test]
    fn test_huge_delta_saturates() {
        let remaining = remaining_time(Some(u64::MAX), 0, PERIOD).unwrap();
        assert!(remaining >= Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn test_expiry_is_strict() {
        assert!(!is_expired(Some(100), 100));
        assert!(is_expired(Some(100), 101));
        assert!(!is_expired(None, u64::MAX));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_remaining(Some(Duration::from_secs(125))), "02:05");
        assert_eq!(format_remaining(Some(Duration::ZERO)), "00:00");
        assert_eq!(format_remaining(None), "Not Active");
    }
}

//! One-time passcode generation and the clock used for passcode expiry

use chrono::{DateTime, Utc};
use rand::Rng;

/// Default passcode length
pub const CODE_DIGITS: usize = 6;

/// Default passcode lifetime in seconds
pub const CODE_TTL_SECS: u64 = 300;

/// Generate a uniformly random numeric code of `digits` length.
///
/// Every value in `0..10^digits` is equally likely; leading zeros are kept.
pub fn generate_code(digits: usize) -> String {
    let digits = digits.clamp(1, 9);
    let upper = 10u32.pow(u32::try_from(digits).unwrap_or(6));
    let value = rand::thread_rng().gen_range(0..upper);
    format_code(value, digits)
}

fn format_code(value: u32, digits: usize) -> String {
    format!("{value:0digits$}")
}

/// Expiry instant `ttl` after `now`; `None` when it is not representable
pub fn expires_at(now: DateTime<Utc>, ttl: std::time::Duration) -> Option<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl).ok()?;
    now.checked_add_signed(ttl)
}

/// Time source for passive expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..200 {
            let code = generate_code(CODE_DIGITS);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_leading_zeros_preserved() {
        assert_eq!(format_code(42, 6), "000042");
        assert_eq!(format_code(0, 6), "000000");
        assert_eq!(format_code(999_999, 6), "999999");
    }

    #[test]
    fn test_expiry_overflow_is_none() {
        let now = Utc::now();
        assert_eq!(
            expires_at(now, std::time::Duration::from_secs(300)),
            Some(now + chrono::Duration::seconds(300))
        );
        assert!(expires_at(now, std::time::Duration::from_secs(10_000_000_000_000)).is_none());
        assert!(expires_at(now, std::time::Duration::MAX).is_none());
    }

    #[test]
    fn test_codes_vary() {
        let codes: std::collections::HashSet<_> = (0..50).map(|_| generate_code(6)).collect();
        assert!(codes.len() > 1);
    }
}

//! Timestamp and jitter helpers shared by the config record and cleaner.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since UNIX epoch, saturating on clock errors rather
/// than panicking (a store must not crash because the wall clock moved
/// backwards).
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Applies up to `+/- frac` proportional jitter to `base`, using `salt`
/// (any value that varies per call, e.g. a counter or digest seed) as
/// the source of pseudo-randomness. Deterministic given the same salt,
/// which keeps cleaner-sleep tests reproducible.
pub fn jittered(base: Duration, frac: f64, salt: u64) -> Duration {
    debug_assert!((0.0..=1.0).contains(&frac));
    // xorshift64 step; cheap, non-cryptographic, good enough to spread
    // cleaner wakeups across stores sharing a process.
    let mut x = salt ^ 0x9E37_79B9_7F4A_7C15;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    let unit = (x as f64) / (u64::MAX as f64); // [0, 1]
    let offset = frac * (2.0 * unit - 1.0); // [-frac, frac]
    let scale = 1.0 + offset;
    Duration::from_secs_f64((base.as_secs_f64() * scale).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_bound() {
        let base = Duration::from_secs(300);
        for salt in 0..100u64 {
            let d = jittered(base, 0.1, salt);
            assert!(d.as_secs_f64() >= base.as_secs_f64() * 0.9 - 0.001);
            assert!(d.as_secs_f64() <= base.as_secs_f64() * 1.1 + 0.001);
        }
    }

    #[test]
    fn jitter_is_deterministic_per_salt() {
        let base = Duration::from_secs(300);
        assert_eq!(jittered(base, 0.1, 42), jittered(base, 0.1, 42));
    }
}

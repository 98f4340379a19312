//! Deterministic timing primitives for corpus generation.
//!
//! Two pieces live here: a seeded Poisson interval stream ([`PoissonTimer`])
//! and the working-hour gate ([`next_in_band`]). Both are pure given their
//! seed; same seed, same sequence.
//!
//! All randomness flows through an explicitly seeded [`ChaCha8Rng`], never
//! a thread-local RNG.
//!
//! # Example
//!
//! ```
//! use mimic_sampler::PoissonTimer;
//!
//! let mut a = PoissonTimer::new(25.0, 42);
//! let mut b = PoissonTimer::new(25.0, 42);
//! assert_eq!(a.next_interval(), b.next_interval());
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use mimic_types::{HourBand, Velocity};

/// Derive the per-stream seed for a developer from the global seed, as
/// `global XOR index`. Index 0 reuses the global seed verbatim.
pub fn stream_seed(global_seed: u64, dev_index: usize) -> u64 {
    global_seed ^ dev_index as u64
}

/// A seeded stream of exponentially distributed inter-event intervals.
///
/// The rate is expressed in events per hour; intervals come back in seconds
/// via inverse-transform sampling on Exp(rate / 3600).
#[derive(Debug, Clone)]
pub struct PoissonTimer {
    rate_per_sec: f64,
    rng: ChaCha8Rng,
}

impl PoissonTimer {
    /// Create a timer with `rate_per_hour` events/hour and an explicit seed.
    ///
    /// A non-positive rate yields a timer that never fires (intervals of
    /// ~10^9 seconds), which callers treat as "no events in this window".
    pub fn new(rate_per_hour: f64, seed: u64) -> Self {
        Self {
            rate_per_sec: (rate_per_hour / 3600.0).max(0.0),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draw the next inter-event interval.
    pub fn next_interval(&mut self) -> Duration {
        if self.rate_per_sec <= 0.0 {
            return Duration::from_secs(1_000_000_000);
        }
        // Inverse transform: -ln(1 - u) / rate, with u in [0, 1).
        let u: f64 = self.rng.gen_range(0.0..1.0);
        let secs = -(1.0 - u).ln() / self.rate_per_sec;
        Duration::from_secs_f64(secs)
    }

    /// The configured rate, in events per hour.
    pub fn rate_per_hour(&self) -> f64 {
        self.rate_per_sec * 3600.0
    }
}

/// Per-developer effective rate: the velocity's base λ times a symmetric
/// volatility multiplier drawn uniformly from [1 - v, 1 + v].
///
/// The multiplier is drawn from its own seeded stream (offset so it never
/// aliases the interval stream of the same developer).
pub fn developer_rate(velocity: Velocity, volatility: f64, seed: u64) -> f64 {
    let base = velocity.events_per_hour();
    let v = volatility.clamp(0.0, 1.0);
    if v == 0.0 {
        return base;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_mul(0x9e37_79b9_7f4a_7c15));
    let factor: f64 = rng.gen_range(1.0 - v..=1.0 + v);
    base * factor
}

/// Advance a candidate timestamp to the earliest equal-or-later instant
/// whose hour of day lies inside the band.
///
/// In-band candidates pass through untouched, sub-hour components included.
/// Out-of-band candidates land on the next band opening at minute 0,
/// second 0 (possibly the next day for wrapping bands).
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use mimic_sampler::next_in_band;
/// use mimic_types::HourBand;
///
/// let band = HourBand { start: 9, end: 17 };
/// let evening = Utc.with_ymd_and_hms(2025, 3, 10, 19, 0, 0).unwrap();
/// let gated = next_in_band(band, evening);
/// assert_eq!(gated, Utc.with_ymd_and_hms(2025, 3, 11, 9, 0, 0).unwrap());
/// ```
pub fn next_in_band(band: HourBand, candidate: DateTime<Utc>) -> DateTime<Utc> {
    if band.contains(candidate.hour()) {
        return candidate;
    }

    // Walk forward hour by hour to the next opening; bounded by 24 steps.
    let mut probe = candidate
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(candidate);
    for _ in 0..=24 {
        probe = probe + TimeDelta::hours(1);
        if band.contains(probe.hour()) {
            return probe;
        }
    }
    probe
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = PoissonTimer::new(25.0, 42);
        let mut b = PoissonTimer::new(25.0, 42);
        for _ in 0..100 {
            assert_eq!(a.next_interval(), b.next_interval());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = PoissonTimer::new(25.0, 1);
        let mut b = PoissonTimer::new(25.0, 2);
        let a_first: Vec<Duration> = (0..8).map(|_| a.next_interval()).collect();
        let b_first: Vec<Duration> = (0..8).map(|_| b.next_interval()).collect();
        assert_ne!(a_first, b_first);
    }

    #[test]
    fn mean_interval_tracks_rate() {
        // λ = 60/h means one event per minute on average. 10k draws keeps
        // the sample mean within a few percent.
        let mut timer = PoissonTimer::new(60.0, 7);
        let n = 10_000;
        let total: f64 = (0..n).map(|_| timer.next_interval().as_secs_f64()).sum();
        let mean = total / n as f64;
        assert!((50.0..70.0).contains(&mean), "mean was {mean}");
    }

    #[test]
    fn zero_rate_never_fires() {
        let mut timer = PoissonTimer::new(0.0, 1);
        assert!(timer.next_interval() >= Duration::from_secs(1_000_000_000));
    }

    #[test]
    fn developer_rate_within_volatility_band() {
        for seed in 0..50 {
            let rate = developer_rate(Velocity::Medium, 0.3, seed);
            assert!((17.5..=32.5).contains(&rate), "rate was {rate}");
        }
    }

    #[test]
    fn developer_rate_zero_volatility_is_base() {
        assert_eq!(developer_rate(Velocity::High, 0.0, 9), 50.0);
    }

    #[test]
    fn developer_rate_is_deterministic() {
        assert_eq!(
            developer_rate(Velocity::Low, 0.25, 11),
            developer_rate(Velocity::Low, 0.25, 11)
        );
    }

    #[test]
    fn stream_seed_xors_index() {
        assert_eq!(stream_seed(0xff00, 0), 0xff00);
        assert_eq!(stream_seed(0xff00, 3), 0xff03);
    }

    #[test]
    fn gate_passes_in_band_candidate_through() {
        let band = HourBand { start: 9, end: 17 };
        let ts = Utc.with_ymd_and_hms(2025, 3, 10, 10, 23, 45).unwrap();
        assert_eq!(next_in_band(band, ts), ts);
    }

    #[test]
    fn gate_advances_to_band_start() {
        let band = HourBand { start: 9, end: 17 };
        let ts = Utc.with_ymd_and_hms(2025, 3, 10, 18, 30, 0).unwrap();
        let gated = next_in_band(band, ts);
        assert_eq!(gated, Utc.with_ymd_and_hms(2025, 3, 11, 9, 0, 0).unwrap());
    }

    #[test]
    fn gate_handles_wrapping_band() {
        let band = HourBand { start: 22, end: 6 };

        let late = Utc.with_ymd_and_hms(2025, 3, 10, 22, 0, 0).unwrap();
        assert_eq!(next_in_band(band, late), late);

        let midnight = Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap();
        assert_eq!(next_in_band(band, midnight), midnight);

        let almost_closing = Utc.with_ymd_and_hms(2025, 3, 11, 5, 59, 0).unwrap();
        assert_eq!(next_in_band(band, almost_closing), almost_closing);

        let daytime = Utc.with_ymd_and_hms(2025, 3, 11, 12, 15, 0).unwrap();
        let gated = next_in_band(band, daytime);
        assert_eq!(gated, Utc.with_ymd_and_hms(2025, 3, 11, 22, 0, 0).unwrap());
    }

    proptest! {
        #[test]
        fn gate_result_is_in_band_and_not_earlier(
            start in 0u8..24,
            end in 0u8..24,
            offset_secs in 0i64..(7 * 24 * 3600),
        ) {
            let band = HourBand { start, end };
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
            let candidate = base + TimeDelta::seconds(offset_secs);
            let gated = next_in_band(band, candidate);
            prop_assert!(gated >= candidate);
            prop_assert!(band.contains(gated.hour()));
        }

        #[test]
        fn intervals_are_nonnegative_and_finite(rate in 1.0f64..200.0, seed: u64) {
            let mut timer = PoissonTimer::new(rate, seed);
            for _ in 0..32 {
                let d = timer.next_interval();
                prop_assert!(d >= Duration::ZERO);
                prop_assert!(d < Duration::from_secs(30 * 24 * 3600));
            }
        }
    }
}

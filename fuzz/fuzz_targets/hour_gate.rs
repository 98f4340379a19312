#![no_main]

use chrono::{TimeDelta, TimeZone, Timelike, Utc};
use libfuzzer_sys::fuzz_target;
use mimic_sampler::next_in_band;
use mimic_types::HourBand;

fuzz_target!(|input: (u8, u8, u32)| {
    let (start, end, offset) = input;
    let band = HourBand {
        start: start % 24,
        end: end % 24,
    };
    let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let candidate = base + TimeDelta::seconds(i64::from(offset % (14 * 24 * 3600)));

    let gated = next_in_band(band, candidate);
    assert!(gated >= candidate);
    assert!(band.contains(gated.hour()));
    if band.contains(candidate.hour()) {
        assert_eq!(gated, candidate, "in-band candidates pass through");
    }
});

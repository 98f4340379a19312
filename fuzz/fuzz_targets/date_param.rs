#![no_main]

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use mimic_server::dates::resolve_window;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let now = Utc.with_ymd_and_hms(2025, 6, 15, 10, 30, 0).unwrap();

    // Any input either parses into an ordered window or errors cleanly.
    if let Ok(window) = resolve_window(Some(text), None, now) {
        assert!(window.from <= window.to);
    }
    if let Ok(window) = resolve_window(None, Some(text), now) {
        assert!(window.from <= window.to);
    }
});

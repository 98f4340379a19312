#![no_main]

use libfuzzer_sys::fuzz_target;
use mimic_seed::{SeedDocument, finish};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the loader: either a clean error or
    // a seed whose validated form round-trips through JSON.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(doc) = serde_json::from_str::<SeedDocument>(text) {
        if let Ok(loaded) = finish(doc, Some(8)) {
            assert_eq!(loaded.developers.len(), 8);
            let emails: std::collections::BTreeSet<_> =
                loaded.developers.iter().map(|d| d.email.as_str()).collect();
            assert_eq!(emails.len(), loaded.developers.len());
            assert!(!loaded.repositories.is_empty());
        }
    }
});

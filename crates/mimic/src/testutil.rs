//! Shared fixtures for the generator tests.

use chrono::{DateTime, TimeZone, Utc};

use mimic_seed::LoadedSeed;
use mimic_types::{Developer, GenParams, HourBand};

use crate::pipeline::GenContext;

/// Fixed "now" so windows are reproducible in assertions.
pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

/// A roster of `dev_count` developers across two repositories.
pub(crate) fn test_seed(dev_count: usize) -> LoadedSeed {
    let developers: Vec<Developer> = (0..dev_count)
        .map(|i| Developer {
            user_id: format!("dev{i}"),
            email: format!("dev{i}@example.com"),
            working_hours: HourBand { start: 9, end: 17 },
            ai_preference: 0.4 + 0.1 * (i % 4) as f64,
            preferred_models: vec!["claude-sonnet-4.5".into(), "gpt-4o".into()],
            seniority: None,
        })
        .collect();
    LoadedSeed {
        developers,
        repositories: vec!["acme/api".into(), "acme/web-app".into()],
        team_id: 1,
        warnings: vec![],
    }
}

pub(crate) fn ctx_with(seed: LoadedSeed, params: GenParams, rng_seed: u64) -> GenContext {
    GenContext::new(&seed, params, rng_seed, now())
}

//! Preview mode: a fast, non-serving sample run.
//!
//! Loads nothing itself — the CLI hands in the parsed seed — then generates
//! a deliberately tiny sample (at most 10 commits and 100 usage events),
//! prints a human-readable summary to the supplied writer, and surfaces the
//! seed loader's soft-validation warnings. No HTTP server is involved and
//! the whole run finishes in well under a second.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use mimic_seed::LoadedSeed;
use mimic_types::GenParams;

use crate::pipeline::GenContext;

/// Commits shown in the sample.
const SAMPLE_COMMITS: u64 = 10;
/// Usage events counted into the sample.
const SAMPLE_EVENTS: usize = 100;

/// Generate the sample and write the summary. The output is deterministic
/// for a given seed document, parameters, and RNG seed.
pub fn run_preview(
    seed: &LoadedSeed,
    params: &GenParams,
    rng_seed: u64,
    now: DateTime<Utc>,
    out: &mut dyn Write,
) -> Result<()> {
    let sample_params = GenParams {
        days: params.days.min(3),
        max_commits_total: Some(SAMPLE_COMMITS),
        ..params.clone()
    };
    let ctx = GenContext::new(seed, sample_params, rng_seed, now);

    let commits = crate::commits::generate(&ctx);
    let mut events = crate::usage::generate(&ctx, &commits);
    events.truncate(SAMPLE_EVENTS);

    writeln!(out, "Preview — mimic corpus sample")?;
    writeln!(
        out,
        "  roster:   {} developers, {} repositories",
        seed.developers.len(),
        seed.repositories.len()
    )?;
    writeln!(
        out,
        "  window:   {} .. {} ({} days, {} velocity)",
        ctx.window_start.format("%Y-%m-%d"),
        ctx.window_end.format("%Y-%m-%d"),
        ctx.params.days,
        ctx.params.velocity
    )?;
    writeln!(out, "  rng seed: {rng_seed}")?;
    writeln!(out)?;

    writeln!(out, "  sample commits ({}):", commits.len())?;
    for commit in &commits {
        writeln!(
            out,
            "    {}  {:<12} {:<20} +{} ({}t/{}c/{}m)  {}",
            commit.timestamp.format("%Y-%m-%d %H:%M:%S"),
            commit.user_id,
            commit.repo,
            commit.total_lines,
            commit.tab_lines,
            commit.composer_lines,
            commit.non_ai_lines,
            commit.message,
        )?;
    }
    writeln!(out)?;

    let mut by_stream: Vec<(&'static str, usize)> = vec![
        ("model", 0),
        ("client_version", 0),
        ("file_extension", 0),
        ("feature", 0),
    ];
    for (stream, _) in &events {
        let label = match stream {
            mimic_types::UsageStream::Model => "model",
            mimic_types::UsageStream::ClientVersion => "client_version",
            mimic_types::UsageStream::FileExtension => "file_extension",
            mimic_types::UsageStream::Feature => "feature",
        };
        if let Some(entry) = by_stream.iter_mut().find(|(name, _)| *name == label) {
            entry.1 += 1;
        }
    }
    writeln!(out, "  sample usage events ({}):", events.len())?;
    for (name, count) in by_stream {
        writeln!(out, "    {name}: {count}")?;
    }
    writeln!(out)?;

    if seed.warnings.is_empty() {
        writeln!(out, "  no warnings")?;
    } else {
        writeln!(out, "  warnings:")?;
        for warning in &seed.warnings {
            writeln!(out, "    warning: {warning}")?;
        }
    }

    out.flush().context("failed to flush preview output")?;
    Ok(())
}

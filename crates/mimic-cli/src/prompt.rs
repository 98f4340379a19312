//! Seam for the interactive prompt.
//!
//! The prompt UI ships as a separate component; the lifecycle only depends
//! on this trait. `--interactive` routes the generation parameters through
//! whatever implementation is plugged in, and the bundled default simply
//! keeps the configured values so non-TTY environments behave identically.

use mimic_types::GenParams;

pub trait Prompter {
    /// Give the prompt a chance to replace the generation overrides.
    fn overrides(&self, defaults: GenParams) -> GenParams;
}

/// Pass-through implementation used when no prompt component is wired in.
pub struct DefaultPrompter;

impl Prompter for DefaultPrompter {
    fn overrides(&self, defaults: GenParams) -> GenParams {
        tracing::info!("interactive prompt not bundled; keeping configured generation values");
        defaults
    }
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use mimic::pipeline::build_corpus;
use mimic_server::ServerConfig;
use mimic_types::{GenParams, Velocity};

mod prompt;

use prompt::{DefaultPrompter, Prompter};

#[derive(Parser, Debug)]
#[command(name = "mimic", version)]
#[command(about = "Synthetic developer-analytics simulator: fabricates a plausible \
development history from a seed roster and serves it over a vendor-shaped HTTP API")]
struct Cli {
    /// Run mode: generate-and-serve, or a fast non-serving preview.
    /// (`replay` is reserved and not yet implemented.)
    #[arg(long, env = "MIMIC_MODE", value_enum)]
    mode: Mode,

    /// Path to the seed document (.json, .yaml, or .yml).
    #[arg(long = "seed", env = "MIMIC_SEED")]
    seed: PathBuf,

    /// HTTP listen port.
    #[arg(long, env = "MIMIC_PORT", default_value_t = 8080)]
    port: u16,

    /// Generation window length in days, ending now.
    #[arg(long, env = "MIMIC_DAYS", default_value_t = 30)]
    days: u32,

    /// Commit-rate knob: low (5/h), medium (25/h), or high (50/h).
    #[arg(long, env = "MIMIC_VELOCITY", value_enum, default_value = "medium")]
    velocity: VelocityArg,

    /// Replicate the seed roster up to this many developers.
    #[arg(long, env = "MIMIC_DEVELOPERS")]
    developers: Option<usize>,

    /// Generation window length in months (30 days each); overrides --days.
    #[arg(long, env = "MIMIC_MONTHS")]
    months: Option<u32>,

    /// Global cap on generated commits.
    #[arg(long = "max-commits", env = "MIMIC_MAX_COMMITS")]
    max_commits: Option<u64>,

    /// Ask the interactive prompt for the generation overrides instead of
    /// taking them from flags.
    #[arg(
        long,
        env = "MIMIC_INTERACTIVE",
        conflicts_with_all = ["developers", "months", "max_commits"]
    )]
    interactive: bool,

    /// Override the generation RNG seed (default: derived from start time).
    #[arg(long = "rng-seed", env = "MIMIC_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Pin the generation reference instant (RFC 3339). Testing hook: with
    /// --rng-seed this makes whole runs byte-reproducible.
    #[arg(long = "now", env = "MIMIC_NOW", hide = true)]
    now: Option<String>,

    /// Basic-auth username the API requires.
    #[arg(long = "api-key", env = "MIMIC_API_KEY", default_value = "mimic-dev-key")]
    api_key: String,

    /// Rate-limit token-bucket capacity per window.
    #[arg(long = "rate-limit", env = "MIMIC_RATE_LIMIT", default_value_t = 120)]
    rate_limit: u32,

    /// Rate-limit refill window (e.g. 60s, 2m).
    #[arg(long = "rate-window", env = "MIMIC_RATE_WINDOW", default_value = "60s")]
    rate_window: String,

    /// Per-request timeout (e.g. 30s).
    #[arg(long = "request-timeout", env = "MIMIC_REQUEST_TIMEOUT", default_value = "30s")]
    request_timeout: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Runtime,
    Preview,
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VelocityArg {
    Low,
    Medium,
    High,
}

impl From<VelocityArg> for Velocity {
    fn from(value: VelocityArg) -> Self {
        match value {
            VelocityArg::Low => Velocity::Low,
            VelocityArg::Medium => Velocity::Medium,
            VelocityArg::High => Velocity::High,
        }
    }
}

/// Failures split by exit code: configuration problems exit 1, runtime
/// problems exit 2.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(String),
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

fn main() -> ExitCode {
    // clap's own exit code for bad flags is 2; the contract says 1 for any
    // configuration failure, so parse errors are mapped by hand.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
        Err(help) => {
            // --help / --version print to stdout and exit cleanly.
            print!("{help}");
            return ExitCode::SUCCESS;
        }
    };

    init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Config(message)) => {
            eprintln!("error: {message}");
            ExitCode::from(1)
        }
        Err(CliError::Runtime(error)) => {
            eprintln!("error: {error:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    validate(&cli)?;

    let mut params = GenParams {
        days: cli.days,
        velocity: cli.velocity.into(),
        developers: cli.developers,
        max_commits_total: cli.max_commits,
        ..GenParams::default()
    };
    if let Some(months) = cli.months {
        params = params.with_months(months);
    }
    if cli.interactive {
        // The prompt itself ships separately; the seam keeps the lifecycle
        // identical either way.
        params = DefaultPrompter.overrides(params);
    }

    let rng_seed = cli
        .rng_seed
        .unwrap_or_else(|| Utc::now().timestamp_millis() as u64);
    let now = match &cli.now {
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| CliError::Config(format!("invalid --now {raw:?}: {err}")))?,
        None => Utc::now(),
    };

    let seed = mimic_seed::load_seed(&cli.seed, params.developers)
        .map_err(|err| CliError::Config(err.to_string()))?;
    for warning in &seed.warnings {
        warn!("{warning}");
    }

    match cli.mode {
        Mode::Replay => Err(CliError::Config(
            "replay mode is reserved and not yet implemented".to_string(),
        )),
        Mode::Preview => {
            let mut stdout = std::io::stdout().lock();
            mimic::preview::run_preview(&seed, &params, rng_seed, now, &mut stdout)
                .map_err(CliError::Runtime)?;
            Ok(())
        }
        Mode::Runtime => run_runtime(&cli, &seed, params, rng_seed, now),
    }
}

fn validate(cli: &Cli) -> Result<(), CliError> {
    if cli.port == 0 {
        return Err(CliError::Config("port must be in 1..=65535".to_string()));
    }
    if cli.days == 0 {
        return Err(CliError::Config("days must be positive".to_string()));
    }
    if cli.months == Some(0) {
        return Err(CliError::Config("months must be positive".to_string()));
    }
    if cli.max_commits == Some(0) {
        return Err(CliError::Config("max-commits must be positive".to_string()));
    }
    if cli.developers == Some(0) {
        return Err(CliError::Config("developers must be positive".to_string()));
    }
    Ok(())
}

fn parse_duration(label: &str, raw: &str) -> Result<Duration, CliError> {
    humantime::parse_duration(raw)
        .map_err(|err| CliError::Config(format!("invalid {label} {raw:?}: {err}")))
}

fn run_runtime(
    cli: &Cli,
    seed: &mimic_seed::LoadedSeed,
    params: GenParams,
    rng_seed: u64,
    now: chrono::DateTime<Utc>,
) -> Result<(), CliError> {
    let server_config = ServerConfig {
        api_key: cli.api_key.clone(),
        rate_limit_capacity: cli.rate_limit,
        rate_limit_window: parse_duration("rate-window", &cli.rate_window)?,
        request_timeout: parse_duration("request-timeout", &cli.request_timeout)?,
    };

    // Generation happens before the listener opens; a failure here aborts
    // without any partial server start.
    let corpus = build_corpus(seed, params, rng_seed, now)
        .context("corpus generation failed")
        .map_err(CliError::Runtime)?;
    let corpus = Arc::new(corpus);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
        .map_err(CliError::Runtime)?;

    runtime
        .block_on(serve_until_signal(cli.port, corpus, server_config))
        .map_err(CliError::Runtime)?;
    Ok(())
}

/// Grace period granted to in-flight requests after the first signal.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

async fn serve_until_signal(
    port: u16,
    corpus: Arc<mimic_store::Corpus>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    let addr = listener.local_addr().context("listener has no address")?;

    let app = mimic_server::build(corpus, &config);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(mimic_server::serve(listener, app, async {
        let _ = shutdown_rx.await;
    }));

    info!(%addr, "mimic is serving");
    shutdown_signal().await;
    info!("shutdown signal received, draining in-flight requests");
    let _ = shutdown_tx.send(());

    tokio::select! {
        joined = server => joined.context("server task panicked")??,
        _ = shutdown_signal() => {
            info!("second signal received, exiting immediately");
        }
        _ = tokio::time::sleep(DRAIN_GRACE) => {
            warn!("grace period expired before drain completed");
        }
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM. Callable more than once: the second await
/// during the grace period forces immediate exit.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

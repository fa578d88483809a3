//! trailwatch CLI: replay tick files through the engine, query stored
//! signals, and print the effective configuration.
//!
//! Commands:
//! - `replay`: prime from history (optional), replay ticks, persist signals
//! - `signals`: list recent stored signals for a symbol
//! - `config`: print the effective config and its parameter fingerprint

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trailwatch_core::{Signal, SourceMode};
use trailwatch_relay::{
    load_history, load_ticks, mailer_for, AppConfig, Relay, SignalStore, DEFAULT_RECENT_LIMIT,
};

#[derive(Parser)]
#[command(
    name = "trailwatch",
    about = "trailwatch: ATR trailing-stop signals from live ticks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a tick CSV (symbol,price,ts[,size]) through the engine.
    Replay {
        /// Tick file.
        #[arg(long)]
        ticks: PathBuf,

        /// Closed-bar history CSV (symbol,t,o,h,l,c[,v]) used to prime engines.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print signals found while priming from history.
        #[arg(long, default_value_t = false)]
        emit_warmup: bool,

        /// Replay symbols one after another instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// List the most recent stored signals for a symbol, newest first.
    Signals {
        #[arg(long)]
        symbol: String,

        /// Number of rows (1..=2000).
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the effective configuration as TOML.
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// Config file plus per-parameter overrides (flag or environment).
#[derive(Args)]
struct ConfigArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// ATR multiplier.
    #[arg(long, env = "UT_A")]
    sensitivity: Option<f64>,

    /// ATR period.
    #[arg(long, env = "UT_C")]
    period: Option<usize>,

    /// Use the averaged (Heikin-Ashi style) price as the indicator source.
    #[arg(long, env = "UT_USE_HEIKIN", value_parser = BoolishValueParser::new())]
    use_heikin: Option<bool>,

    /// Bar width in milliseconds.
    #[arg(long, env = "BUCKET_WIDTH_MS")]
    bucket_width_ms: Option<i64>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => AppConfig::default(),
        };

        let engine = &mut config.engine;
        if let Some(a) = self.sensitivity {
            engine.sensitivity = a;
        }
        if let Some(c) = self.period {
            engine.period = c;
        }
        if let Some(heikin) = self.use_heikin {
            engine.source_mode = if heikin {
                SourceMode::AveragedPrice
            } else {
                SourceMode::Close
            };
        }
        if let Some(w) = self.bucket_width_ms {
            engine.bucket_width_ms = w;
        }
        engine.validate().context("invalid engine parameters")?;
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            ticks,
            history,
            emit_warmup,
            sequential,
            config,
        } => run_replay(
            &config.resolve()?,
            &ticks,
            history.as_deref(),
            emit_warmup,
            sequential,
        ),
        Commands::Signals {
            symbol,
            limit,
            config,
        } => run_signals(&config.resolve()?, &symbol, limit),
        Commands::Config { config } => run_config(&config.resolve()?),
    }
}

fn run_replay(
    config: &AppConfig,
    ticks_path: &Path,
    history_path: Option<&Path>,
    emit_warmup: bool,
    sequential: bool,
) -> Result<()> {
    let relay = Relay::from_config(config, mailer_for(&config.smtp))?.with_parallelism(!sequential);

    if let Some(path) = history_path {
        let (history, stats) =
            load_history(path).with_context(|| format!("reading history {}", path.display()))?;
        info!(accepted = stats.accepted, skipped = stats.rejected, "history loaded");
        for primed in relay.prime_all(&history) {
            println!(
                "primed {}: {} bars, {} signals in history",
                primed.symbol,
                primed.bars,
                primed.warmup_signals.len()
            );
            if emit_warmup {
                for sig in &primed.warmup_signals {
                    println!("  warmup {}", format_signal(&primed.symbol, sig));
                }
            }
        }
    }

    let (ticks, stats) =
        load_ticks(ticks_path).with_context(|| format!("reading ticks {}", ticks_path.display()))?;
    if stats.rejected > 0 {
        warn!(dropped = stats.rejected, "invalid ticks dropped");
    }

    let summaries = relay.replay(ticks);
    for summary in &summaries {
        println!(
            "{}: {} ticks, {} bars closed, {} signals",
            summary.symbol,
            summary.ticks,
            summary.bars_closed,
            summary.signals.len()
        );
        for sig in &summary.signals {
            println!("  {}", format_signal(&summary.symbol, sig));
        }
    }
    println!("Signals stored in: {}", relay.store().path().display());

    Ok(())
}

fn run_signals(config: &AppConfig, symbol: &str, limit: usize) -> Result<()> {
    let store = SignalStore::new(config.store.path.clone(), config.timeframe(), config.engine);
    let symbol = trailwatch_relay::normalize_symbol(symbol).context("symbol must not be empty")?;
    let records = store.recent(&symbol, Some(limit))?;

    if records.is_empty() {
        println!("No stored {} signals for {symbol}", config.timeframe());
        return Ok(());
    }
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

fn run_config(config: &AppConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.smtp.pass.is_some() {
        shown.smtp.pass = Some("********".into());
    }
    print!("{}", shown.to_toml().context("serializing config")?);
    println!();
    println!("# params_hash = {}", config.engine.fingerprint());
    println!("# timeframe = {}", config.timeframe());
    Ok(())
}

fn format_signal(symbol: &str, sig: &Signal) -> String {
    let when = DateTime::<Utc>::from_timestamp_millis(sig.time)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| sig.time.to_string());
    format!(
        "{} {symbol} @ {:.2} stop={:.2} {when}",
        sig.side, sig.price, sig.stop_level
    )
}

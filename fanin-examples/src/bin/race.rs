use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use fanin::{FanIn, FanInConfig, Signal, Strategy, create_signal};
use fanin_config::{load_config_from, profile_from_env};
use fanin_telemetry::tracing::init_tracing;
use tracing::{error, info};

// Races a number of signals where only one of them ever fires
#[derive(Debug, Parser)]
#[command(name = "race", version, about)]
struct AppArgs {
    /// Number of signals to combine
    #[arg(long, default_value = "3")]
    inputs: usize,
    /// Index of the signal that fires (default: the last one)
    #[arg(long)]
    winner: Option<usize>,
    /// Delay in milliseconds before the winning signal fires
    #[arg(long, default_value = "5")]
    winner_delay_ms: u64,
    /// Strategy used to race the signals, overriding the loaded configuration
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    /// Directory holding `base.yaml` and profile overrides (optional)
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Profile whose file overrides `base.yaml` (default: `APP_PROFILE`)
    #[arg(long, requires = "config_dir")]
    profile: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    FanOut,
    Pairwise,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::FanOut => Strategy::FanOut,
            StrategyArg::Pairwise => Strategy::Pairwise,
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing(env!("CARGO_BIN_NAME"));

    if let Err(e) = main_impl().await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn main_impl() -> anyhow::Result<()> {
    let args = AppArgs::parse();

    let mut config = match &args.config_dir {
        Some(directory) => {
            let profile = match args.profile.clone() {
                Some(profile) => Some(profile),
                None => profile_from_env()?,
            };
            load_config_from::<FanInConfig>(directory, profile.as_deref())
                .with_context(|| format!("loading configuration from {}", directory.display()))?
        }
        None => FanInConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }
    config.validate()?;

    let winner = args.winner.unwrap_or(args.inputs.saturating_sub(1));
    if args.inputs > 0 && winner >= args.inputs {
        anyhow::bail!("winner index {winner} is out of range for {} inputs", args.inputs);
    }

    info!(
        inputs = args.inputs,
        winner,
        strategy = %config.strategy,
        "starting race"
    );

    let fan_in = FanIn::new(config);
    let (txs, inputs): (Vec<_>, Vec<Signal>) = (0..args.inputs).map(|_| create_signal()).unzip();

    let started = Instant::now();
    let output = fan_in.combine(inputs);

    if let Some(tx) = txs.get(winner).cloned() {
        let delay = Duration::from_millis(args.winner_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tx.fire();
        });
    }

    output.wait().await;
    info!(elapsed = ?started.elapsed(), "output fired");

    fan_in.tracker().wait_idle().await;
    info!(
        spawned = fan_in.tracker().spawned(),
        live = fan_in.tracker().live(),
        "all watchers exited"
    );

    Ok(())
}

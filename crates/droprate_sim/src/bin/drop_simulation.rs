//! Seeded drop rate simulation.
//!
//! Runs a full simulated run through the drop rate service and prints the
//! run report with a short summary.
//!
//! Run with: cargo run -p droprate_sim --bin drop_simulation -- --players 4

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use droprate_engine::{DropRateConfig, DropRateResult, DropRateService, SharedConfig};
use droprate_sim::{run_simulation, SimulationConfig, SimulationOutcome};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "drop_simulation")]
#[command(about = "Simulates a run and reports drop rate fairness")]
struct Args {
    /// Drop rate config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Players in the run
    #[arg(short, long, default_value_t = 1)]
    players: u32,

    /// Stages to simulate
    #[arg(long, default_value_t = 5)]
    stages: u32,

    /// Minutes per stage
    #[arg(long, default_value_t = 6.0)]
    stage_minutes: f64,

    /// Kills per minute
    #[arg(long, default_value_t = 20.0)]
    kills_per_minute: f64,

    /// Simulate with the swarm artifact enabled
    #[arg(long)]
    swarm: bool,

    /// Fraction of kills that are elites
    #[arg(long, default_value_t = 0.1)]
    elite_fraction: f64,

    /// Kills that happen while a droplet is still falling
    #[arg(long, default_value_t = 3)]
    landing_delay: usize,

    /// Pin the base drop chance for the whole run (percent)
    #[arg(long)]
    manual_drop_rate: Option<f32>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(outcome) => {
            print_outcome(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Simulation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> DropRateResult<SimulationOutcome> {
    let config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading drop rate config");
            DropRateConfig::from_toml_file(path)?
        }
        None => DropRateConfig::default(),
    };
    let service = DropRateService::new(SharedConfig::new(config));

    let simulation = SimulationConfig {
        seed: args.seed,
        player_count: args.players,
        stages: args.stages,
        stage_minutes: args.stage_minutes,
        kills_per_minute: args.kills_per_minute,
        swarm_active: args.swarm,
        elite_fraction: args.elite_fraction,
        landing_delay_kills: args.landing_delay,
        manual_drop_chance: args.manual_drop_rate,
        ..SimulationConfig::default()
    };

    run_simulation(&simulation, &service)
}

fn print_outcome(outcome: &SimulationOutcome) {
    if let Some(report) = outcome.report.clone().into_report() {
        println!("{report}");
    } else {
        println!("No kills recorded.");
    }

    println!();
    println!("Kills simulated:       {}", outcome.kills);
    println!("Successful rolls:      {}", outcome.successful_rolls);
    println!("Items counted:         {}", outcome.items_counted);
    println!("Protected kills:       {}", outcome.protected_kills);
    println!("Longest drought:       {} kills", outcome.longest_drought);
}

//! # DROPRATE Run Simulator
//!
//! Feeds a seeded stream of kills and pickups through a
//! [`DropRateService`] the way the host engine would.
//!
//! ## The Kill Stream
//!
//! ```text
//! for each stage:
//!     begin_stage(players)
//!     for each kill:
//!         land droplets whose delay expired ──> on_pickup()
//!         on_kill() ──> roll ──> success? queue droplet (lands N kills later)
//!         maybe drop gold ──> on_pickup()  (ignored by the tracker)
//! flush remaining droplets ──> end_run()
//! ```
//!
//! A non-zero landing delay reproduces the host's falling droplets: kills
//! keep registering opportunities while the item is still in the air.

#![deny(missing_docs)]
#![deny(unsafe_code)]

use std::collections::VecDeque;

use droprate_engine::{
    DropRateError, DropRateResult, DropRateService, KillContext, PickupInfo, ReportOutcome,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// The host's stock drop chance for a regular enemy, in percent.
pub const NATIVE_BASE_DROP_CHANCE: f32 = 5.0;

/// Host drop chance multiplier for elite enemies.
pub const ELITE_NATIVE_MULTIPLIER: f32 = 3.0;

/// Parameters of one simulated run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// RNG seed.
    pub seed: u64,
    /// Players in the run.
    pub player_count: u32,
    /// Number of stages.
    pub stages: u32,
    /// Length of each stage in minutes.
    pub stage_minutes: f64,
    /// Kills per minute across the party.
    pub kills_per_minute: f64,
    /// Whether the swarm artifact is enabled.
    pub swarm_active: bool,
    /// Fraction of kills that are elites (0-1).
    pub elite_fraction: f64,
    /// Kills that happen while a droplet is still falling.
    pub landing_delay_kills: usize,
    /// Chance per kill that a gold pickup lands as well (0-1).
    pub currency_fraction: f64,
    /// Base drop chance pinned for the whole run, in percent.
    pub manual_drop_chance: Option<f32>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            player_count: 1,
            stages: 5,
            stage_minutes: 6.0,
            kills_per_minute: 20.0,
            swarm_active: false,
            elite_fraction: 0.1,
            landing_delay_kills: 3,
            currency_fraction: 0.05,
            manual_drop_chance: None,
        }
    }
}

impl SimulationConfig {
    /// Checks that rates and fractions are usable.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidConfig`] if a fraction is outside 0-1
    /// or not finite, or if the stage length or kill rate is negative or not
    /// finite.
    pub fn validate(&self) -> DropRateResult<()> {
        for (name, value) in [
            ("elite_fraction", self.elite_fraction),
            ("currency_fraction", self.currency_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DropRateError::InvalidConfig(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("stage_minutes", self.stage_minutes),
            ("kills_per_minute", self.kills_per_minute),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DropRateError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// What happened during a simulated run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationOutcome {
    /// Run report from the service.
    pub report: ReportOutcome,
    /// Kills simulated.
    pub kills: u64,
    /// Kills whose chance was raised by bad luck protection.
    pub protected_kills: u64,
    /// Rolls that succeeded.
    pub successful_rolls: u64,
    /// Item pickups the service counted.
    pub items_counted: u64,
    /// Longest run of kills without a successful roll.
    pub longest_drought: u64,
}

struct FallingDroplet {
    lands_at_kill: u64,
    pickup: PickupInfo,
}

/// Runs one simulated run against `service`.
///
/// # Errors
///
/// Returns [`DropRateError::InvalidConfig`] if `config` fails
/// [`SimulationConfig::validate`], and propagates errors from the service
/// (zero players, an out of range manual drop chance).
pub fn run_simulation(
    config: &SimulationConfig,
    service: &DropRateService,
) -> DropRateResult<SimulationOutcome> {
    config.validate()?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut falling: VecDeque<FallingDroplet> = VecDeque::new();
    let item = PickupInfo::new(0, "ITEM_SIMULATED_NAME");
    let gold = PickupInfo::new(15, "PICKUP_GOLD");

    let mut kills = 0u64;
    let mut protected_kills = 0u64;
    let mut successful_rolls = 0u64;
    let mut items_counted = 0u64;
    let mut drought = 0u64;
    let mut longest_drought = 0u64;
    let mut elapsed_seconds = 0.0f64;

    service.begin_run(config.player_count)?;
    if let Some(chance) = config.manual_drop_chance {
        service.set_manual_drop_chance(chance)?;
    }

    let kills_per_stage = (config.stage_minutes * config.kills_per_minute).round() as u64;
    let seconds_per_kill = if config.kills_per_minute > 0.0 {
        60.0 / config.kills_per_minute
    } else {
        0.0
    };

    for stage in 1..=config.stages {
        let base = service.begin_stage(config.player_count)?;
        debug!(stage, drop_chance = base, "Simulating stage");

        for _ in 0..kills_per_stage {
            while falling.front().is_some_and(|d| d.lands_at_kill <= kills) {
                if let Some(droplet) = falling.pop_front() {
                    items_counted += u64::from(service.on_pickup(&droplet.pickup));
                }
            }

            elapsed_seconds += seconds_per_kill;
            let native_drop_chance = if rng.gen_bool(config.elite_fraction) {
                NATIVE_BASE_DROP_CHANCE * ELITE_NATIVE_MULTIPLIER
            } else {
                NATIVE_BASE_DROP_CHANCE
            };

            let outcome = service.on_kill(&KillContext {
                is_swarm_active: config.swarm_active,
                native_drop_chance,
                native_base_drop_chance: NATIVE_BASE_DROP_CHANCE,
                elapsed_seconds,
            })?;
            kills += 1;
            protected_kills += u64::from(outcome.bad_luck_protected);

            if rng.gen::<f32>() * 100.0 < outcome.drop_chance {
                successful_rolls += 1;
                longest_drought = longest_drought.max(drought);
                drought = 0;
                falling.push_back(FallingDroplet {
                    lands_at_kill: kills + config.landing_delay_kills as u64,
                    pickup: item.clone(),
                });
            } else {
                drought += 1;
            }

            if rng.gen_bool(config.currency_fraction) {
                service.on_pickup(&gold);
            }
        }
    }

    for droplet in falling.drain(..) {
        items_counted += u64::from(service.on_pickup(&droplet.pickup));
    }
    longest_drought = longest_drought.max(drought);

    let report = service.end_run(elapsed_seconds, config.stages.max(1))?;

    Ok(SimulationOutcome {
        report,
        kills,
        protected_kills,
        successful_rolls,
        items_counted,
        longest_drought,
    })
}

//! # Drop Rate Computation
//!
//! **Stateless drop chance transforms**
//!
//! This module turns configuration, player count, and the host's own drop
//! chance into the percentage the host rolls against:
//! - Player-aware base chance (split between players, floored at a minimum)
//! - Host-relative scaling (respects per-enemy and per-artifact modifiers)
//! - Bad luck protection (boost once enough unconverted chance piled up)
//!
//! ## Per-Kill Pipeline
//!
//! ```text
//! base chance ──> compute_drop_chance() ──> register opportunity
//!                                                │
//!                         needs_bad_luck_protection()?
//!                                 │ yes
//!                                 ▼
//!                  bad_luck_protected_drop_chance()  (capped at 90%)
//! ```
//!
//! The computer holds no session state; fairness aggregates are passed in
//! from [`FairnessTracker::totals`](crate::tracker::FairnessTracker::totals).

use tracing::debug;

use crate::config::{DropRateConfig, SharedConfig};
use crate::error::{DropRateError, DropRateResult};
use crate::tracker::SessionTotals;

/// Fraction of the swarm enemy-count bonus that is kept.
pub const SWARM_BONUS_RETAINED: f32 = 0.6;

/// The host's stock drop chance; host chances are normalized against it.
pub const REFERENCE_BASE_DROP_CHANCE: f32 = 5.0;

/// Unconverted chance (in percent) that must accumulate before protection.
pub const BAD_LUCK_THRESHOLD: f64 = 100.0;

/// Hard cap on a protected drop chance, in percent.
pub const MAX_PROTECTED_DROP_CHANCE: f64 = 90.0;

/// Drops per minute below which a player counts as unlucky.
pub const MIN_DROPS_PER_MINUTE: f64 = 0.8;

/// Computes drop chances from the live configuration.
#[derive(Clone, Debug, Default)]
pub struct RateComputer {
    config: SharedConfig,
}

impl RateComputer {
    /// Creates a computer reading from `config`.
    #[must_use]
    pub fn new(config: SharedConfig) -> Self {
        Self { config }
    }

    /// Base drop chance for the current party size.
    ///
    /// The configured base chance is divided between `player_count` players,
    /// scaled by the multiplier, and floored at the minimum. With player
    /// scaling disabled the party is treated as a single player.
    ///
    /// `previous_chance` is the chance currently in use; a change is logged.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if `player_count` is 0.
    #[allow(clippy::float_cmp)]
    pub fn player_aware_base_drop_chance(
        &self,
        player_count: u32,
        previous_chance: f32,
    ) -> DropRateResult<f32> {
        if player_count == 0 {
            return Err(DropRateError::invalid_argument(
                "player_count",
                player_count,
                "a run needs at least one player",
            ));
        }

        let config = self.config.snapshot();
        let effective_players = if config.enable_player_scaling {
            player_count
        } else {
            1
        };

        let player_multiplier = 1.0 / effective_players as f32;
        let multiplier = player_multiplier * config.drop_chance_multiplier;
        let chance = (config.base_drop_chance * multiplier).max(config.minimum_drop_chance);

        if chance != previous_chance {
            debug!(
                drop_chance = chance,
                base = config.base_drop_chance,
                multiplier = config.drop_chance_multiplier,
                player_count,
                minimum = config.minimum_drop_chance,
                "Using new drop rate"
            );
        }

        Ok(chance)
    }

    /// Rescales `plugin_drop_chance` by the host's own chance for this kill.
    ///
    /// The host chance already encodes per-enemy and per-artifact factors.
    /// Expressing it relative to its own base (and the base relative to the
    /// stock 5%) carries those factors over. With swarms active the host
    /// bonus for the doubled enemy count is cut to 60%.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if
    /// `native_base_drop_chance` is 0.
    pub fn compute_drop_chance(
        &self,
        is_swarm_active: bool,
        native_drop_chance: f32,
        native_base_drop_chance: f32,
        plugin_drop_chance: f32,
    ) -> DropRateResult<f32> {
        if native_base_drop_chance == 0.0 {
            return Err(DropRateError::invalid_argument(
                "native_base_drop_chance",
                native_base_drop_chance,
                "host base chance is used as a divisor",
            ));
        }

        let config = self.config.snapshot();
        let dampened = Self::dampens_swarm(&config, is_swarm_active, native_drop_chance);
        let swarm_adjusted = if dampened {
            (native_drop_chance - native_base_drop_chance) * SWARM_BONUS_RETAINED
                + native_base_drop_chance
        } else {
            native_drop_chance
        };

        let base_modifier = native_base_drop_chance / REFERENCE_BASE_DROP_CHANCE;
        let enemy_modifier = swarm_adjusted / native_base_drop_chance;

        Ok(plugin_drop_chance * base_modifier * enemy_modifier)
    }

    fn dampens_swarm(
        config: &DropRateConfig,
        is_swarm_active: bool,
        native_drop_chance: f32,
    ) -> bool {
        config.enable_swarms_scaling && is_swarm_active && native_drop_chance != 0.0
    }

    /// Whether the next roll should get a bad luck boost.
    ///
    /// Requires protection to be enabled, at least 100% of unconverted chance
    /// since the last drop, and a non-zero roll. The player must then be
    /// behind on expected items or below 0.8 drops per minute.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if the drops-per-minute
    /// check is reached and `elapsed_seconds` is not positive and finite.
    pub fn needs_bad_luck_protection(
        &self,
        actual_drop_chance: f32,
        elapsed_seconds: f64,
        totals: &SessionTotals,
    ) -> DropRateResult<bool> {
        let config = self.config.snapshot();
        if !config.enable_bad_luck_protection
            || totals.cumulative_drop_chance < BAD_LUCK_THRESHOLD
            || actual_drop_chance <= 0.0
        {
            return Ok(false);
        }

        let drops = totals.total_item_drops as f64;
        if totals.expected_items > drops {
            return Ok(true);
        }

        if !elapsed_seconds.is_finite() || elapsed_seconds <= 0.0 {
            return Err(DropRateError::invalid_argument(
                "elapsed_seconds",
                elapsed_seconds,
                "run time is used as a divisor for drops per minute",
            ));
        }
        let drops_per_minute = drops / (elapsed_seconds / 60.0);
        Ok(drops_per_minute < MIN_DROPS_PER_MINUTE)
    }

    /// Adds the chance accumulated past the threshold, capped at 90%.
    #[must_use]
    pub fn bad_luck_protected_drop_chance(drop_chance: f32, cumulative_drop_chance: f64) -> f32 {
        let boost = cumulative_drop_chance - BAD_LUCK_THRESHOLD;
        let protected = (f64::from(drop_chance) + boost).min(MAX_PROTECTED_DROP_CHANCE) as f32;
        debug!(
            from = drop_chance,
            to = protected,
            "Bad luck protection triggered"
        );
        protected
    }
}

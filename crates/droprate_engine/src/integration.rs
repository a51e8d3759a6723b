//! # Integration API for the Host Engine
//!
//! **The single entry point for engine hooks.**
//!
//! The host adapter (kill hooks, pickup hooks, run lifecycle, console
//! commands) calls into [`DropRateService`]; it never touches the rate
//! computer or the tracker directly.
//!
//! ## The Kill Path
//!
//! ```text
//! Host kill hook ──> on_kill(KillContext) ──> compute_drop_chance()
//!                                                   │
//!                                       register_drop_opportunity()
//!                                                   │
//!                                     needs_bad_luck_protection()?
//!                                          │ yes          │ no
//!                                          ▼              ▼
//!                              protected chance     computed chance
//!                                          └──────┬───────┘
//!                                                 ▼
//!                                   KillOutcome back to the host roll
//! ```
//!
//! ## Run Lifecycle
//!
//! ```text
//! begin_run(players) ─> begin_stage(players) ─> on_kill / on_pickup ... ─> end_run()
//!        │                     ▲                                             │
//!        └─ clears override    └──────────── next stage ─────────────────────┘
//! ```

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::SharedConfig;
use crate::error::{DropRateError, DropRateResult};
use crate::pickup::PickupInfo;
use crate::rate::RateComputer;
use crate::report::ReportOutcome;
use crate::tracker::{FairnessTracker, SessionTotals, TrackerState};

// ============================================================================
// Public Types for the Host Adapter
// ============================================================================

/// What the host knows about a kill that rolls for loot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KillContext {
    /// Whether the swarm artifact is enabled for this run.
    pub is_swarm_active: bool,
    /// The host's own drop chance for this kill, in percent.
    pub native_drop_chance: f32,
    /// The host's base chance before per-enemy factors, in percent.
    pub native_base_drop_chance: f32,
    /// Run stopwatch at the time of the kill.
    pub elapsed_seconds: f64,
}

/// Chance to hand back to the host roll.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KillOutcome {
    /// Final drop chance in percent.
    pub drop_chance: f32,
    /// Whether bad luck protection raised the chance.
    pub bad_luck_protected: bool,
}

/// Per-run settings owned by the service.
#[derive(Clone, Copy, Debug)]
struct RunSettings {
    player_count: u32,
    drop_chance: f32,
    manual_override: bool,
}

// ============================================================================
// The Service
// ============================================================================

/// Drop rate service.
///
/// ## Thread Safety
///
/// `DropRateService` is `Send + Sync`. The tracker lock is held for the
/// whole compute, register, and correct sequence of a kill, so concurrent
/// kill and pickup hooks always see consistent aggregates.
#[derive(Debug)]
pub struct DropRateService {
    /// Stateless rate computer over the live config.
    rates: RateComputer,
    /// Session aggregates.
    tracker: Mutex<FairnessTracker>,
    /// Player count, current base chance, override flag.
    run: RwLock<RunSettings>,
}

impl DropRateService {
    /// Creates a service reading from `config`.
    ///
    /// The base chance starts at the configured base drop chance for a
    /// single player.
    #[must_use]
    pub fn new(config: SharedConfig) -> Self {
        let initial = config.snapshot().base_drop_chance;
        Self {
            rates: RateComputer::new(config),
            tracker: Mutex::new(FairnessTracker::new()),
            run: RwLock::new(RunSettings {
                player_count: 1,
                drop_chance: initial,
                manual_override: false,
            }),
        }
    }

    // ========================================================================
    // Session Boundaries
    // ========================================================================

    /// Starts a run: resets the tracker, drops any manual override, and
    /// recomputes the base chance for `player_count` players.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if `player_count` is 0; the
    /// service is left untouched.
    pub fn begin_run(&self, player_count: u32) -> DropRateResult<f32> {
        let mut run = self.run.write();
        let chance = self
            .rates
            .player_aware_base_drop_chance(player_count, run.drop_chance)?;

        {
            let mut tracker = self.tracker.lock();
            tracker.reset();
            tracker.begin();
        }
        *run = RunSettings {
            player_count,
            drop_chance: chance,
            manual_override: false,
        };

        info!(player_count, drop_chance = chance, "Run started");
        Ok(chance)
    }

    /// Recomputes the base chance at a stage start.
    ///
    /// A manual override stays in place until the next run.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if `player_count` is 0.
    pub fn begin_stage(&self, player_count: u32) -> DropRateResult<f32> {
        let mut run = self.run.write();
        if run.manual_override {
            debug!(drop_chance = run.drop_chance, "Manual drop rate kept for stage");
            return Ok(run.drop_chance);
        }

        run.drop_chance = self
            .rates
            .player_aware_base_drop_chance(player_count, run.drop_chance)?;
        run.player_count = player_count;
        Ok(run.drop_chance)
    }

    /// Builds the run report, logs it, and resets the tracker.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if kills were recorded and
    /// `elapsed_seconds` is not positive and finite; the tracker is kept so
    /// the caller can retry.
    pub fn end_run(&self, elapsed_seconds: f64, stage_number: u32) -> DropRateResult<ReportOutcome> {
        let mut tracker = self.tracker.lock();
        let outcome = tracker.generate_report(elapsed_seconds, stage_number)?;
        log_report(&outcome);
        tracker.reset();
        Ok(outcome)
    }

    /// Builds and logs the report for the run so far.
    ///
    /// # Errors
    ///
    /// See [`DropRateService::end_run`].
    pub fn report(&self, elapsed_seconds: f64, stage_number: u32) -> DropRateResult<ReportOutcome> {
        let outcome = self
            .tracker
            .lock()
            .generate_report(elapsed_seconds, stage_number)?;
        log_report(&outcome);
        Ok(outcome)
    }

    // ========================================================================
    // Event Hooks
    // ========================================================================

    /// Runs the per-kill pipeline and returns the chance the host should
    /// roll against.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if the host base chance is
    /// 0, the computed chance is negative or not finite, or the
    /// drops-per-minute check needs a positive duration and didn't get one.
    /// In the last case the opportunity has already been recorded.
    pub fn on_kill(&self, kill: &KillContext) -> DropRateResult<KillOutcome> {
        let base_chance = self.run.read().drop_chance;
        let mut tracker = self.tracker.lock();

        let drop_chance = self.rates.compute_drop_chance(
            kill.is_swarm_active,
            kill.native_drop_chance,
            kill.native_base_drop_chance,
            base_chance,
        )?;
        tracker.register_drop_opportunity(drop_chance)?;

        let totals = tracker.totals();
        if self
            .rates
            .needs_bad_luck_protection(drop_chance, kill.elapsed_seconds, &totals)?
        {
            return Ok(KillOutcome {
                drop_chance: RateComputer::bad_luck_protected_drop_chance(
                    drop_chance,
                    totals.cumulative_drop_chance,
                ),
                bad_luck_protected: true,
            });
        }

        Ok(KillOutcome {
            drop_chance,
            bad_luck_protected: false,
        })
    }

    /// Records a landed pickup. Returns whether it counted as an item.
    pub fn on_pickup(&self, pickup: &PickupInfo) -> bool {
        let is_item = pickup.is_real_item();
        self.tracker.lock().register_item_drop(is_item);
        is_item
    }

    // ========================================================================
    // Manual Override
    // ========================================================================

    /// Pins the base chance to `drop_chance` until the next run.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] unless `drop_chance` is a
    /// finite percentage between 0 and 100.
    pub fn set_manual_drop_chance(&self, drop_chance: f32) -> DropRateResult<()> {
        if !drop_chance.is_finite() || !(0.0..=100.0).contains(&drop_chance) {
            return Err(DropRateError::invalid_argument(
                "drop_chance",
                drop_chance,
                "must be a percentage between 0 and 100",
            ));
        }

        let mut run = self.run.write();
        run.drop_chance = drop_chance;
        run.manual_override = true;
        warn!(drop_chance, "Drop rate manually overridden");
        Ok(())
    }

    /// Drops the manual override and recomputes the player-aware chance.
    ///
    /// # Errors
    ///
    /// Propagates errors from the player-aware computation.
    pub fn clear_manual_drop_chance(&self) -> DropRateResult<f32> {
        let mut run = self.run.write();
        run.drop_chance = self
            .rates
            .player_aware_base_drop_chance(run.player_count, run.drop_chance)?;
        run.manual_override = false;
        Ok(run.drop_chance)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Base chance currently fed into the kill pipeline.
    #[must_use]
    pub fn current_drop_chance(&self) -> f32 {
        self.run.read().drop_chance
    }

    /// Whether a manual override is active.
    #[must_use]
    pub fn is_manual_override(&self) -> bool {
        self.run.read().manual_override
    }

    /// Current tracker aggregates.
    #[must_use]
    pub fn totals(&self) -> SessionTotals {
        self.tracker.lock().totals()
    }

    /// Whether a run is in progress.
    #[must_use]
    pub fn tracker_state(&self) -> TrackerState {
        self.tracker.lock().state()
    }

    /// Runs `f` against a snapshot of the tracker.
    ///
    /// The lock is released before `f` runs, so `f` may call back into the
    /// service. Events recorded meanwhile are not visible in the snapshot.
    pub fn with_tracker<R>(&self, f: impl FnOnce(&FairnessTracker) -> R) -> R {
        let snapshot = self.tracker.lock().clone();
        f(&snapshot)
    }
}

fn log_report(outcome: &ReportOutcome) {
    match outcome {
        ReportOutcome::Report(report) => info!("\n{report}"),
        ReportOutcome::NoData => debug!("No kills recorded, skipping drop rate report"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DropRateConfig;

    fn stock_kill(elapsed_seconds: f64) -> KillContext {
        KillContext {
            is_swarm_active: false,
            native_drop_chance: 5.0,
            native_base_drop_chance: 5.0,
            elapsed_seconds,
        }
    }

    fn item() -> PickupInfo {
        PickupInfo::new(0, "ITEM_HOOF_NAME")
    }

    #[test]
    fn test_service_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DropRateService>();
    }

    #[test]
    fn test_begin_run_scales_for_players() {
        let service = DropRateService::new(SharedConfig::default());

        assert_eq!(service.begin_run(4).unwrap(), 1.25);
        assert_eq!(service.current_drop_chance(), 1.25);
    }

    #[test]
    fn test_begin_run_resets_tracker() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(1).unwrap();
        service.on_kill(&stock_kill(10.0)).unwrap();
        assert_eq!(service.tracker_state(), TrackerState::Active);

        service.begin_run(1).unwrap();

        assert_eq!(service.tracker_state(), TrackerState::Active);
        assert_eq!(service.totals(), SessionTotals::default());
        assert_eq!(service.with_tracker(FairnessTracker::total_kills), 0);
    }

    #[test]
    fn test_run_is_active_before_first_kill() {
        let service = DropRateService::new(SharedConfig::default());
        assert_eq!(service.tracker_state(), TrackerState::Idle);

        service.begin_run(1).unwrap();
        assert_eq!(service.tracker_state(), TrackerState::Active);

        service.on_pickup(&item());
        assert_eq!(service.tracker_state(), TrackerState::Active);

        assert_eq!(service.end_run(60.0, 1).unwrap(), ReportOutcome::NoData);
        assert_eq!(service.tracker_state(), TrackerState::Idle);
    }

    #[test]
    fn test_with_tracker_allows_service_calls() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(1).unwrap();
        service.on_kill(&stock_kill(10.0)).unwrap();

        let (kills, totals) = service.with_tracker(|t| (t.total_kills(), service.totals()));

        assert_eq!(kills, 1);
        assert_eq!(totals, service.totals());
        service.on_pickup(&item());
        assert_eq!(service.totals().total_item_drops, 1);
    }

    #[test]
    fn test_pickup_outside_a_run_stays_idle() {
        let service = DropRateService::new(SharedConfig::default());

        service.on_pickup(&item());

        assert_eq!(service.tracker_state(), TrackerState::Idle);
    }

    #[test]
    fn test_zero_players_leaves_service_untouched() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(2).unwrap();
        service.on_kill(&stock_kill(10.0)).unwrap();

        assert!(service.begin_run(0).is_err());

        assert_eq!(service.current_drop_chance(), 2.5);
        assert_eq!(service.with_tracker(FairnessTracker::total_kills), 1);
    }

    #[test]
    fn test_kill_registers_opportunity() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(1).unwrap();

        let outcome = service.on_kill(&stock_kill(10.0)).unwrap();

        assert_eq!(outcome.drop_chance, 5.0);
        assert!(!outcome.bad_luck_protected);
        assert_eq!(service.with_tracker(|t| t.kills_at(5.0)), 1);
    }

    #[test]
    fn test_kill_pipeline_applies_protection() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(1).unwrap();

        // 20 kills at 5% reach 100% cumulative on the last one.
        let mut last = None;
        for _ in 0..20 {
            last = Some(service.on_kill(&stock_kill(60.0)).unwrap());
        }
        let last = last.unwrap();

        assert!(last.bad_luck_protected);
        assert_eq!(last.drop_chance, 5.0);

        let next = service.on_kill(&stock_kill(60.0)).unwrap();
        assert!(next.bad_luck_protected);
        assert!((next.drop_chance - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_pickup_resets_cumulative() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(1).unwrap();
        service.on_kill(&stock_kill(10.0)).unwrap();

        assert!(service.on_pickup(&item()));
        assert!(!service.on_pickup(&PickupInfo::new(10, "PICKUP_GOLD")));

        let totals = service.totals();
        assert_eq!(totals.cumulative_drop_chance, 0.0);
        assert_eq!(totals.total_item_drops, 1);
    }

    #[test]
    fn test_manual_override_survives_stage_but_not_run() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(2).unwrap();

        service.set_manual_drop_chance(20.0).unwrap();
        assert_eq!(service.begin_stage(2).unwrap(), 20.0);
        assert!(service.is_manual_override());

        service.begin_run(2).unwrap();
        assert!(!service.is_manual_override());
        assert_eq!(service.current_drop_chance(), 2.5);
    }

    #[test]
    fn test_clear_override_recomputes() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(4).unwrap();
        service.set_manual_drop_chance(50.0).unwrap();

        assert_eq!(service.clear_manual_drop_chance().unwrap(), 1.25);
        assert!(!service.is_manual_override());
    }

    #[test]
    fn test_manual_override_rejects_out_of_range() {
        let service = DropRateService::new(SharedConfig::default());

        assert!(service.set_manual_drop_chance(101.0).is_err());
        assert!(service.set_manual_drop_chance(-0.5).is_err());
        assert!(service.set_manual_drop_chance(f32::NAN).is_err());
        assert!(!service.is_manual_override());
    }

    #[test]
    fn test_stage_picks_up_live_config() {
        let config = SharedConfig::new(DropRateConfig::default());
        let service = DropRateService::new(config.clone());
        service.begin_run(1).unwrap();

        config.update(|c| c.drop_chance_multiplier = 3.0).unwrap();

        assert_eq!(service.begin_stage(1).unwrap(), 15.0);
    }

    #[test]
    fn test_end_run_reports_and_resets() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(1).unwrap();
        for _ in 0..4 {
            service.on_kill(&stock_kill(30.0)).unwrap();
        }
        service.on_pickup(&item());

        let report = service.end_run(120.0, 1).unwrap().into_report().unwrap();

        assert_eq!(report.total_kills, 4);
        assert_eq!(report.total_items, 1);
        assert_eq!(service.tracker_state(), TrackerState::Idle);
        assert_eq!(service.end_run(120.0, 1).unwrap(), ReportOutcome::NoData);
    }

    #[test]
    fn test_end_run_keeps_data_on_bad_duration() {
        let service = DropRateService::new(SharedConfig::default());
        service.begin_run(1).unwrap();
        service.on_kill(&stock_kill(30.0)).unwrap();

        assert!(service.end_run(0.0, 1).is_err());
        assert_eq!(service.with_tracker(FairnessTracker::total_kills), 1);
    }
}

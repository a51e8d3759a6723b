//! # Fairness Tracker
//!
//! Session accumulator for drop opportunities and confirmed item drops.
//!
//! Every kill that rolls for loot is a *drop opportunity*. The tracker sums
//! the probability mass offered since the last confirmed drop (the
//! cumulative drop chance), the statistically expected number of items, and
//! the number of items that actually dropped. The rate computer reads these
//! aggregates to decide when bad luck protection kicks in.
//!
//! ## Event Ordering
//!
//! ```text
//! kill ──> register_drop_opportunity()        (immediately)
//!            │
//!            └── droplet falls ... lands ──> register_item_drop()   (later)
//! ```
//!
//! Opportunities are registered the moment the kill happens while the drop is
//! only confirmed once its droplet lands. A burst of kills in between all see
//! the stale cumulative value.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::error::{DropRateError, DropRateResult};
use crate::report::{ReportOutcome, RunReport};

/// Run phase of the tracker, switched by [`FairnessTracker::begin`] and
/// [`FairnessTracker::reset`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackerState {
    /// Between runs.
    #[default]
    Idle,
    /// Within a run, whether or not anything was recorded yet.
    Active,
}

/// Read-only view of the tracker aggregates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SessionTotals {
    /// Probability mass (in percent) offered since the last confirmed drop.
    pub cumulative_drop_chance: f64,
    /// Expected number of items given every probability offered.
    pub expected_items: f64,
    /// Confirmed item drops this session.
    pub total_item_drops: u64,
}

/// Session state for drop fairness.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FairnessTracker {
    cumulative_drop_chance: f64,
    expected_items: f64,
    total_item_drops: u64,
    /// Kill count per offered drop chance.
    histogram: BTreeMap<OrderedFloat<f32>, u64>,
    state: TrackerState,
}

impl FairnessTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a run.
    ///
    /// Counters are left alone; call [`FairnessTracker::reset`] first for a
    /// clean session.
    pub fn begin(&mut self) {
        self.state = TrackerState::Active;
    }

    /// Clears every counter and the histogram and returns to
    /// [`TrackerState::Idle`].
    ///
    /// Safe to call any number of times; afterwards the tracker equals
    /// [`FairnessTracker::new`].
    pub fn reset(&mut self) {
        self.histogram.clear();
        self.total_item_drops = 0;
        self.cumulative_drop_chance = 0.0;
        self.expected_items = 0.0;
        self.state = TrackerState::Idle;
    }

    /// Records a kill that rolled for loot at `drop_chance` percent.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if `drop_chance` is negative
    /// or not finite; the tracker is left unchanged.
    pub fn register_drop_opportunity(&mut self, drop_chance: f32) -> DropRateResult<()> {
        if !drop_chance.is_finite() || drop_chance < 0.0 {
            return Err(DropRateError::invalid_argument(
                "drop_chance",
                drop_chance,
                "must be a finite, non-negative percentage",
            ));
        }

        self.cumulative_drop_chance += f64::from(drop_chance);
        self.expected_items += expected_share(drop_chance);
        *self.histogram.entry(OrderedFloat(drop_chance)).or_insert(0) += 1;
        Ok(())
    }

    /// Records a pickup landing.
    ///
    /// Only real items count: currency pickups are ignored (see
    /// [`PickupInfo::is_real_item`](crate::pickup::PickupInfo::is_real_item)).
    pub fn register_item_drop(&mut self, is_real_item_drop: bool) {
        if is_real_item_drop {
            self.cumulative_drop_chance = 0.0;
            self.total_item_drops += 1;
        }
    }

    /// Current aggregates.
    #[must_use]
    pub fn totals(&self) -> SessionTotals {
        SessionTotals {
            cumulative_drop_chance: self.cumulative_drop_chance,
            expected_items: self.expected_items,
            total_item_drops: self.total_item_drops,
        }
    }

    /// Kill count for an exact drop chance, 0 if never offered.
    #[must_use]
    pub fn kills_at(&self, drop_chance: f32) -> u64 {
        self.histogram
            .get(&OrderedFloat(drop_chance))
            .copied()
            .unwrap_or(0)
    }

    /// Histogram entries in ascending drop chance order.
    pub fn histogram(&self) -> impl DoubleEndedIterator<Item = (f32, u64)> + '_ {
        self.histogram.iter().map(|(chance, kills)| (chance.0, *kills))
    }

    /// Total number of drop opportunities this session.
    #[must_use]
    pub fn total_kills(&self) -> u64 {
        self.histogram.values().sum()
    }

    /// Current run phase.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Builds the run report.
    ///
    /// Returns [`ReportOutcome::NoData`] when no kills were recorded.
    ///
    /// # Errors
    ///
    /// Returns [`DropRateError::InvalidArgument`] if there is data to report
    /// and `elapsed_seconds` is not a positive, finite number.
    pub fn generate_report(
        &self,
        elapsed_seconds: f64,
        stage_number: u32,
    ) -> DropRateResult<ReportOutcome> {
        let total_kills = self.total_kills();
        if total_kills == 0 {
            return Ok(ReportOutcome::NoData);
        }
        if !elapsed_seconds.is_finite() || elapsed_seconds <= 0.0 {
            return Err(DropRateError::invalid_argument(
                "elapsed_seconds",
                elapsed_seconds,
                "run duration must be positive to compute drops per minute",
            ));
        }

        let weighted: f64 = self
            .histogram
            .iter()
            .map(|(chance, kills)| f64::from(chance.0) * *kills as f64)
            .sum();
        let kills = total_kills as f64;
        let items = self.total_item_drops as f64;

        Ok(ReportOutcome::Report(RunReport {
            stage: stage_number,
            duration_seconds: elapsed_seconds,
            total_kills,
            total_items: self.total_item_drops,
            theoretical_drop_rate: weighted / kills,
            actual_drop_rate: items / kills * 100.0,
            drops_per_minute: round_hundredths(items / (elapsed_seconds / 60.0)),
            breakdown: self.histogram().rev().collect(),
        }))
    }
}

/// Share of one expected item contributed by a single roll, rounded to two
/// decimals with ties to even.
fn expected_share(drop_chance: f32) -> f64 {
    round_hundredths(f64::from(drop_chance / 100.0))
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_new_tracker_is_idle_and_empty() {
        let tracker = FairnessTracker::new();

        assert_eq!(tracker.state(), TrackerState::Idle);
        assert_eq!(tracker.totals(), SessionTotals::default());
        assert_eq!(tracker.total_kills(), 0);
    }

    #[test]
    fn test_ten_opportunities_then_drop() {
        let mut tracker = FairnessTracker::new();
        for _ in 0..10 {
            tracker.register_drop_opportunity(5.0).unwrap();
        }

        assert_eq!(tracker.kills_at(5.0), 10);
        assert_eq!(tracker.histogram().collect::<Vec<_>>(), vec![(5.0, 10)]);
        assert!(approx(tracker.totals().expected_items, 0.5));
        assert!(approx(tracker.totals().cumulative_drop_chance, 50.0));

        tracker.register_item_drop(true);

        let totals = tracker.totals();
        assert_eq!(totals.total_item_drops, 1);
        assert_eq!(totals.cumulative_drop_chance, 0.0);
    }

    #[test]
    fn test_state_follows_run_boundaries() {
        let mut tracker = FairnessTracker::new();

        tracker.begin();
        assert_eq!(tracker.state(), TrackerState::Active);
        assert_eq!(tracker.total_kills(), 0);

        tracker.reset();
        assert_eq!(tracker.state(), TrackerState::Idle);
    }

    #[test]
    fn test_recording_does_not_change_state() {
        let mut tracker = FairnessTracker::new();

        tracker.register_item_drop(true);
        tracker.register_drop_opportunity(5.0).unwrap();

        assert_eq!(tracker.state(), TrackerState::Idle);
    }

    #[test]
    fn test_non_item_drop_is_ignored() {
        let mut tracker = FairnessTracker::new();
        tracker.register_drop_opportunity(30.0).unwrap();

        tracker.register_item_drop(false);

        assert_eq!(tracker.totals().total_item_drops, 0);
        assert!(approx(tracker.totals().cumulative_drop_chance, 30.0));
    }

    #[test]
    fn test_expected_share_rounds_like_the_host() {
        // 1.25% -> 0.0125 -> 0.01
        assert!(approx(expected_share(1.25), 0.01));
        // 2.5% as f32 is slightly above 0.025 once widened -> 0.03
        assert!(approx(expected_share(2.5), 0.03));
        assert!(approx(expected_share(0.4), 0.0));
        assert!(approx(expected_share(90.0), 0.9));
    }

    #[test]
    fn test_rejects_invalid_chance() {
        let mut tracker = FairnessTracker::new();

        assert!(tracker.register_drop_opportunity(-1.0).is_err());
        assert!(tracker.register_drop_opportunity(f32::NAN).is_err());
        assert!(tracker.register_drop_opportunity(f32::INFINITY).is_err());
        assert_eq!(tracker, FairnessTracker::new());
    }

    #[test]
    fn test_reset_matches_fresh_tracker() {
        let mut tracker = FairnessTracker::new();
        tracker.begin();
        tracker.register_drop_opportunity(5.0).unwrap();
        tracker.register_drop_opportunity(12.5).unwrap();
        tracker.register_item_drop(true);
        tracker.register_drop_opportunity(7.0).unwrap();

        tracker.reset();
        assert_eq!(tracker, FairnessTracker::new());
        assert_eq!(tracker.state(), TrackerState::Idle);

        tracker.reset();
        assert_eq!(tracker, FairnessTracker::new());
    }

    #[test]
    fn test_report_without_kills_is_no_data() {
        let tracker = FairnessTracker::new();

        assert_eq!(
            tracker.generate_report(0.0, 1).unwrap(),
            ReportOutcome::NoData
        );
    }

    #[test]
    fn test_report_rejects_zero_duration_with_data() {
        let mut tracker = FairnessTracker::new();
        tracker.register_drop_opportunity(5.0).unwrap();

        let err = tracker.generate_report(0.0, 1).unwrap_err();
        assert!(matches!(
            err,
            DropRateError::InvalidArgument { name: "elapsed_seconds", .. }
        ));
    }

    #[test]
    fn test_report_aggregates() {
        let mut tracker = FairnessTracker::new();
        for _ in 0..3 {
            tracker.register_drop_opportunity(10.0).unwrap();
        }
        tracker.register_drop_opportunity(50.0).unwrap();
        tracker.register_item_drop(true);

        let ReportOutcome::Report(report) = tracker.generate_report(120.0, 2).unwrap() else {
            panic!("expected a report");
        };

        assert_eq!(report.stage, 2);
        assert_eq!(report.total_kills, 4);
        assert_eq!(report.total_items, 1);
        assert!(approx(report.theoretical_drop_rate, 20.0));
        assert!(approx(report.actual_drop_rate, 25.0));
        assert!(approx(report.drops_per_minute, 0.5));
        assert_eq!(report.breakdown, vec![(50.0, 1), (10.0, 3)]);
    }
}

//! # Run Report
//!
//! End-of-run drop statistics, built by
//! [`FairnessTracker::generate_report`](crate::tracker::FairnessTracker::generate_report).
//!
//! ## Text Layout
//!
//! ```text
//! ------ DROP RATE RUN REPORT -----
//! Stage: 3
//! Run Duration: 912.4s
//! Total kills: 410
//! Total items: 19
//! Theoretical Average Drop Rate: 4.31%
//! Actual Average Drop Rate: 4.63%
//! Drops per Minute: 1.25
//! Kills by Drop Rate
//!   5%: 220 kills
//!   3.5%: 190 kills
//! ------ END OF REPORT -----
//! ```

use std::fmt;

/// Result of asking for a report.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportOutcome {
    /// No kills were recorded, so there are no rates to compute.
    NoData,
    /// Statistics for the run so far.
    Report(RunReport),
}

impl ReportOutcome {
    /// Returns the report, if any.
    #[must_use]
    pub fn into_report(self) -> Option<RunReport> {
        match self {
            Self::NoData => None,
            Self::Report(report) => Some(report),
        }
    }
}

/// Drop statistics for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Stage the run is on (1-based).
    pub stage: u32,
    /// Run duration in seconds.
    pub duration_seconds: f64,
    /// Number of kills that rolled for loot.
    pub total_kills: u64,
    /// Number of real items that dropped.
    pub total_items: u64,
    /// Mean offered drop chance, weighted by kills, in percent.
    pub theoretical_drop_rate: f64,
    /// Items per kill, in percent.
    pub actual_drop_rate: f64,
    /// Items per minute of run time, rounded to two decimals.
    pub drops_per_minute: f64,
    /// `(drop chance, kills)` pairs, highest chance first.
    pub breakdown: Vec<(f32, u64)>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "------ DROP RATE RUN REPORT -----")?;
        writeln!(f, "Stage: {}", self.stage)?;
        writeln!(f, "Run Duration: {}s", self.duration_seconds)?;
        writeln!(f, "Total kills: {}", self.total_kills)?;
        writeln!(f, "Total items: {}", self.total_items)?;
        writeln!(
            f,
            "Theoretical Average Drop Rate: {:.2}%",
            self.theoretical_drop_rate
        )?;
        writeln!(f, "Actual Average Drop Rate: {:.2}%", self.actual_drop_rate)?;
        writeln!(f, "Drops per Minute: {}", self.drops_per_minute)?;
        writeln!(f, "Kills by Drop Rate")?;
        for (chance, kills) in &self.breakdown {
            writeln!(f, "  {chance}%: {kills} kills")?;
        }
        write!(f, "------ END OF REPORT -----")
    }
}

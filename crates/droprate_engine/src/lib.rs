//! # DROPRATE Engine
//!
//! Drop chance computation and fairness tracking for instanced loot.
//!
//! ## Design Principles
//!
//! 1. **Stateless rates** - The rate computer only reads configuration
//! 2. **Owned session state** - Fairness counters live in a tracker value, not globals
//! 3. **Live configuration** - Settings are re-read on every computation
//! 4. **Fail fast** - Zero divisors are reported as errors, never as `NaN`
//!
//! ## Thread Safety
//!
//! [`DropRateService`] is `Send + Sync` and serializes tracker mutations, so
//! kill and pickup hooks may fire from any thread.
//!
//! ## Example
//!
//! ```rust
//! use droprate_engine::{DropRateService, KillContext, PickupInfo, SharedConfig};
//!
//! let service = DropRateService::new(SharedConfig::default());
//! service.begin_run(2)?;
//!
//! let outcome = service.on_kill(&KillContext {
//!     is_swarm_active: false,
//!     native_drop_chance: 5.0,
//!     native_base_drop_chance: 5.0,
//!     elapsed_seconds: 42.0,
//! })?;
//! assert_eq!(outcome.drop_chance, 2.5);
//!
//! service.on_pickup(&PickupInfo::new(0, "ITEM_BEAR_NAME"));
//! assert_eq!(service.totals().total_item_drops, 1);
//! # Ok::<(), droprate_engine::DropRateError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod integration;
pub mod pickup;
pub mod rate;
pub mod report;
pub mod tracker;

pub use config::{DropRateConfig, SharedConfig};
pub use error::{DropRateError, DropRateResult};
pub use integration::{DropRateService, KillContext, KillOutcome};
pub use pickup::PickupInfo;
pub use rate::RateComputer;
pub use report::{ReportOutcome, RunReport};
pub use tracker::{FairnessTracker, SessionTotals, TrackerState};

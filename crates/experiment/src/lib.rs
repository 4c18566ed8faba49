//! Experiments over the ad auction platform.
//!
//! - [`runner`]: segment experiment (population per round, per-segment win
//!   rates and prices, z-test on win-rate gaps)
//! - [`audience`]: audience allocation experiment
//! - [`population`] and [`distributions`]: bidder and bid generation
//! - [`stats`]: statistics over recorded history

pub mod audience;
pub mod distributions;
pub mod population;
pub mod runner;
pub mod stats;

pub use audience::{
    AdvertiserSpec, AudienceExperiment, AudienceReport, AudienceSpec, BidRule, NO_WINNER,
};
pub use distributions::{round_rng, BidSampler};
pub use population::PopulationGenerator;
pub use runner::ExperimentRunner;
pub use stats::{segment_stats, ExperimentReport, SegmentStats, WinRateComparison, UNSEGMENTED};

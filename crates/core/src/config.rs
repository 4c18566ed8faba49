//! Configuration structures for the ad auction simulator.

use crate::error::{Error, Result};
use crate::types::{MechanismKind, RankBy, SlotPolicy, TieBreak};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Main configuration for an experiment run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mechanism configuration.
    pub auction: AuctionConfig,
    /// Round count, seed and slot ladder.
    pub experiment: ExperimentConfig,
    /// Bidder population configuration.
    pub population: PopulationConfig,
}

impl Config {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| {
            if e.is_data() {
                Error::invalid_configuration(e.to_string())
            } else {
                Error::Json(e)
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.experiment.validate()?;
        self.population.validate()
    }
}

/// Mechanism configuration recognised by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Pricing rule.
    pub mechanism: MechanismKind,
    /// Ranking key.
    pub rank_by: RankBy,
    /// Tie-break rule (insertion order only).
    pub tie_break: TieBreak,
    /// Spot/bidder count mismatch handling.
    pub slot_policy: SlotPolicy,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            mechanism: MechanismKind::SecondPrice,
            rank_by: RankBy::Bid,
            tie_break: TieBreak::InsertionOrder,
            slot_policy: SlotPolicy::Lenient,
        }
    }
}

impl AuctionConfig {
    /// Default configuration with the given pricing rule.
    pub fn for_mechanism(mechanism: MechanismKind) -> Self {
        Self {
            mechanism,
            ..Default::default()
        }
    }

    /// Same configuration ranked by a different key.
    pub fn with_rank_by(mut self, rank_by: RankBy) -> Self {
        self.rank_by = rank_by;
        self
    }

    /// Same configuration with a different slot policy.
    pub fn with_slot_policy(mut self, slot_policy: SlotPolicy) -> Self {
        self.slot_policy = slot_policy;
        self
    }
}

/// Experiment driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Number of rounds to simulate.
    pub rounds: u32,
    /// Base seed; round r uses a generator derived from (seed, r).
    pub seed: u64,
    /// CTR weight per slot, most prominent first.
    pub ctr_weights: Vec<f64>,
    /// Run rounds on the rayon pool when the `parallel` feature is enabled.
    pub parallel: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            rounds: 2000,
            seed: 0,
            ctr_weights: vec![1.0, 0.6, 0.3],
            parallel: true,
        }
    }
}

impl ExperimentConfig {
    /// Reject empty runs and malformed slot ladders.
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(Error::invalid_configuration("rounds must be positive"));
        }
        if self.ctr_weights.is_empty() {
            return Err(Error::invalid_configuration(
                "at least one ctr weight is required",
            ));
        }
        if let Some(w) = self
            .ctr_weights
            .iter()
            .find(|w| !w.is_finite() || **w <= 0.0)
        {
            return Err(Error::invalid_configuration(format!(
                "ctr weights must be positive, got {w}"
            )));
        }
        Ok(())
    }
}

/// A group of bidders sharing a label and a click-through quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    /// Segment label attached to generated bidders.
    pub label: String,
    /// Relative share of generated bidders.
    pub proportion: f64,
    /// Click-through quality of bidders in this segment.
    pub quality: f64,
}

impl SegmentSpec {
    /// Create a segment.
    pub fn new(label: impl Into<String>, proportion: f64, quality: f64) -> Self {
        Self {
            label: label.into(),
            proportion,
            quality,
        }
    }
}

/// Rule for drawing a bid. The same rule applies to every segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BidPolicy {
    /// Every bidder bids `value`.
    Fixed { value: f64 },
    /// Bids drawn uniformly from [low, high).
    Uniform { low: f64, high: f64 },
    /// Log-normal bids with the given mean and standard deviation.
    LogNormal { mean: f64, stddev: f64 },
    /// Normal bids, clamped at zero.
    Normal { mean: f64, stddev: f64 },
}

impl Default for BidPolicy {
    fn default() -> Self {
        BidPolicy::Uniform {
            low: 1.0,
            high: 10.0,
        }
    }
}

impl BidPolicy {
    /// Reject parameters the distributions cannot be built from.
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            BidPolicy::Fixed { value } => value.is_finite() && value >= 0.0,
            BidPolicy::Uniform { low, high } => {
                low.is_finite() && high.is_finite() && low >= 0.0 && low < high
            }
            BidPolicy::LogNormal { mean, stddev } => {
                mean.is_finite() && stddev.is_finite() && mean > 0.0 && stddev >= 0.0
            }
            BidPolicy::Normal { mean, stddev } => {
                mean.is_finite() && stddev.is_finite() && stddev >= 0.0
            }
        };
        if ok {
            Ok(())
        } else {
            Err(Error::invalid_configuration(format!(
                "invalid bid policy: {self:?}"
            )))
        }
    }
}

/// Bidder population drawn fresh every round.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Bidders per round.
    pub bidders_per_round: usize,
    /// Segments bidders are drawn from.
    pub segments: Vec<SegmentSpec>,
    /// Bid rule shared by all segments.
    pub bid_policy: BidPolicy,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            bidders_per_round: 4,
            segments: vec![
                SegmentSpec::new("group_a", 0.5, 1.0),
                SegmentSpec::new("group_b", 0.5, 0.6),
            ],
            bid_policy: BidPolicy::default(),
        }
    }
}

impl PopulationConfig {
    /// Check segment shares, qualities, labels and the bid rule.
    pub fn validate(&self) -> Result<()> {
        if self.bidders_per_round == 0 {
            return Err(Error::invalid_configuration(
                "bidders_per_round must be positive",
            ));
        }
        if self.segments.is_empty() {
            return Err(Error::invalid_configuration("at least one segment is required"));
        }

        let mut labels = BTreeSet::new();
        for segment in &self.segments {
            if !labels.insert(segment.label.as_str()) {
                return Err(Error::invalid_configuration(format!(
                    "duplicate segment label: {}",
                    segment.label
                )));
            }
            if !segment.proportion.is_finite() || segment.proportion < 0.0 {
                return Err(Error::invalid_configuration(format!(
                    "segment {} has invalid proportion {}",
                    segment.label, segment.proportion
                )));
            }
            if !segment.quality.is_finite() || segment.quality <= 0.0 {
                return Err(Error::invalid_configuration(format!(
                    "segment {} has invalid quality {}",
                    segment.label, segment.quality
                )));
            }
        }

        if self.segments.iter().map(|s| s.proportion).sum::<f64>() <= 0.0 {
            return Err(Error::invalid_configuration(
                "segment proportions must not all be zero",
            ));
        }

        self.bid_policy.validate()
    }
}

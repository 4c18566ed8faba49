//! Core data types for the ad auction simulator.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bidder identifier, unique within a round.
pub type BidderId = String;

/// Pricing rule applied to the ranked bidders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MechanismKind {
    /// Winner pays its own bid.
    FirstPrice,
    /// Winner of slot k pays the bid ranked k+1.
    SecondPrice,
    /// Generalized second price: per-slot next-bid pricing over all slots.
    Gsp,
}

impl MechanismKind {
    /// All mechanism kinds, in the order experiments report them.
    pub const ALL: [MechanismKind; 3] = [
        MechanismKind::FirstPrice,
        MechanismKind::SecondPrice,
        MechanismKind::Gsp,
    ];

    /// Configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            MechanismKind::FirstPrice => "first_price",
            MechanismKind::SecondPrice => "second_price",
            MechanismKind::Gsp => "gsp",
        }
    }

    /// Does the winner pay the bid ranked immediately below it?
    pub fn charges_next_bid(self) -> bool {
        !matches!(self, MechanismKind::FirstPrice)
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MechanismKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_price" => Ok(MechanismKind::FirstPrice),
            "second_price" => Ok(MechanismKind::SecondPrice),
            "gsp" => Ok(MechanismKind::Gsp),
            other => Err(Error::invalid_configuration(format!(
                "unknown mechanism kind: {other}"
            ))),
        }
    }
}

/// Key used to rank bidders before slots are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    /// Raw bid value.
    #[default]
    Bid,
    /// Bid multiplied by the bidder's click-through quality.
    BidTimesCtr,
}

impl RankBy {
    /// Configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            RankBy::Bid => "bid",
            RankBy::BidTimesCtr => "bid_times_ctr",
        }
    }
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bid" => Ok(RankBy::Bid),
            "bid_times_ctr" => Ok(RankBy::BidTimesCtr),
            other => Err(Error::invalid_configuration(format!(
                "unknown ranking key: {other}"
            ))),
        }
    }
}

/// Ordering of bidders with equal rank keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earlier-supplied bidder ranks higher.
    #[default]
    InsertionOrder,
}

impl FromStr for TieBreak {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insertion_order" => Ok(TieBreak::InsertionOrder),
            other => Err(Error::invalid_configuration(format!(
                "unknown tie break rule: {other}"
            ))),
        }
    }
}

/// How a spot count that differs from the bidder count is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Trailing spots stay unassigned, surplus bidders win nothing.
    #[default]
    Lenient,
    /// Spot count must equal bidder count.
    Strict,
}

/// One advertiser taking part in a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bidder {
    /// Identifier, unique within a round.
    pub id: BidderId,
    /// Submitted bid (non-negative).
    pub bid: f64,
    /// Segment label for downstream statistics. Never read by the mechanism.
    pub segment: Option<String>,
    /// Click-through quality multiplier (positive, 1.0 = neutral).
    pub quality: f64,
}

impl Bidder {
    /// Create a bidder with neutral quality and no segment.
    pub fn new(id: impl Into<BidderId>, bid: f64) -> Self {
        Self {
            id: id.into(),
            bid,
            segment: None,
            quality: 1.0,
        }
    }

    /// Attach a segment label.
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    /// Set the click-through quality multiplier.
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = quality;
        self
    }

    /// Segment label, if any.
    pub fn segment(&self) -> Option<&str> {
        self.segment.as_deref()
    }
}

/// One ranked ad slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdSpot {
    /// 0-based position, lower is more prominent.
    pub position: usize,
    /// CTR weight of the position.
    pub ctr_weight: f64,
}

impl AdSpot {
    /// Create a spot.
    pub fn new(position: usize, ctr_weight: f64) -> Self {
        Self {
            position,
            ctr_weight,
        }
    }

    /// Build an ordered slot ladder from per-position CTR weights.
    pub fn ladder(ctr_weights: &[f64]) -> Vec<AdSpot> {
        ctr_weights
            .iter()
            .enumerate()
            .map(|(position, &ctr_weight)| AdSpot::new(position, ctr_weight))
            .collect()
    }

    /// `count` spots of equal weight 1.0.
    pub fn uniform(count: usize) -> Vec<AdSpot> {
        AdSpot::ladder(&vec![1.0; count])
    }
}

/// Click probability of a bidder with `quality` in a slot of `ctr_weight`.
#[inline]
pub fn effective_ctr(quality: f64, ctr_weight: f64) -> f64 {
    quality * ctr_weight
}

/// A bidder that was assigned a slot, with the price it pays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    /// Bidder identifier.
    pub bidder_id: BidderId,
    /// Index of the bidder in the round's input sequence.
    pub bidder_index: usize,
    /// Segment label copied from the bidder.
    pub segment: Option<String>,
    /// Submitted bid.
    pub bid: f64,
    /// Quality multiplier copied from the bidder.
    pub quality: f64,
    /// Key the bidder was ranked by.
    pub rank_score: f64,
    /// Price paid.
    pub price: f64,
}

impl Winner {
    /// Bid minus price.
    #[inline]
    pub fn surplus(&self) -> f64 {
        self.bid - self.price
    }
}

/// Outcome for a single slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    /// Position of the slot.
    pub position: usize,
    /// CTR weight of the slot.
    pub ctr_weight: f64,
    /// Assigned bidder, or None when bidders ran out.
    pub winner: Option<Winner>,
}

impl SlotAssignment {
    /// Expected clicks delivered to the winner (quality x ctr weight).
    #[inline]
    pub fn expected_clicks(&self) -> f64 {
        self.winner
            .as_ref()
            .map_or(0.0, |w| effective_ctr(w.quality, self.ctr_weight))
    }
}

/// Assignment and prices produced by one auction round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// Pricing rule used.
    pub mechanism: MechanismKind,
    /// Ranking key used.
    pub rank_by: RankBy,
    /// One entry per spot, in spot order.
    pub slots: Vec<SlotAssignment>,
}

impl RoundResult {
    /// Result with every spot unassigned.
    pub fn unassigned(mechanism: MechanismKind, rank_by: RankBy, spots: &[AdSpot]) -> Self {
        Self {
            mechanism,
            rank_by,
            slots: spots
                .iter()
                .map(|spot| SlotAssignment {
                    position: spot.position,
                    ctr_weight: spot.ctr_weight,
                    winner: None,
                })
                .collect(),
        }
    }

    /// True when nobody won anything.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.winner.is_none())
    }

    /// Winner of the k-th spot.
    pub fn winner_at(&self, slot: usize) -> Option<&Winner> {
        self.slots.get(slot).and_then(|s| s.winner.as_ref())
    }

    /// Winners in slot order.
    pub fn winners(&self) -> impl Iterator<Item = &Winner> {
        self.slots.iter().filter_map(|s| s.winner.as_ref())
    }

    /// (bidder id, price) for every assigned bidder, in slot order.
    pub fn payments(&self) -> Vec<(&str, f64)> {
        self.winners()
            .map(|w| (w.bidder_id.as_str(), w.price))
            .collect()
    }

    /// Price paid by a bidder, None if it won nothing.
    pub fn price_of(&self, bidder_id: &str) -> Option<f64> {
        self.winners()
            .find(|w| w.bidder_id == bidder_id)
            .map(|w| w.price)
    }

    /// Slot index won by a bidder.
    pub fn slot_of(&self, bidder_id: &str) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.winner
                .as_ref()
                .is_some_and(|w| w.bidder_id == bidder_id)
        })
    }

    /// Sum of all prices.
    pub fn revenue(&self) -> f64 {
        self.winners().map(|w| w.price).sum()
    }

    /// Sum of expected clicks over assigned slots.
    pub fn expected_clicks(&self) -> f64 {
        self.slots.iter().map(SlotAssignment::expected_clicks).sum()
    }
}

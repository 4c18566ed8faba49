//! Bidder ranking.
//!
//! Orders bidders by their rank key, highest first. Equal keys keep the order
//! bidders were supplied in.

use adauction_core::{Bidder, RankBy};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

/// A bidder's entry in the ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedBid {
    /// Index of the bidder in the input slice.
    pub index: usize,
    /// Submitted bid.
    pub bid: f64,
    /// Click-through quality.
    pub quality: f64,
    /// Rank key.
    pub score: f64,
}

/// Rank key of a bidder.
#[inline]
pub fn rank_score(bidder: &Bidder, rank_by: RankBy) -> f64 {
    match rank_by {
        RankBy::Bid => bidder.bid,
        RankBy::BidTimesCtr => bidder.bid * bidder.quality,
    }
}

/// Rank bidders by descending key.
pub fn rank(bidders: &[Bidder], rank_by: RankBy) -> Vec<RankedBid> {
    let mut ranked: Vec<RankedBid> = bidders
        .iter()
        .enumerate()
        .map(|(index, bidder)| RankedBid {
            index,
            bid: bidder.bid,
            quality: bidder.quality,
            score: rank_score(bidder, rank_by),
        })
        .collect();

    // Stable: ties stay in insertion order.
    ranked.sort_by_key(|r| Reverse(OrderedFloat(r.score)));
    ranked
}

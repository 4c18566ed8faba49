//! Sealed-bid slot auction.
//!
//! Ranks bidders, assigns the k-th ranked bidder to the k-th spot and prices
//! every assignment according to the configured mechanism.

use crate::pricing::clearing_price;
use crate::ranking::rank;
use adauction_core::{
    AdSpot, AuctionConfig, Bidder, Error, MechanismKind, Result, RoundResult, SlotPolicy, Winner,
};
use std::collections::HashSet;

/// Allocate spots with the default configuration for `mechanism`.
///
/// Ranks by raw bid, breaks ties by insertion order and leaves trailing
/// spots unassigned when bidders run out.
pub fn allocate(bidders: &[Bidder], spots: &[AdSpot], mechanism: MechanismKind) -> Result<RoundResult> {
    Auction::new(AuctionConfig::for_mechanism(mechanism)).allocate(bidders, spots)
}

/// Auction mechanism bound to one configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Auction {
    config: AuctionConfig,
}

impl Auction {
    /// Create a new auction.
    pub fn new(config: AuctionConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    /// Run one round.
    ///
    /// Fails without producing any result if a bid is negative or non-finite,
    /// a quality or CTR weight is not positive, an identifier repeats, or the
    /// strict slot policy sees a count mismatch.
    pub fn allocate(&self, bidders: &[Bidder], spots: &[AdSpot]) -> Result<RoundResult> {
        validate_bidders(bidders)?;
        validate_spots(spots)?;

        if self.config.slot_policy == SlotPolicy::Strict && spots.len() != bidders.len() {
            return Err(Error::mismatched_slots(spots.len(), bidders.len()));
        }

        let AuctionConfig {
            mechanism, rank_by, ..
        } = self.config;

        let ranked = rank(bidders, rank_by);
        let mut result = RoundResult::unassigned(mechanism, rank_by, spots);

        for (k, (slot, entry)) in result.slots.iter_mut().zip(&ranked).enumerate() {
            let bidder = &bidders[entry.index];
            slot.winner = Some(Winner {
                bidder_id: bidder.id.clone(),
                bidder_index: entry.index,
                segment: bidder.segment.clone(),
                bid: bidder.bid,
                quality: bidder.quality,
                rank_score: entry.score,
                price: clearing_price(mechanism, rank_by, entry, ranked.get(k + 1)),
            });
        }

        Ok(result)
    }
}

fn validate_bidders(bidders: &[Bidder]) -> Result<()> {
    if let Some(bidder) = bidders.iter().find(|b| !b.bid.is_finite() || b.bid < 0.0) {
        return Err(Error::invalid_bid(bidder.id.clone(), bidder.bid));
    }

    if let Some(bidder) = bidders
        .iter()
        .find(|b| !b.quality.is_finite() || b.quality <= 0.0)
    {
        return Err(Error::InvalidQuality {
            bidder: bidder.id.clone(),
            value: bidder.quality,
        });
    }

    let mut seen = HashSet::with_capacity(bidders.len());
    for bidder in bidders {
        if !seen.insert(bidder.id.as_str()) {
            return Err(Error::DuplicateBidder(bidder.id.clone()));
        }
    }

    Ok(())
}

fn validate_spots(spots: &[AdSpot]) -> Result<()> {
    match spots
        .iter()
        .find(|s| !s.ctr_weight.is_finite() || s.ctr_weight <= 0.0)
    {
        Some(spot) => Err(Error::InvalidSpot {
            position: spot.position,
            ctr_weight: spot.ctr_weight,
        }),
        None => Ok(()),
    }
}

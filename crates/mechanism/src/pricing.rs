//! Clearing prices per mechanism.

use crate::ranking::RankedBid;
use adauction_core::{MechanismKind, RankBy};

/// Price paid by `winner`, given the entry ranked immediately below it.
///
/// Never negative and never above the winner's own bid.
pub fn clearing_price(
    mechanism: MechanismKind,
    rank_by: RankBy,
    winner: &RankedBid,
    next: Option<&RankedBid>,
) -> f64 {
    if mechanism.charges_next_bid() {
        next_bid_price(rank_by, winner, next)
    } else {
        winner.bid
    }
}

/// Lowest bid that would still have kept the winner ahead of `next`.
fn next_bid_price(rank_by: RankBy, winner: &RankedBid, next: Option<&RankedBid>) -> f64 {
    let Some(next) = next else {
        return 0.0;
    };

    let price = match rank_by {
        RankBy::Bid => next.bid,
        RankBy::BidTimesCtr => next.score / winner.quality,
    };

    price.clamp(0.0, winner.bid)
}

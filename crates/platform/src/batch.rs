//! Batch allocation over independent rounds.
//!
//! With the `parallel` feature each round is allocated on the rayon pool;
//! otherwise rounds run one after another. Output order always matches input
//! order.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::record::RoundInput;
use adauction_core::{Result, RoundResult};
use adauction_mechanism::Auction;

/// Allocate every round.
///
/// # Parameters
/// - `force_sequential`: When true, runs sequentially even if the parallel feature is enabled
pub fn allocate_all(auction: &Auction, inputs: &[RoundInput], force_sequential: bool) -> Vec<Result<RoundResult>> {
    let allocate = |input: &RoundInput| auction.allocate(&input.bidders, &input.spots);

    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            inputs.iter().map(allocate).collect()
        } else {
            inputs.par_iter().map(allocate).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        inputs.iter().map(allocate).collect()
    }
}

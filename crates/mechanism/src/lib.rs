//! Allocation and pricing for sealed-bid slot auctions.
//!
//! This crate handles:
//! - Ranking bidders by raw bid or quality-weighted bid
//! - Insertion-order tie-breaking
//! - First-price, second-price and GSP clearing prices
//! - Input validation for a single round

pub mod auction;
pub mod pricing;
pub mod ranking;

pub use auction::{allocate, Auction};
pub use pricing::clearing_price;
pub use ranking::{rank, rank_score, RankedBid};

//! Core types and configuration for the ad auction simulator.
//!
//! This crate provides shared types used across all other crates:
//! - Bidders, ad spots and round results
//! - Mechanism, ranking and slot-policy selectors
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{AuctionConfig, BidPolicy, Config, ExperimentConfig, PopulationConfig, SegmentSpec};
pub use error::{Error, Result};
pub use types::*;

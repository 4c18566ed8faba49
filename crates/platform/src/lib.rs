//! Round orchestration for the ad auction simulator.
//!
//! This crate provides:
//! - The `Platform`, which runs rounds and keeps their history
//! - Round records with segment composition and audience metadata
//! - Batch execution of independent rounds (rayon, behind `parallel`)
//! - A registry of standing bidders

pub mod batch;
pub mod platform;
pub mod record;

pub use platform::Platform;
pub use record::{RoundInput, RoundMetadata, RoundRecord};

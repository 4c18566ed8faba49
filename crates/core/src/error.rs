//! Error types for the ad auction simulator.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ad auction simulator.
#[derive(Error, Debug)]
pub enum Error {
    /// A bidder submitted a negative or non-finite bid.
    #[error("Invalid bid from bidder '{bidder}': {value}")]
    InvalidBid { bidder: String, value: f64 },

    /// Unknown mechanism kind, ranking key, or out-of-range parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Strict slot policy requires one spot per bidder.
    #[error("Mismatched slots: {spots} spots for {bidders} bidders")]
    MismatchedSlots { spots: usize, bidders: usize },

    /// Two bidders in one round share an identifier.
    #[error("Duplicate bidder identifier: {0}")]
    DuplicateBidder(String),

    /// A spot has a non-positive or non-finite CTR weight.
    #[error("Invalid spot at position {position}: ctr weight {ctr_weight}")]
    InvalidSpot { position: usize, ctr_weight: f64 },

    /// A bidder has a non-positive or non-finite quality factor.
    #[error("Invalid quality for bidder '{bidder}': {value}")]
    InvalidQuality { bidder: String, value: f64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid bid error.
    pub fn invalid_bid(bidder: impl Into<String>, value: f64) -> Self {
        Error::InvalidBid {
            bidder: bidder.into(),
            value,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Create a mismatched slots error.
    pub fn mismatched_slots(spots: usize, bidders: usize) -> Self {
        Error::MismatchedSlots { spots, bidders }
    }
}

//! Round records kept in platform history.

use adauction_core::{AdSpot, Bidder, RoundResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input metadata stored next to a round's result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundMetadata {
    /// Participating bidders per segment label.
    pub composition: BTreeMap<String, usize>,
    /// Participating bidders without a segment label.
    pub unsegmented: usize,
    /// Impression context label supplied by the caller (e.g. user demographic).
    pub audience: Option<String>,
}

impl RoundMetadata {
    /// Count participants per segment.
    pub fn from_bidders(bidders: &[Bidder]) -> Self {
        let mut metadata = Self::default();
        for bidder in bidders {
            match bidder.segment() {
                Some(segment) => *metadata.composition.entry(segment.to_string()).or_insert(0) += 1,
                None => metadata.unsegmented += 1,
            }
        }
        metadata
    }

    /// Attach an audience label.
    pub fn with_audience(mut self, audience: Option<&str>) -> Self {
        self.audience = audience.map(str::to_string);
        self
    }

    /// Total participants.
    pub fn participants(&self) -> usize {
        self.composition.values().sum::<usize>() + self.unsegmented
    }
}

/// One completed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 0-based round number within the platform.
    pub round: u64,
    /// Input metadata.
    pub metadata: RoundMetadata,
    /// Allocation and prices.
    pub result: RoundResult,
}

/// Inputs for one round of a batch. Each round owns its bidders and spots.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundInput {
    /// Participating bidders, in tie-break order.
    pub bidders: Vec<Bidder>,
    /// Spots on offer, most prominent first.
    pub spots: Vec<AdSpot>,
    /// Impression context label copied into the round's metadata.
    pub audience: Option<String>,
}

impl RoundInput {
    /// Round without an audience label.
    pub fn new(bidders: Vec<Bidder>, spots: Vec<AdSpot>) -> Self {
        Self {
            bidders,
            spots,
            audience: None,
        }
    }

    /// Attach an audience label.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub(crate) fn metadata(&self) -> RoundMetadata {
        RoundMetadata::from_bidders(&self.bidders).with_audience(self.audience.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition_counts() {
        let bidders = vec![
            Bidder::new("A", 1.0).with_segment("female"),
            Bidder::new("B", 1.0).with_segment("male"),
            Bidder::new("C", 1.0).with_segment("female"),
            Bidder::new("D", 1.0),
        ];
        let metadata = RoundMetadata::from_bidders(&bidders).with_audience(Some("sports"));

        assert_eq!(metadata.composition["female"], 2);
        assert_eq!(metadata.composition["male"], 1);
        assert_eq!(metadata.unsegmented, 1);
        assert_eq!(metadata.participants(), 4);
        assert_eq!(metadata.audience.as_deref(), Some("sports"));
    }

    #[test]
    fn test_round_input_metadata() {
        let input = RoundInput::new(vec![Bidder::new("A", 2.0)], AdSpot::uniform(1)).with_audience("male");
        let metadata = input.metadata();
        assert_eq!(metadata.unsegmented, 1);
        assert_eq!(metadata.audience.as_deref(), Some("male"));
    }
}

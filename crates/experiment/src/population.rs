//! Per-round bidder populations.

use crate::distributions::BidSampler;
use adauction_core::{Bidder, Error, PopulationConfig, Result, SegmentSpec};
use rand::Rng;
use rand_distr::{Distribution, WeightedIndex};

/// Draws a fresh set of bidders for every round.
///
/// Each bidder's segment is drawn by proportion and its bid from the shared
/// bid policy, so bidding is symmetric across segments. Only the segment's
/// quality differs.
#[derive(Debug, Clone)]
pub struct PopulationGenerator {
    segments: Vec<SegmentSpec>,
    chooser: WeightedIndex<f64>,
    bids: BidSampler,
    bidders_per_round: usize,
}

impl PopulationGenerator {
    /// Create a generator from configuration.
    pub fn new(config: &PopulationConfig) -> Result<Self> {
        config.validate()?;
        let chooser = WeightedIndex::new(config.segments.iter().map(|s| s.proportion))
            .map_err(|e| Error::invalid_configuration(format!("segment proportions: {e}")))?;

        Ok(Self {
            segments: config.segments.clone(),
            chooser,
            bids: BidSampler::new(&config.bid_policy)?,
            bidders_per_round: config.bidders_per_round,
        })
    }

    /// Configured segments.
    pub fn segments(&self) -> &[SegmentSpec] {
        &self.segments
    }

    /// Bidders drawn per round.
    pub fn bidders_per_round(&self) -> usize {
        self.bidders_per_round
    }

    /// Draw one round's bidders.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Bidder> {
        (0..self.bidders_per_round)
            .map(|i| {
                let segment = &self.segments[self.chooser.sample(rng)];
                let bid = self.bids.sample(rng);
                Bidder::new(format!("bidder-{i}"), bid)
                    .with_segment(segment.label.clone())
                    .with_quality(segment.quality)
            })
            .collect()
    }
}

//! Auction platform.
//!
//! Runs rounds through the mechanism, keeps an insertion-ordered history of
//! results, and holds an optional roster of registered bidders.

use crate::batch::allocate_all;
use crate::record::{RoundInput, RoundMetadata, RoundRecord};
use adauction_core::{AdSpot, AuctionConfig, Bidder, Error, MechanismKind, Result, RoundResult};
use adauction_mechanism::Auction;
use std::fmt;
use tracing::{debug, warn};

/// Auction platform state.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    /// Ranking, tie-break and slot policy applied to every round.
    config: AuctionConfig,
    /// Registered bidders, in registration order.
    bidders: Vec<Bidder>,
    /// Completed rounds.
    history: Vec<RoundRecord>,
}

impl Platform {
    /// Create an empty platform with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty platform. Ranking, tie-break and slot policy come from
    /// `config`; each run names its own mechanism.
    pub fn with_config(config: AuctionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &AuctionConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Rounds
    // ------------------------------------------------------------------

    /// Run one round with the given mechanism.
    ///
    /// On error nothing is recorded and earlier history is untouched.
    pub fn run_round(
        &mut self,
        bidders: &[Bidder],
        spots: &[AdSpot],
        mechanism: MechanismKind,
    ) -> Result<&RoundResult> {
        let config = AuctionConfig {
            mechanism,
            ..self.config
        };
        Ok(&self.run_round_with(bidders, spots, &config, None)?.result)
    }

    /// Run one round with an explicit configuration and audience label.
    pub fn run_round_with(
        &mut self,
        bidders: &[Bidder],
        spots: &[AdSpot],
        config: &AuctionConfig,
        audience: Option<&str>,
    ) -> Result<&RoundRecord> {
        let result = Auction::new(*config).allocate(bidders, spots)?;
        let metadata = RoundMetadata::from_bidders(bidders).with_audience(audience);
        Ok(self.commit(metadata, result))
    }

    /// Run one round over the registered bidders.
    pub fn run_registered(&mut self, spots: &[AdSpot], mechanism: MechanismKind) -> Result<&RoundResult> {
        let bidders = std::mem::take(&mut self.bidders);
        let outcome = self.run_round(&bidders, spots, mechanism).map(|_| ());
        self.bidders = bidders;
        outcome?;
        Ok(&self.history[self.history.len() - 1].result)
    }

    /// Run many independent rounds, in parallel when allowed.
    ///
    /// Records are committed in input order. If a round fails, the rounds
    /// before it stay committed, nothing after it is recorded, and the error
    /// is returned.
    pub fn run_batch(
        &mut self,
        inputs: &[RoundInput],
        mechanism: MechanismKind,
        parallel: bool,
    ) -> Result<&[RoundRecord]> {
        let auction = Auction::new(AuctionConfig {
            mechanism,
            ..self.config
        });
        let start = self.history.len();

        for (input, outcome) in inputs.iter().zip(allocate_all(&auction, inputs, !parallel)) {
            let result = outcome?;
            self.commit(input.metadata(), result);
        }

        Ok(&self.history[start..])
    }

    fn commit(&mut self, metadata: RoundMetadata, result: RoundResult) -> &RoundRecord {
        let round = self.history.len() as u64;
        debug!(
            round,
            mechanism = %result.mechanism,
            winners = result.winners().count(),
            revenue = result.revenue(),
            "round allocated"
        );
        self.history.push(RoundRecord {
            round,
            metadata,
            result,
        });
        &self.history[self.history.len() - 1]
    }

    /// All completed rounds, oldest first.
    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    /// Number of completed rounds.
    pub fn rounds_run(&self) -> usize {
        self.history.len()
    }

    /// Consume the platform, keeping only its history.
    pub fn into_history(self) -> Vec<RoundRecord> {
        self.history
    }

    // ------------------------------------------------------------------
    // Registered bidders
    // ------------------------------------------------------------------

    /// Register a bidder. Identifiers must be unique.
    pub fn register_bidder(&mut self, bidder: Bidder) -> Result<()> {
        if self.bidder(&bidder.id).is_some() {
            return Err(Error::DuplicateBidder(bidder.id));
        }
        self.bidders.push(bidder);
        Ok(())
    }

    /// Remove a bidder by identifier. Unknown identifiers are ignored.
    pub fn remove_bidder(&mut self, id: &str) -> Option<Bidder> {
        match self.bidders.iter().position(|b| b.id == id) {
            Some(index) => Some(self.bidders.remove(index)),
            None => {
                warn!(bidder = id, "bidder not found on platform");
                None
            }
        }
    }

    /// Remove all registered bidders.
    pub fn clear_bidders(&mut self) {
        self.bidders.clear();
    }

    /// Registered bidders.
    pub fn bidders(&self) -> &[Bidder] {
        &self.bidders
    }

    /// Identifiers of registered bidders, in registration order.
    pub fn bidder_ids(&self) -> Vec<&str> {
        self.bidders.iter().map(|b| b.id.as_str()).collect()
    }

    /// Registered bidder by identifier.
    pub fn bidder(&self, id: &str) -> Option<&Bidder> {
        self.bidders.iter().find(|b| b.id == id)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Platform with {} bidders: [{}]",
            self.bidders.len(),
            self.bidder_ids().join(", ")
        )
    }
}

impl FromIterator<Bidder> for Platform {
    fn from_iter<I: IntoIterator<Item = Bidder>>(iter: I) -> Self {
        let mut platform = Platform::new();
        for bidder in iter {
            if let Err(e) = platform.register_bidder(bidder) {
                warn!(error = %e, "skipping bidder");
            }
        }
        platform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adauction_core::{RankBy, SlotPolicy};

    fn abc() -> Vec<Bidder> {
        vec![
            Bidder::new("A", 10.0).with_segment("female"),
            Bidder::new("B", 8.0).with_segment("male"),
            Bidder::new("C", 6.0).with_segment("male"),
        ]
    }

    #[test]
    fn test_run_round_records_history() {
        let mut platform = Platform::new();

        let result = platform
            .run_round(&abc(), &AdSpot::uniform(2), MechanismKind::SecondPrice)
            .unwrap();
        assert_eq!(result.payments(), vec![("A", 8.0), ("B", 6.0)]);

        platform
            .run_round(&abc(), &AdSpot::uniform(2), MechanismKind::FirstPrice)
            .unwrap();

        let history = platform.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].round, 0);
        assert_eq!(history[1].round, 1);
        assert_eq!(history[0].result.mechanism, MechanismKind::SecondPrice);
        assert_eq!(history[1].result.mechanism, MechanismKind::FirstPrice);
        assert_eq!(history[1].metadata.composition["male"], 2);
        assert_eq!(history[1].metadata.composition["female"], 1);
    }

    #[test]
    fn test_failed_round_leaves_history_untouched() {
        let mut platform = Platform::new();
        platform
            .run_round(&abc(), &AdSpot::uniform(2), MechanismKind::Gsp)
            .unwrap();
        let before = platform.history().to_vec();

        let bad = vec![Bidder::new("X", -1.0)];
        let err = platform
            .run_round(&bad, &AdSpot::uniform(1), MechanismKind::Gsp)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidBid { .. }));
        assert_eq!(platform.history(), before.as_slice());
    }

    #[test]
    fn test_platform_config_applies() {
        let config = AuctionConfig::default()
            .with_rank_by(RankBy::BidTimesCtr)
            .with_slot_policy(SlotPolicy::Strict);
        let mut platform = Platform::with_config(config);

        let err = platform
            .run_round(&abc(), &AdSpot::uniform(2), MechanismKind::FirstPrice)
            .unwrap_err();
        assert!(matches!(err, Error::MismatchedSlots { .. }));

        let result = platform
            .run_round(&abc(), &AdSpot::uniform(3), MechanismKind::FirstPrice)
            .unwrap();
        assert_eq!(result.rank_by, RankBy::BidTimesCtr);
    }

    #[test]
    fn test_run_round_mechanism_overrides_config() {
        let mut platform = Platform::with_config(AuctionConfig::for_mechanism(MechanismKind::FirstPrice));
        let result = platform
            .run_round(&abc(), &AdSpot::uniform(1), MechanismKind::SecondPrice)
            .unwrap();
        assert_eq!(result.mechanism, MechanismKind::SecondPrice);
        assert_eq!(result.payments(), vec![("A", 8.0)]);
    }

    #[test]
    fn test_run_round_with_audience() {
        let mut platform = Platform::new();
        let config = AuctionConfig::for_mechanism(MechanismKind::Gsp);
        let record = platform
            .run_round_with(&abc(), &AdSpot::uniform(1), &config, Some("female"))
            .unwrap();
        assert_eq!(record.metadata.audience.as_deref(), Some("female"));
        assert_eq!(record.result.payments(), vec![("A", 8.0)]);
    }

    #[test]
    fn test_registry_operations() {
        let mut platform = Platform::new();
        platform.register_bidder(Bidder::new("B1", 1.0)).unwrap();
        assert_eq!(platform.bidder_ids(), vec!["B1"]);

        platform.register_bidder(Bidder::new("B2", 2.0)).unwrap();
        assert_eq!(platform.bidder_ids(), vec!["B1", "B2"]);
        assert!(matches!(
            platform.register_bidder(Bidder::new("B2", 5.0)),
            Err(Error::DuplicateBidder(_))
        ));

        assert_eq!(platform.bidder("B2").map(|b| b.bid), Some(2.0));
        assert!(platform.bidder("nope").is_none());

        assert!(platform.remove_bidder("B1").is_some());
        assert_eq!(platform.bidder_ids(), vec!["B2"]);

        // Removing an unknown bidder is a no-op.
        assert!(platform.remove_bidder("B1").is_none());
        assert_eq!(platform.bidder_ids(), vec!["B2"]);

        platform.clear_bidders();
        assert!(platform.bidders().is_empty());
    }

    #[test]
    fn test_display() {
        let platform: Platform = vec![Bidder::new("X", 1.0), Bidder::new("Y", 1.0)]
            .into_iter()
            .collect();
        assert_eq!(platform.to_string(), "Platform with 2 bidders: [X, Y]");
    }

    #[test]
    fn test_run_registered() {
        let mut platform: Platform = abc().into_iter().collect();

        let result = platform
            .run_registered(&AdSpot::uniform(1), MechanismKind::FirstPrice)
            .unwrap();
        assert_eq!(result.payments(), vec![("A", 10.0)]);
        assert_eq!(platform.bidders().len(), 3);
        assert_eq!(platform.rounds_run(), 1);
    }

    #[test]
    fn test_run_batch_commits_in_order() {
        let mut platform = Platform::new();
        let inputs: Vec<RoundInput> = (0..10)
            .map(|round| {
                let bidders = vec![
                    Bidder::new("A", round as f64),
                    Bidder::new("B", 5.0),
                ];
                RoundInput::new(bidders, AdSpot::uniform(1)).with_audience(format!("r{round}"))
            })
            .collect();

        let records = platform.run_batch(&inputs, MechanismKind::SecondPrice, true).unwrap();
        assert_eq!(records.len(), 10);

        for (i, record) in platform.history().iter().enumerate() {
            assert_eq!(record.round, i as u64);
            assert_eq!(record.metadata.audience, Some(format!("r{i}")));
        }
        // Round 7: A bids 7 and pays B's 5.
        assert_eq!(platform.history()[7].result.payments(), vec![("A", 5.0)]);
        // Round 3: B wins and pays A's 3.
        assert_eq!(platform.history()[3].result.payments(), vec![("B", 3.0)]);
    }

    #[test]
    fn test_run_batch_stops_at_first_error() {
        let mut platform = Platform::new();
        let mut inputs: Vec<RoundInput> = (0..5)
            .map(|_| RoundInput::new(abc(), AdSpot::uniform(2)))
            .collect();
        inputs[3].bidders[2].bid = -2.0;

        let err = platform.run_batch(&inputs, MechanismKind::Gsp, true).unwrap_err();
        assert!(matches!(err, Error::InvalidBid { .. }));
        assert_eq!(platform.rounds_run(), 3);
    }
}

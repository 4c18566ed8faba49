//! Segment experiment runner.
//!
//! Generates a fresh population every round, runs all rounds through a
//! [`Platform`], and summarizes the recorded history per segment.

use crate::distributions::round_rng;
use crate::population::PopulationGenerator;
use crate::stats::ExperimentReport;
use adauction_core::{AdSpot, AuctionConfig, Config, ExperimentConfig, MechanismKind, Result};
use adauction_platform::{Platform, RoundInput};
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use tracing::info;

/// Runs segment experiments from a validated [`Config`].
#[derive(Debug, Clone)]
pub struct ExperimentRunner {
    auction: AuctionConfig,
    experiment: ExperimentConfig,
    population: PopulationGenerator,
    spots: Vec<AdSpot>,
}

impl ExperimentRunner {
    /// Create a runner. Fails on invalid configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            auction: config.auction,
            experiment: config.experiment.clone(),
            population: PopulationGenerator::new(&config.population)?,
            spots: AdSpot::ladder(&config.experiment.ctr_weights),
        })
    }

    /// Generator for one round, derived from the base seed and round number.
    pub fn round_rng(&self, round: u64) -> StdRng {
        round_rng(self.experiment.seed, round)
    }

    /// Inputs for every round. Identical across mechanisms for the same seed.
    pub fn round_inputs(&self) -> Vec<RoundInput> {
        (0..u64::from(self.experiment.rounds))
            .map(|round| {
                let mut rng = self.round_rng(round);
                RoundInput::new(self.population.generate(&mut rng), self.spots.clone())
            })
            .collect()
    }

    /// Run every round with `mechanism` and return the populated platform.
    pub fn run_platform(&self, mechanism: MechanismKind) -> Result<Platform> {
        let inputs = self.round_inputs();
        let mut platform = Platform::with_config(self.auction);
        platform.run_batch(&inputs, mechanism, self.experiment.parallel)?;

        info!(
            %mechanism,
            rank_by = %self.auction.rank_by,
            rounds = platform.rounds_run(),
            "experiment rounds complete"
        );
        Ok(platform)
    }

    /// Run with the configured mechanism.
    pub fn run(&self) -> Result<ExperimentReport> {
        self.run_mechanism(self.auction.mechanism)
    }

    /// Run with a specific mechanism.
    pub fn run_mechanism(&self, mechanism: MechanismKind) -> Result<ExperimentReport> {
        let platform = self.run_platform(mechanism)?;
        Ok(ExperimentReport::from_records(
            mechanism,
            self.auction.rank_by,
            platform.history(),
        ))
    }

    /// Run each mechanism over the same generated rounds.
    pub fn run_mechanisms(
        &self,
        mechanisms: &[MechanismKind],
    ) -> Result<BTreeMap<MechanismKind, ExperimentReport>> {
        mechanisms
            .iter()
            .map(|&mechanism| Ok((mechanism, self.run_mechanism(mechanism)?)))
            .collect()
    }
}

//! Audience allocation experiment.
//!
//! Each impression belongs to one audience (e.g. a user demographic) and
//! carries a set of tags: the audience label plus any context tags of that
//! audience. An advertiser values an impression at the sum of its per-tag
//! values and bids through its bid rule, optionally scaled by mean-one
//! log-normal noise. Counting who wins each audience's impressions shows how
//! competition for one audience pushes other advertisers toward the rest,
//! even when they value every audience equally.

use crate::distributions::{lognormal, round_rng};
use adauction_core::{AdSpot, AuctionConfig, Bidder, Error, MechanismKind, RankBy, Result};
use adauction_platform::{Platform, RoundInput, RoundRecord};
use rand::rngs::StdRng;
use rand_distr::{Distribution, LogNormal, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

/// Count key for impressions nobody won.
pub const NO_WINNER: &str = "none";

/// How an advertiser turns its valuation into a bid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BidRule {
    /// Bid the full valuation.
    #[default]
    Truthful,
    /// Bid `factor` times the valuation, `0 < factor <= 1`.
    Shade { factor: f64 },
}

impl BidRule {
    /// Bid for a valuation.
    #[inline]
    pub fn bid(self, value: f64) -> f64 {
        match self {
            BidRule::Truthful => value,
            BidRule::Shade { factor } => value * factor,
        }
    }

    fn is_valid(self) -> bool {
        match self {
            BidRule::Truthful => true,
            BidRule::Shade { factor } => factor.is_finite() && factor > 0.0 && factor <= 1.0,
        }
    }
}

/// An advertiser with per-tag values, per-audience click quality and a bid rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvertiserSpec {
    /// Advertiser name, used as the bidder id.
    pub name: String,
    /// Value contributed by each impression tag. Missing tags are worth 0.
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
    /// Click quality by audience label. Missing audiences default to 1.0.
    #[serde(default)]
    pub quality: BTreeMap<String, f64>,
    /// Valuation-to-bid rule.
    #[serde(default)]
    pub bid_rule: BidRule,
}

impl AdvertiserSpec {
    /// Advertiser with no values, neutral quality and truthful bidding.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
            quality: BTreeMap::new(),
            bid_rule: BidRule::Truthful,
        }
    }

    /// Set the value of one tag.
    pub fn with_value(mut self, tag: impl Into<String>, value: f64) -> Self {
        self.values.insert(tag.into(), value);
        self
    }

    /// Set the click quality for one audience.
    pub fn with_quality(mut self, audience: impl Into<String>, quality: f64) -> Self {
        self.quality.insert(audience.into(), quality);
        self
    }

    /// Set the bid rule.
    pub fn with_bid_rule(mut self, bid_rule: BidRule) -> Self {
        self.bid_rule = bid_rule;
        self
    }

    /// Sum of tag values over an impression's tags.
    pub fn valuation<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> f64 {
        tags.into_iter()
            .filter_map(|tag| self.values.get(tag))
            .sum()
    }

    /// Click quality in `audience`.
    pub fn quality_for(&self, audience: &str) -> f64 {
        self.quality.get(audience).copied().unwrap_or(1.0)
    }
}

/// An audience, its share of impressions and the context tags its
/// impressions carry besides the label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceSpec {
    /// Audience label, always one of the impression's tags.
    pub label: String,
    /// Relative share of impressions.
    pub proportion: f64,
    /// Extra context tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AudienceSpec {
    /// Audience without context tags.
    pub fn new(label: impl Into<String>, proportion: f64) -> Self {
        Self {
            label: label.into(),
            proportion,
            tags: Vec::new(),
        }
    }

    /// Add a context tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Label followed by context tags.
    pub fn impression_tags(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.label.as_str()).chain(self.tags.iter().map(String::as_str))
    }
}

/// Audience experiment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceExperiment {
    /// Competing advertisers.
    pub advertisers: Vec<AdvertiserSpec>,
    /// Audiences impressions are drawn from.
    pub audiences: Vec<AudienceSpec>,
    /// CTR weight per slot.
    pub ctr_weights: Vec<f64>,
    /// Standard deviation of the multiplicative bid noise (mean 1.0).
    pub bid_noise: f64,
    /// Number of impressions to auction.
    pub impressions: u32,
    /// Base seed; impression i uses a generator derived from (seed, i).
    pub seed: u64,
    /// Ranking key.
    pub rank_by: RankBy,
    /// Run impressions on the rayon pool when available.
    pub parallel: bool,
}

impl Default for AudienceExperiment {
    /// Makeup values women far above men. STEM values both audiences
    /// equally, so it ends up shown mostly to men.
    fn default() -> Self {
        Self {
            advertisers: vec![
                AdvertiserSpec::new("Makeup")
                    .with_value("female", 10.0)
                    .with_value("male", 2.0),
                AdvertiserSpec::new("STEM")
                    .with_value("female", 4.0)
                    .with_value("male", 4.0),
            ],
            audiences: vec![
                AudienceSpec::new("female", 0.5),
                AudienceSpec::new("male", 0.5),
            ],
            ctr_weights: vec![1.0],
            bid_noise: 0.5,
            impressions: 2000,
            seed: 1,
            rank_by: RankBy::Bid,
            parallel: true,
        }
    }
}

impl AudienceExperiment {
    /// Gender allocation scenario ranked by bid times quality.
    ///
    /// STEM has full quality everywhere; Makeup has 0.5 on female and 0.1 on
    /// male impressions. Quality-weighted scores tie in both audiences
    /// (10 x 0.5 = 5 x 1.0 and 2 x 0.1 = 0.2 x 1.0), so bid noise decides.
    pub fn original() -> Self {
        Self {
            advertisers: vec![
                AdvertiserSpec::new("Makeup")
                    .with_value("female", 10.0)
                    .with_value("male", 2.0)
                    .with_quality("female", 0.5)
                    .with_quality("male", 0.1),
                AdvertiserSpec::new("STEM")
                    .with_value("female", 5.0)
                    .with_value("male", 0.2),
            ],
            rank_by: RankBy::BidTimesCtr,
            ..Self::default()
        }
    }

    /// Check advertisers, audiences and numeric parameters.
    pub fn validate(&self) -> Result<()> {
        if self.impressions == 0 {
            return Err(Error::invalid_configuration("impressions must be positive"));
        }
        if self.audiences.is_empty() {
            return Err(Error::invalid_configuration("at least one audience is required"));
        }
        if self.audiences.iter().any(|a| !a.proportion.is_finite() || a.proportion < 0.0) {
            return Err(Error::invalid_configuration(
                "audience proportions must be finite and non-negative",
            ));
        }
        if self.ctr_weights.is_empty()
            || self.ctr_weights.iter().any(|w| !w.is_finite() || *w <= 0.0)
        {
            return Err(Error::invalid_configuration(
                "ctr weights must be non-empty and positive",
            ));
        }
        if !self.bid_noise.is_finite() || self.bid_noise < 0.0 {
            return Err(Error::invalid_configuration(format!(
                "bid noise must be non-negative, got {}",
                self.bid_noise
            )));
        }

        let mut names = BTreeSet::new();
        for advertiser in &self.advertisers {
            if !names.insert(advertiser.name.as_str()) {
                return Err(Error::DuplicateBidder(advertiser.name.clone()));
            }
            if advertiser.values.values().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(Error::invalid_configuration(format!(
                    "{}: values must be finite and non-negative",
                    advertiser.name
                )));
            }
            if let Some(q) = advertiser.quality.values().find(|q| !q.is_finite() || **q <= 0.0) {
                return Err(Error::InvalidQuality {
                    bidder: advertiser.name.clone(),
                    value: *q,
                });
            }
            if !advertiser.bid_rule.is_valid() {
                return Err(Error::invalid_configuration(format!(
                    "{}: invalid bid rule {:?}",
                    advertiser.name, advertiser.bid_rule
                )));
            }
        }
        Ok(())
    }

    /// Bidders for one impression. Advertisers that value none of the
    /// impression's tags stay out.
    fn bidders_for(&self, audience: &AudienceSpec, noise: &LogNormal<f64>, rng: &mut StdRng) -> Vec<Bidder> {
        let mut bidders = Vec::with_capacity(self.advertisers.len());
        for advertiser in &self.advertisers {
            let value = advertiser.valuation(audience.impression_tags());
            if value > 0.0 {
                let bid = advertiser.bid_rule.bid(value) * noise.sample(rng);
                bidders.push(
                    Bidder::new(advertiser.name.clone(), bid)
                        .with_quality(advertiser.quality_for(&audience.label)),
                );
            }
        }
        bidders
    }

    /// Impression inputs. Identical across mechanisms for the same seed.
    pub fn round_inputs(&self) -> Result<Vec<RoundInput>> {
        self.validate()?;
        let chooser = WeightedIndex::new(self.audiences.iter().map(|a| a.proportion))
            .map_err(|e| Error::invalid_configuration(format!("audience proportions: {e}")))?;
        let noise = lognormal(1.0, self.bid_noise)?;
        let spots = AdSpot::ladder(&self.ctr_weights);

        Ok((0..u64::from(self.impressions))
            .map(|impression| {
                let mut rng = round_rng(self.seed, impression);
                let audience = &self.audiences[chooser.sample(&mut rng)];
                let bidders = self.bidders_for(audience, &noise, &mut rng);
                RoundInput::new(bidders, spots.clone()).with_audience(audience.label.clone())
            })
            .collect())
    }

    /// Run every impression under one mechanism.
    pub fn run(&self, mechanism: MechanismKind) -> Result<AudienceReport> {
        let inputs = self.round_inputs()?;
        let config = AuctionConfig::for_mechanism(mechanism).with_rank_by(self.rank_by);
        let mut platform = Platform::with_config(config);
        let records = platform.run_batch(&inputs, mechanism, self.parallel)?;

        let report = AudienceReport::from_records(mechanism, records);
        info!(
            %mechanism,
            impressions = report.impressions,
            revenue = report.revenue,
            "audience experiment complete"
        );
        Ok(report)
    }

    /// Run every mechanism over the same impressions.
    pub fn run_all(&self) -> Result<BTreeMap<MechanismKind, AudienceReport>> {
        MechanismKind::ALL
            .iter()
            .map(|&mechanism| Ok((mechanism, self.run(mechanism)?)))
            .collect()
    }
}

/// Who won each audience's impressions, and what they paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceReport {
    /// Pricing rule used.
    pub mechanism: MechanismKind,
    /// Impressions auctioned.
    pub impressions: u64,
    /// Top-slot wins by audience, then advertiser ([`NO_WINNER`] if unsold).
    pub counts: BTreeMap<String, BTreeMap<String, u64>>,
    /// Spend by advertiser over all slots.
    pub total_spend: BTreeMap<String, f64>,
    /// Sum of all prices.
    pub revenue: f64,
}

impl AudienceReport {
    /// Summarize recorded impressions.
    pub fn from_records(mechanism: MechanismKind, records: &[RoundRecord]) -> Self {
        let mut counts: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        let mut total_spend: BTreeMap<String, f64> = BTreeMap::new();
        let mut revenue = 0.0;

        for record in records {
            let audience = record.metadata.audience.as_deref().unwrap_or("unlabelled");
            let top = record
                .result
                .winner_at(0)
                .map_or(NO_WINNER, |w| w.bidder_id.as_str());
            *counts
                .entry(audience.to_string())
                .or_default()
                .entry(top.to_string())
                .or_insert(0) += 1;

            for winner in record.result.winners() {
                *total_spend.entry(winner.bidder_id.clone()).or_insert(0.0) += winner.price;
            }
            revenue += record.result.revenue();
        }

        Self {
            mechanism,
            impressions: records.len() as u64,
            counts,
            total_spend,
            revenue,
        }
    }

    /// Average revenue per impression.
    pub fn avg_price(&self) -> f64 {
        if self.impressions == 0 {
            0.0
        } else {
            self.revenue / self.impressions as f64
        }
    }

    /// Impressions shown to an audience.
    pub fn impressions_for(&self, audience: &str) -> u64 {
        self.counts.get(audience).map_or(0, |c| c.values().sum())
    }

    /// Fraction of an audience's impressions won by `advertiser`.
    pub fn share(&self, audience: &str, advertiser: &str) -> f64 {
        let total = self.impressions_for(audience);
        if total == 0 {
            return 0.0;
        }
        let won = self
            .counts
            .get(audience)
            .and_then(|c| c.get(advertiser))
            .copied()
            .unwrap_or(0);
        won as f64 / total as f64
    }

    /// Shares by audience, then advertiser.
    pub fn shares(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.counts
            .iter()
            .map(|(audience, counts)| {
                let shares = counts
                    .keys()
                    .map(|advertiser| (advertiser.clone(), self.share(audience, advertiser)))
                    .collect();
                (audience.clone(), shares)
            })
            .collect()
    }
}

impl fmt::Display for AudienceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Method: {}", self.mechanism)?;
        writeln!(f, "Total impressions: {}", self.impressions)?;
        writeln!(f, "Average price per impression: {:.3}", self.avg_price())?;
        writeln!(f, "Total spend by bidder:")?;
        for (advertiser, spend) in &self.total_spend {
            writeln!(f, "  {advertiser}: {spend:.2}")?;
        }
        for (audience, counts) in &self.counts {
            writeln!(f, "Impressions for {audience}: {}", self.impressions_for(audience))?;
            let mut ordered: Vec<_> = counts.iter().collect();
            ordered.sort_by(|a, b| b.1.cmp(a.1));
            for (advertiser, count) in ordered {
                writeln!(
                    f,
                    "  {advertiser}: {count} ({:.2}%)",
                    self.share(audience, advertiser) * 100.0
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn make_experiment(impressions: u32) -> AudienceExperiment {
        AudienceExperiment {
            impressions,
            seed: 42,
            ..Default::default()
        }
    }

    #[test]
    fn test_stem_shown_more_to_male_audience() {
        let report = make_experiment(1000).run(MechanismKind::SecondPrice).unwrap();
        let female = report.share("female", "STEM");
        let male = report.share("male", "STEM");
        assert!(male > female, "male {male} vs female {female}");
        assert_eq!(
            report.impressions_for("female") + report.impressions_for("male"),
            1000
        );
    }

    #[test]
    fn test_run_all_same_allocation_different_prices() {
        let reports = make_experiment(300).run_all().unwrap();
        assert_eq!(reports.len(), 3);

        let first = &reports[&MechanismKind::FirstPrice];
        let second = &reports[&MechanismKind::SecondPrice];
        let gsp = &reports[&MechanismKind::Gsp];
        // Ranking does not depend on the pricing rule.
        assert_eq!(first.counts, second.counts);
        let relabelled = AudienceReport {
            mechanism: MechanismKind::SecondPrice,
            ..gsp.clone()
        };
        assert_eq!(second, &relabelled);
        assert!(first.revenue > second.revenue);
    }

    #[test]
    fn test_zero_value_advertisers_stay_out() {
        let experiment = AudienceExperiment {
            advertisers: vec![AdvertiserSpec::new("Niche").with_value("female", 3.0)],
            bid_noise: 0.0,
            ..make_experiment(200)
        };
        let report = experiment.run(MechanismKind::FirstPrice).unwrap();

        assert_eq!(report.share("male", NO_WINNER), 1.0);
        assert_eq!(report.share("female", "Niche"), 1.0);
        // No noise: every female impression pays exactly 3.
        let female = report.impressions_for("female") as f64;
        assert_relative_eq!(report.total_spend["Niche"], 3.0 * female, epsilon = 1e-9);
    }

    #[test]
    fn test_second_price_with_single_bidder_is_free() {
        let experiment = AudienceExperiment {
            advertisers: vec![AdvertiserSpec::new("Solo")
                .with_value("female", 5.0)
                .with_value("male", 5.0)],
            ..make_experiment(50)
        };
        let report = experiment.run(MechanismKind::Gsp).unwrap();
        assert_eq!(report.revenue, 0.0);
        assert_eq!(report.avg_price(), 0.0);
    }

    #[test]
    fn test_quality_ranking_shifts_allocation() {
        let experiment = AudienceExperiment {
            advertisers: vec![
                AdvertiserSpec::new("High").with_value("female", 5.0).with_quality("female", 0.2),
                AdvertiserSpec::new("Low").with_value("female", 3.0),
            ],
            audiences: vec![AudienceSpec::new("female", 1.0)],
            bid_noise: 0.0,
            ..make_experiment(20)
        };
        let by_bid = experiment.run(MechanismKind::SecondPrice).unwrap();
        assert_eq!(by_bid.share("female", "High"), 1.0);

        let by_score = AudienceExperiment {
            rank_by: RankBy::BidTimesCtr,
            ..experiment
        }
        .run(MechanismKind::SecondPrice)
        .unwrap();
        assert_eq!(by_score.share("female", "Low"), 1.0);
        // Low pays High's score over its own quality: 5 * 0.2 / 1.0.
        assert_relative_eq!(by_score.avg_price(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shares_sum_to_one() {
        let report = make_experiment(400).run(MechanismKind::FirstPrice).unwrap();
        for shares in report.shares().values() {
            assert_relative_eq!(shares.values().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_validation() {
        let bad_noise = AudienceExperiment {
            bid_noise: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            bad_noise.run(MechanismKind::Gsp),
            Err(Error::InvalidConfiguration(_))
        ));

        let duplicate = AudienceExperiment {
            advertisers: vec![AdvertiserSpec::new("A"), AdvertiserSpec::new("A")],
            ..Default::default()
        };
        assert!(matches!(duplicate.validate(), Err(Error::DuplicateBidder(_))));

        let bad_quality = AudienceExperiment {
            advertisers: vec![AdvertiserSpec::new("A").with_quality("male", 0.0)],
            ..Default::default()
        };
        assert!(matches!(bad_quality.validate(), Err(Error::InvalidQuality { .. })));
    }

    #[test]
    fn test_report_display() {
        let report = make_experiment(100).run(MechanismKind::FirstPrice).unwrap();
        let text = report.to_string();
        assert!(text.starts_with("Method: first_price\nTotal impressions: 100\n"));
        assert!(text.contains("Impressions for female:"));
        assert!(text.contains("Impressions for male:"));
    }

    #[test]
    fn test_adjacent_seeds_share_no_impressions() {
        let inputs_for = |seed| {
            AudienceExperiment {
                impressions: 100,
                seed,
                ..Default::default()
            }
            .round_inputs()
            .unwrap()
        };
        let a = inputs_for(1);
        let b = inputs_for(2);

        for input in &a {
            assert!(!b.contains(input));
        }
    }

    #[test]
    fn test_valuation_sums_impression_tags() {
        let experiment = AudienceExperiment {
            advertisers: vec![AdvertiserSpec::new("Gear")
                .with_value("male", 1.0)
                .with_value("sports", 4.0)
                .with_value("tech", 9.0)],
            audiences: vec![AudienceSpec::new("male", 1.0).with_tag("sports")],
            bid_noise: 0.0,
            ..make_experiment(10)
        };
        let report = experiment.run(MechanismKind::FirstPrice).unwrap();
        // male + sports; tech is not on the impression.
        assert_relative_eq!(report.avg_price(), 5.0, epsilon = 1e-9);

        let spec = &experiment.advertisers[0];
        assert_relative_eq!(spec.valuation(["tech", "unknown"]), 9.0);
        assert_eq!(spec.valuation(std::iter::empty()), 0.0);
    }

    #[test]
    fn test_shaded_bidder_pays_less_under_first_price() {
        let make = |bid_rule| AudienceExperiment {
            advertisers: vec![AdvertiserSpec::new("A")
                .with_value("female", 4.0)
                .with_value("male", 4.0)
                .with_bid_rule(bid_rule)],
            bid_noise: 0.0,
            ..make_experiment(50)
        };
        let truthful = make(BidRule::Truthful).run(MechanismKind::FirstPrice).unwrap();
        let shaded = make(BidRule::Shade { factor: 0.5 })
            .run(MechanismKind::FirstPrice)
            .unwrap();

        assert_relative_eq!(truthful.avg_price(), 4.0, epsilon = 1e-9);
        assert_relative_eq!(shaded.avg_price(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shading_can_lose_the_auction() {
        let experiment = AudienceExperiment {
            advertisers: vec![
                AdvertiserSpec::new("Shader")
                    .with_value("female", 5.0)
                    .with_bid_rule(BidRule::Shade { factor: 0.5 }),
                AdvertiserSpec::new("Honest").with_value("female", 3.0),
            ],
            audiences: vec![AudienceSpec::new("female", 1.0)],
            bid_noise: 0.0,
            ..make_experiment(20)
        };
        let report = experiment.run(MechanismKind::SecondPrice).unwrap();
        // 2.5 < 3.0
        assert_eq!(report.share("female", "Honest"), 1.0);
        assert_relative_eq!(report.avg_price(), 2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_bid_rule_serde_and_validation() {
        let rule: BidRule = serde_json::from_str(r#"{"kind":"shade","factor":0.8}"#).unwrap();
        assert_eq!(rule, BidRule::Shade { factor: 0.8 });
        let spec: AdvertiserSpec = serde_json::from_str(r#"{"name":"X"}"#).unwrap();
        assert_eq!(spec.bid_rule, BidRule::Truthful);

        let invalid = AudienceExperiment {
            advertisers: vec![AdvertiserSpec::new("A").with_bid_rule(BidRule::Shade { factor: 1.5 })],
            ..Default::default()
        };
        assert!(matches!(invalid.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_original_preset_ties_quality_weighted_scores() {
        let preset = AudienceExperiment::original();
        assert_eq!(preset.rank_by, RankBy::BidTimesCtr);
        let makeup = &preset.advertisers[0];
        let stem = &preset.advertisers[1];
        for audience in ["female", "male"] {
            let makeup_score = makeup.valuation([audience]) * makeup.quality_for(audience);
            let stem_score = stem.valuation([audience]) * stem.quality_for(audience);
            assert_relative_eq!(makeup_score, stem_score, epsilon = 1e-12);
        }

        // Ties leave the noise to split each audience roughly evenly.
        let report = preset.run(MechanismKind::SecondPrice).unwrap();
        for audience in ["female", "male"] {
            let share = report.share(audience, "STEM");
            assert!((0.4..0.6).contains(&share), "{audience}: {share}");
        }
    }
}

//! Segment statistics computed from platform history.
//!
//! Everything here is derived from recorded round results. Allocation is
//! never re-run.

use adauction_core::{MechanismKind, RankBy};
use adauction_platform::RoundRecord;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use std::fmt;

/// Key used for bidders without a segment label.
pub const UNSEGMENTED: &str = "unsegmented";

/// Per-segment outcome counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    /// Bidder-rounds in which a member of the segment took part.
    pub appearances: u64,
    /// Bidder-rounds that won a slot.
    pub wins: u64,
    /// Wins per slot index.
    pub wins_by_slot: Vec<u64>,
    /// Sum of prices paid.
    pub total_paid: f64,
    /// Sum of expected clicks received.
    pub expected_clicks: f64,
}

impl SegmentStats {
    /// Wins per appearance, 0 when the segment never appeared.
    pub fn win_rate(&self) -> f64 {
        if self.appearances == 0 {
            0.0
        } else {
            self.wins as f64 / self.appearances as f64
        }
    }

    /// Mean price per win, 0 when the segment never won.
    pub fn avg_price(&self) -> f64 {
        if self.wins == 0 {
            0.0
        } else {
            self.total_paid / self.wins as f64
        }
    }

    fn record_win(&mut self, slot: usize, price: f64, clicks: f64) {
        self.wins += 1;
        if self.wins_by_slot.len() <= slot {
            self.wins_by_slot.resize(slot + 1, 0);
        }
        self.wins_by_slot[slot] += 1;
        self.total_paid += price;
        self.expected_clicks += clicks;
    }
}

/// Aggregate per-segment statistics over a round history.
pub fn segment_stats(records: &[RoundRecord]) -> BTreeMap<String, SegmentStats> {
    let mut stats: BTreeMap<String, SegmentStats> = BTreeMap::new();

    for record in records {
        for (segment, count) in &record.metadata.composition {
            stats.entry(segment.clone()).or_default().appearances += *count as u64;
        }
        if record.metadata.unsegmented > 0 {
            stats.entry(UNSEGMENTED.to_string()).or_default().appearances +=
                record.metadata.unsegmented as u64;
        }

        for (slot, assignment) in record.result.slots.iter().enumerate() {
            if let Some(winner) = &assignment.winner {
                let key = winner.segment.as_deref().unwrap_or(UNSEGMENTED);
                stats.entry(key.to_string()).or_default().record_win(
                    slot,
                    winner.price,
                    assignment.expected_clicks(),
                );
            }
        }
    }

    stats
}

/// Two-proportion z-test on win rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinRateComparison {
    /// Rate of the first group minus rate of the second.
    pub difference: f64,
    /// Pooled z statistic.
    pub z_score: f64,
    /// Two-sided p-value.
    pub p_value: f64,
}

impl WinRateComparison {
    /// Compare `wins_a / n_a` against `wins_b / n_b`.
    ///
    /// Returns None when either group is empty or the pooled variance is zero
    /// (both rates 0 or both 1).
    pub fn two_proportion(wins_a: u64, n_a: u64, wins_b: u64, n_b: u64) -> Option<Self> {
        if n_a == 0 || n_b == 0 {
            return None;
        }
        let (na, nb) = (n_a as f64, n_b as f64);
        let (pa, pb) = (wins_a as f64 / na, wins_b as f64 / nb);
        let pooled = (wins_a + wins_b) as f64 / (na + nb);
        let se = (pooled * (1.0 - pooled) * (1.0 / na + 1.0 / nb)).sqrt();
        if se.is_nan() || se <= 0.0 {
            return None;
        }

        let z_score = (pa - pb) / se;
        let standard = Normal::new(0.0, 1.0).ok()?;
        let p_value = (2.0 * (1.0 - standard.cdf(z_score.abs()))).clamp(0.0, 1.0);

        Some(Self {
            difference: pa - pb,
            z_score,
            p_value,
        })
    }

    /// Is the difference significant at level `alpha`?
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Summary of one segment experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    /// Pricing rule used.
    pub mechanism: MechanismKind,
    /// Ranking key used.
    pub rank_by: RankBy,
    /// Rounds recorded.
    pub rounds: u64,
    /// Statistics keyed by segment label ([`UNSEGMENTED`] for unlabelled bidders).
    pub segments: BTreeMap<String, SegmentStats>,
    /// Total revenue over all rounds.
    pub revenue: f64,
}

impl ExperimentReport {
    /// Build a report from recorded rounds.
    pub fn from_records(mechanism: MechanismKind, rank_by: RankBy, records: &[RoundRecord]) -> Self {
        Self {
            mechanism,
            rank_by,
            rounds: records.len() as u64,
            segments: segment_stats(records),
            revenue: records.iter().map(|r| r.result.revenue()).sum(),
        }
    }

    /// Win rate of a segment.
    pub fn win_rate(&self, segment: &str) -> Option<f64> {
        self.segments.get(segment).map(SegmentStats::win_rate)
    }

    /// Average price paid by a segment's winners.
    pub fn avg_price(&self, segment: &str) -> Option<f64> {
        self.segments.get(segment).map(SegmentStats::avg_price)
    }

    /// Test whether two segments' win rates differ.
    pub fn compare_win_rates(&self, a: &str, b: &str) -> Option<WinRateComparison> {
        let (a, b) = (self.segments.get(a)?, self.segments.get(b)?);
        WinRateComparison::two_proportion(a.wins, a.appearances, b.wins, b.appearances)
    }
}

impl fmt::Display for ExperimentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Mechanism: {} (rank by {}), {} rounds, revenue {:.2}",
            self.mechanism, self.rank_by, self.rounds, self.revenue
        )?;
        for (segment, stats) in &self.segments {
            writeln!(
                f,
                "  {segment}: {} wins / {} appearances ({:.2}%), avg price {:.3}",
                stats.wins,
                stats.appearances,
                stats.win_rate() * 100.0,
                stats.avg_price()
            )?;
        }
        Ok(())
    }
}

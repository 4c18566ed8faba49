//! Demo: a single multi-slot round under each mechanism, the audience
//! experiment, and the segment experiment under both ranking keys.
//!
//! Set `ADAUCTION_CONFIG` to a JSON file to override the segment experiment
//! configuration. Log level comes from `RUST_LOG` (default `info`).

use adauction_core::{AdSpot, Bidder, Config, MechanismKind, RankBy};
use adauction_experiment::{AudienceExperiment, ExperimentRunner};
use adauction_platform::Platform;
use anyhow::Context;
use tracing::{debug, info};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("ADAUCTION_CONFIG") {
        Ok(path) => {
            info!(%path, "loading configuration");
            Config::from_file(&path).with_context(|| format!("failed to load config from {path}"))?
        }
        Err(_) => Config::default(),
    };

    demo_round()?;
    audience_experiment()?;
    segment_experiment(&config)?;
    Ok(())
}

fn demo_round() -> anyhow::Result<()> {
    let mut platform: Platform = [
        Bidder::new("Alpha", 5.0),
        Bidder::new("Beta", 3.0),
        Bidder::new("Gamma", 2.0),
    ]
    .into_iter()
    .collect();
    println!("{platform}");

    let spots = AdSpot::ladder(&[0.9, 0.5]);
    for mechanism in MechanismKind::ALL {
        let result = platform.run_registered(&spots, mechanism)?;
        println!("\nMethod: {mechanism}");
        for slot in &result.slots {
            match &slot.winner {
                Some(w) => println!(
                    "  slot {}: {} pays {:.2} (surplus {:.2})",
                    slot.position,
                    w.bidder_id,
                    w.price,
                    w.surplus()
                ),
                None => println!("  slot {}: unassigned", slot.position),
            }
        }
    }
    Ok(())
}

fn audience_experiment() -> anyhow::Result<()> {
    let experiment = AudienceExperiment::default();
    for report in experiment.run_all()?.values() {
        println!("\n{report}");
    }
    Ok(())
}

fn segment_experiment(config: &Config) -> anyhow::Result<()> {
    let labels: Vec<&str> = config
        .population
        .segments
        .iter()
        .map(|s| s.label.as_str())
        .collect();

    for rank_by in [RankBy::Bid, RankBy::BidTimesCtr] {
        let mut config = config.clone();
        config.auction.rank_by = rank_by;

        let report = ExperimentRunner::new(&config)?.run()?;
        println!("\n{report}");
        debug!(report = %serde_json::to_string(&report)?, "segment report");

        if let [a, b, ..] = labels.as_slice() {
            if let Some(cmp) = report.compare_win_rates(a, b) {
                println!(
                    "  win-rate gap {a} - {b}: {:+.4} (z = {:.2}, p = {:.3e})",
                    cmp.difference, cmp.z_score, cmp.p_value
                );
            }
        }
    }
    Ok(())
}

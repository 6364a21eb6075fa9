//! Monte Carlo robustness checks.
//!
//! Auctions are re-run with Gaussian noise on each bidder's trust (clamped
//! to `[0, 1]`) and on its bid (clamped to `[0, budget]`). Every draw comes
//! from a `StdRng` seeded from the configuration, so a report is
//! reproducible run to run.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::error::AnalysisError;
use crate::simulation::{simulate_bid, BidStrategy, Simulator};
use crate::stats::{mean, percentile, Summary};

pub const TRUST_NOISE_LEVELS: [f64; 5] = [0.0, 0.05, 0.1, 0.15, 0.2];
pub const BID_NOISE_LEVELS: [f64; 5] = [0.0, 5.0, 10.0, 15.0, 20.0];

/// Noise applied when sampling the winner distribution.
pub const WINNER_TRUST_NOISE: f64 = 0.05;
pub const WINNER_BID_NOISE: f64 = 2.0;

/// Zero-mean Gaussian perturbations for trust and bids.
#[derive(Debug, Clone)]
pub struct NoiseModel {
    trust: Normal<f64>,
    bid: Normal<f64>,
}

impl NoiseModel {
    pub fn new(trust_std: f64, bid_std: f64) -> Result<Self, AnalysisError> {
        let normal = |std: f64| {
            Normal::new(0.0, std)
                .map_err(|e| AnalysisError::Config(format!("noise std {std}: {e}")))
        };
        Ok(Self {
            trust: normal(trust_std)?,
            bid: normal(bid_std)?,
        })
    }
}

/// Winner of one perturbed auction.
#[derive(Debug, Clone, PartialEq)]
pub struct NoisyAuction {
    pub winner_id: String,
    pub winning_bid: f64,
    pub num_agents: usize,
}

/// Run `query_id` once with perturbed trust and bids. Trust is drawn before
/// the bid is priced, so trust noise also moves the bid. The first agent
/// with the highest value wins. `None` when nobody knows the query.
pub fn run_noisy<R: Rng + ?Sized>(
    simulator: &Simulator<'_>,
    query_id: &str,
    trust_weight: Decimal,
    strategy: BidStrategy,
    noise: &NoiseModel,
    rng: &mut R,
) -> Option<NoisyAuction> {
    let holders = simulator.corpus().holders(query_id);
    if holders.is_empty() {
        return None;
    }
    let competitors = holders.len() - 1;
    let budget = simulator.budget().to_f64().unwrap_or(f64::NAN);
    let trust_weight = trust_weight.to_f64().unwrap_or(f64::NAN);

    let mut best: Option<(&String, f64, f64)> = None;
    for agent_id in holders {
        let base = simulator.trust_of(agent_id);
        let trust = (base.to_f64().unwrap_or(0.0) + noise.trust.sample(rng)).clamp(0.0, 1.0);
        let priced = simulate_bid(
            strategy,
            Decimal::from_f64(trust).unwrap_or(base),
            competitors,
            simulator.budget(),
        );
        let bid = (priced.to_f64().unwrap_or(budget) + noise.bid.sample(rng)).clamp(0.0, budget);

        let value = 100.0 * (trust_weight * trust + (1.0 - trust_weight) * (1.0 - bid / budget));
        match best {
            Some((_, _, top)) if value <= top => {}
            _ => best = Some((agent_id, bid, value)),
        }
    }

    best.map(|(winner, bid, _)| NoisyAuction {
        winner_id: winner.clone(),
        winning_bid: bid,
        num_agents: holders.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseLevel {
    pub trust_noise_std: f64,
    pub bid_noise_std: f64,
    pub winning_bid: Option<Summary>,
    /// Share of noisy auctions won by the agent that wins without noise.
    pub winner_stability: f64,
}

/// Winning bids as trust noise and bid noise grow, one axis at a time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseRobustness {
    pub seed: u64,
    pub samples_per_level: usize,
    pub trust_noise: Vec<NoiseLevel>,
    pub bid_noise: Vec<NoiseLevel>,
}

pub fn robustness_to_noise(
    simulator: &Simulator<'_>,
    trust_weight: Decimal,
    strategy: BidStrategy,
    samples: usize,
    seed: u64,
) -> Result<NoiseRobustness, AnalysisError> {
    let mut clean_winners = BTreeMap::new();
    for query_id in simulator.corpus().query_ids() {
        if let Some(outcome) = simulator.run_single_query(query_id, trust_weight, strategy)? {
            clean_winners.insert(query_id.to_string(), outcome.winner_id);
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut level = |trust_std: f64, bid_std: f64| -> Result<NoiseLevel, AnalysisError> {
        let noise = NoiseModel::new(trust_std, bid_std)?;
        let mut bids = Vec::new();
        let mut stable = 0usize;
        for _ in 0..samples {
            for query_id in simulator.corpus().query_ids() {
                let Some(auction) =
                    run_noisy(simulator, query_id, trust_weight, strategy, &noise, &mut rng)
                else {
                    continue;
                };
                if clean_winners.get(query_id) == Some(&auction.winner_id) {
                    stable += 1;
                }
                bids.push(auction.winning_bid);
            }
        }
        debug!(trust_std, bid_std, auctions = bids.len(), "Noise level sampled");
        Ok(NoiseLevel {
            trust_noise_std: trust_std,
            bid_noise_std: bid_std,
            winner_stability: if bids.is_empty() {
                0.0
            } else {
                stable as f64 / bids.len() as f64
            },
            winning_bid: Summary::from_samples(&bids),
        })
    };

    let trust_noise = TRUST_NOISE_LEVELS
        .iter()
        .map(|&std| level(std, 0.0))
        .collect::<Result<Vec<_>, _>>()?;
    let bid_noise = BID_NOISE_LEVELS
        .iter()
        .map(|&std| level(0.0, std))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NoiseRobustness {
        seed,
        samples_per_level: samples,
        trust_noise,
        bid_noise,
    })
}

/// Winning bids for auctions with `num_agents` bidders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinnerDistribution {
    pub num_agents: usize,
    pub auctions: usize,
    pub mean_bid: f64,
    pub std_bid: f64,
    /// Empirical 2.5th and 97.5th percentiles.
    pub interval_95: (f64, f64),
    pub wins: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloWinners {
    pub seed: u64,
    pub runs: usize,
    pub trust_noise_std: f64,
    pub bid_noise_std: f64,
    pub by_agent_count: Vec<WinnerDistribution>,
}

/// Re-run the whole corpus `runs` times under light noise and group the
/// winners by how many agents bid.
pub fn monte_carlo_winners(
    simulator: &Simulator<'_>,
    trust_weight: Decimal,
    strategy: BidStrategy,
    runs: usize,
    seed: u64,
) -> Result<MonteCarloWinners, AnalysisError> {
    let noise = NoiseModel::new(WINNER_TRUST_NOISE, WINNER_BID_NOISE)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut by_count: BTreeMap<usize, Vec<NoisyAuction>> = BTreeMap::new();
    for _ in 0..runs {
        for query_id in simulator.corpus().query_ids() {
            if let Some(auction) =
                run_noisy(simulator, query_id, trust_weight, strategy, &noise, &mut rng)
            {
                by_count.entry(auction.num_agents).or_default().push(auction);
            }
        }
    }

    let by_agent_count = by_count
        .into_iter()
        .map(|(num_agents, auctions)| {
            let bids: Vec<f64> = auctions.iter().map(|a| a.winning_bid).collect();
            let mut wins = BTreeMap::new();
            for auction in &auctions {
                *wins.entry(auction.winner_id.clone()).or_insert(0) += 1;
            }
            let m = mean(&bids);
            let variance = bids.iter().map(|b| (b - m).powi(2)).sum::<f64>() / bids.len() as f64;
            WinnerDistribution {
                num_agents,
                auctions: auctions.len(),
                mean_bid: m,
                std_bid: variance.sqrt(),
                interval_95: (percentile(&bids, 2.5), percentile(&bids, 97.5)),
                wins,
            }
        })
        .collect();

    Ok(MonteCarloWinners {
        seed,
        runs,
        trust_noise_std: WINNER_TRUST_NOISE,
        bid_noise_std: WINNER_BID_NOISE,
        by_agent_count,
    })
}

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tfc_agents::evaluator::price_score;
use tfc_agents::{BidEvaluator, ScoringWeights};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::corpus::MarketCorpus;
use crate::error::AnalysisError;
use crate::market::{
    verify_competition_analysis, CompetitionMismatch, DistributionCounts, MarketDistribution,
    MarketType,
};
use crate::noise::{monte_carlo_winners, robustness_to_noise, MonteCarloWinners, NoiseRobustness};
use crate::simulation::{
    quality_per_tfc, simulate_bid, BidStrategy, SimulationResults, Simulator,
};
use crate::stats::{mean, two_sample_t_test, Alternative, Summary, TTest};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStatistics {
    pub n: usize,
    pub winning_bid: Summary,
    pub pct_of_budget: Summary,
    pub quality_per_tfc: Summary,
}

/// Descriptive statistics for every market type that saw at least one
/// auction.
pub fn statistical_analysis(
    results: &SimulationResults,
    budget: Decimal,
) -> BTreeMap<MarketType, MarketStatistics> {
    let budget = budget.to_f64().unwrap_or(f64::NAN);
    MarketType::ALL
        .iter()
        .filter_map(|&market| {
            let outcomes = results.market(market);
            let bids: Vec<f64> = outcomes.iter().map(|o| o.winning_bid_f64()).collect();
            let pct: Vec<f64> = bids.iter().map(|b| b / budget * 100.0).collect();
            let quality: Vec<f64> = outcomes.iter().map(|o| o.winner_quality_per_tfc).collect();
            Some((
                market,
                MarketStatistics {
                    n: outcomes.len(),
                    winning_bid: Summary::from_samples(&bids)?,
                    pct_of_budget: Summary::from_samples(&pct)?,
                    quality_per_tfc: Summary::from_samples(&quality)?,
                },
            ))
        })
        .collect()
}

/// The two headline claims. A test is absent when its samples are too small.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HypothesisTests {
    /// Monopoly winning bids exceed duopoly winning bids.
    pub monopoly_vs_duopoly_pricing: Option<TTest>,
    /// Competitive markets (duopoly and high competition) buy more trust per
    /// TFC than monopolies.
    pub quality_improvement_with_competition: Option<TTest>,
}

pub fn hypothesis_tests(results: &SimulationResults) -> HypothesisTests {
    let bids = |market: MarketType| -> Vec<f64> {
        results.market(market).iter().map(|o| o.winning_bid_f64()).collect()
    };
    let quality = |markets: &[MarketType]| -> Vec<f64> {
        markets
            .iter()
            .flat_map(|&m| results.market(m))
            .map(|o| o.winner_quality_per_tfc)
            .collect()
    };

    let pricing = two_sample_t_test(
        &bids(MarketType::Monopoly),
        &bids(MarketType::Duopoly),
        Alternative::Greater,
    );
    let competition = two_sample_t_test(
        &quality(&[MarketType::Duopoly, MarketType::HighCompetition]),
        &quality(&[MarketType::Monopoly]),
        Alternative::Greater,
    );

    HypothesisTests {
        monopoly_vs_duopoly_pricing: skipped_on_error("pricing", pricing),
        quality_improvement_with_competition: skipped_on_error("quality", competition),
    }
}

fn skipped_on_error(name: &str, result: Result<TTest, AnalysisError>) -> Option<TTest> {
    result
        .map_err(|e| debug!(test = name, error = %e, "Skipping hypothesis test"))
        .ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AblationCell {
    pub mean_bid: Option<f64>,
    pub mean_quality_per_tfc: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AblationPoint {
    #[serde(with = "rust_decimal::serde::float")]
    pub trust_weight: Decimal,
    pub markets: BTreeMap<MarketType, AblationCell>,
}

/// Re-run the corpus at each trust weight and average per market type.
pub fn ablation(
    simulator: &Simulator<'_>,
    trust_weights: &[Decimal],
    strategy: BidStrategy,
) -> Result<Vec<AblationPoint>, AnalysisError> {
    trust_weights
        .iter()
        .map(|&trust_weight| {
            let results = simulator.run_all(trust_weight, strategy)?;
            let markets = MarketType::ALL
                .iter()
                .map(|&market| {
                    let outcomes = results.market(market);
                    let bids: Vec<f64> = outcomes.iter().map(|o| o.winning_bid_f64()).collect();
                    let quality: Vec<f64> =
                        outcomes.iter().map(|o| o.winner_quality_per_tfc).collect();
                    let cell = AblationCell {
                        mean_bid: (!bids.is_empty()).then(|| mean(&bids)),
                        mean_quality_per_tfc: (!quality.is_empty()).then(|| mean(&quality)),
                    };
                    (market, cell)
                })
                .collect();
            Ok(AblationPoint {
                trust_weight,
                markets,
            })
        })
        .collect()
}

/// Averages over the queries a selection method awarded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MethodSummary {
    pub selections: usize,
    pub mean_bid: Option<f64>,
    pub mean_trust: Option<f64>,
    pub mean_quality_per_tfc: Option<f64>,
}

impl MethodSummary {
    fn from_picks(picks: &[(Decimal, Decimal)]) -> Self {
        Self {
            selections: picks.len(),
            mean_bid: mean_of(picks, |(bid, _)| bid.to_f64().unwrap_or(f64::NAN)),
            mean_trust: mean_of(picks, |(_, trust)| trust.to_f64().unwrap_or(f64::NAN)),
            mean_quality_per_tfc: mean_of(picks, |(bid, trust)| quality_per_tfc(*trust, *bid)),
        }
    }
}

fn mean_of(picks: &[(Decimal, Decimal)], f: impl Fn(&(Decimal, Decimal)) -> f64) -> Option<f64> {
    let values: Vec<f64> = picks.iter().map(f).collect();
    (!values.is_empty()).then(|| mean(&values))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baselines {
    pub ours_trust_based: MethodSummary,
    pub random_selection: MethodSummary,
    pub lowest_bid_wins: MethodSummary,
    pub highest_trust_wins: MethodSummary,
}

/// Compare the trust-weighted winners in `results` with three naive
/// selection rules applied to the same simulated bids: a uniformly random
/// bidder drawn from `seed`, the cheapest bid and the most trusted bidder.
/// Ties go to the first agent in knowledge-file order.
pub fn baselines(
    simulator: &Simulator<'_>,
    results: &SimulationResults,
    strategy: BidStrategy,
    seed: u64,
) -> Baselines {
    let ours: Vec<(Decimal, Decimal)> = results
        .outcomes()
        .map(|o| (o.winning_bid, o.winner_trust))
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut random = Vec::new();
    let mut lowest = Vec::new();
    let mut highest = Vec::new();
    for query_id in simulator.corpus().query_ids() {
        let bids = simulator.bids(query_id, strategy);
        if let Some(pick) = bids.choose(&mut rng) {
            random.push((pick.amount, pick.trust));
        }
        let cheapest = bids
            .iter()
            .reduce(|best, b| if b.amount < best.amount { b } else { best });
        let most_trusted = bids
            .iter()
            .reduce(|best, b| if b.trust > best.trust { b } else { best });
        if let (Some(c), Some(t)) = (cheapest, most_trusted) {
            lowest.push((c.amount, c.trust));
            highest.push((t.amount, t.trust));
        }
    }

    Baselines {
        ours_trust_based: MethodSummary::from_picks(&ours),
        random_selection: MethodSummary::from_picks(&random),
        lowest_bid_wins: MethodSummary::from_picks(&lowest),
        highest_trust_wins: MethodSummary::from_picks(&highest),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ManipulationTrial {
    pub discount: f64,
    #[serde(with = "rust_decimal::serde::float")]
    pub low_trust_bid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub low_trust_value: Decimal,
    pub low_trust_wins: bool,
}

/// Can a low-trust agent beat a high-trust one in a duopoly by undercutting?
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManipulationCheck {
    #[serde(with = "rust_decimal::serde::float")]
    pub low_trust: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub high_trust: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub high_trust_bid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub high_trust_value: Decimal,
    pub trials: Vec<ManipulationTrial>,
}

/// Does a cheaper, less trusted defector break a two-agent price-fixing pact?
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollusionCheck {
    #[serde(with = "rust_decimal::serde::float")]
    pub colluding_bid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub colluder_a_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub colluder_b_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub defector_bid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub defector_value: Decimal,
    pub defector_wins: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobustnessChecks {
    pub manipulation: ManipulationCheck,
    pub collusion: CollusionCheck,
    pub noise: NoiseRobustness,
    pub winner_distribution: MonteCarloWinners,
}

fn two_factor_value(
    evaluator: &BidEvaluator,
    trust: Decimal,
    bid: Decimal,
    budget: Decimal,
) -> Decimal {
    evaluator.value_score(trust, price_score(bid, budget), Decimal::ZERO)
}

pub fn manipulation_check(budget: Decimal) -> ManipulationCheck {
    let evaluator = BidEvaluator::new(ScoringWeights::two_factor());
    let (low_trust, high_trust) = (Decimal::new(4, 1), Decimal::new(9, 1));

    let high_trust_bid = simulate_bid(BidStrategy::Default, high_trust, 1, budget);
    let high_trust_value = two_factor_value(&evaluator, high_trust, high_trust_bid, budget);
    let honest_low = simulate_bid(BidStrategy::Default, low_trust, 1, budget);

    let trials = (0..=3)
        .map(|step| {
            let discount = Decimal::new(step, 1);
            let low_trust_bid = honest_low * (Decimal::ONE - discount);
            let low_trust_value = two_factor_value(&evaluator, low_trust, low_trust_bid, budget);
            ManipulationTrial {
                discount: discount.to_f64().unwrap_or(f64::NAN),
                low_trust_bid,
                low_trust_value,
                low_trust_wins: low_trust_value > high_trust_value,
            }
        })
        .collect();

    ManipulationCheck {
        low_trust,
        high_trust,
        high_trust_bid,
        high_trust_value,
        trials,
    }
}

pub fn collusion_check(budget: Decimal) -> CollusionCheck {
    let evaluator = BidEvaluator::new(ScoringWeights::two_factor());
    let colluding_bid = budget * Decimal::new(85, 2);
    let defector_bid = budget * Decimal::new(75, 2);

    let colluder_a_value = two_factor_value(&evaluator, Decimal::new(70, 2), colluding_bid, budget);
    let colluder_b_value = two_factor_value(&evaluator, Decimal::new(65, 2), colluding_bid, budget);
    let defector_value = two_factor_value(&evaluator, Decimal::new(60, 2), defector_bid, budget);

    CollusionCheck {
        colluding_bid,
        colluder_a_value,
        colluder_b_value,
        defector_bid,
        defector_value,
        defector_wins: defector_value > colluder_a_value.max(colluder_b_value),
    }
}

/// Everything `tfc-analyze` prints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComprehensiveReport {
    #[serde(with = "rust_decimal::serde::float")]
    pub budget: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub trust_weight: Decimal,
    pub strategy: BidStrategy,
    pub distribution: DistributionCounts,
    pub competition_mismatches: Vec<CompetitionMismatch>,
    pub experiments: SimulationResults,
    pub statistics: BTreeMap<MarketType, MarketStatistics>,
    pub hypothesis_tests: HypothesisTests,
    pub ablation_study: Vec<AblationPoint>,
    pub baseline_comparisons: Baselines,
    pub robustness: RobustnessChecks,
}

pub fn comprehensive_report(
    corpus: &MarketCorpus,
    config: &SimulationConfig,
) -> Result<ComprehensiveReport, AnalysisError> {
    config.validate()?;

    let distribution = MarketDistribution::build(corpus).counts();
    let competition_mismatches = verify_competition_analysis(&corpus.knowledge, corpus);
    if !competition_mismatches.is_empty() {
        info!(
            mismatches = competition_mismatches.len(),
            "competition_analysis disagrees with agent knowledge"
        );
    }

    let simulator = Simulator::new(corpus, config);
    let experiments = simulator.run_all(config.trust_weight, config.strategy)?;
    info!(
        auctions = experiments.len(),
        monopoly = distribution.monopoly,
        duopoly = distribution.duopoly,
        high_competition = distribution.high_competition,
        "Simulated corpus"
    );

    Ok(ComprehensiveReport {
        budget: config.budget,
        trust_weight: config.trust_weight,
        strategy: config.strategy,
        statistics: statistical_analysis(&experiments, config.budget),
        hypothesis_tests: hypothesis_tests(&experiments),
        ablation_study: ablation(&simulator, &config.ablation_weights, config.strategy)?,
        baseline_comparisons: baselines(&simulator, &experiments, config.strategy, config.seed),
        robustness: RobustnessChecks {
            manipulation: manipulation_check(config.budget),
            collusion: collusion_check(config.budget),
            noise: robustness_to_noise(
                &simulator,
                config.trust_weight,
                config.strategy,
                config.noise_samples,
                config.seed,
            )?,
            winner_distribution: monte_carlo_winners(
                &simulator,
                config.trust_weight,
                config.strategy,
                config.monte_carlo_runs,
                config.seed,
            )?,
        },
        distribution,
        competition_mismatches,
        experiments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::fixture;
    use rust_decimal_macros::dec;

    fn results(corpus: &MarketCorpus, trust_weight: Decimal) -> SimulationResults {
        Simulator::new(corpus, &SimulationConfig::default())
            .run_all(trust_weight, BidStrategy::Default)
            .unwrap()
    }

    #[test]
    fn statistics_per_market() {
        let corpus = fixture();
        let stats = statistical_analysis(&results(&corpus, dec!(0.6)), dec!(120));
        assert_eq!(stats.len(), 3);
        let monopoly = &stats[&MarketType::Monopoly];
        assert_eq!(monopoly.n, 1);
        assert_eq!(monopoly.winning_bid.mean, 108.0);
        assert!((monopoly.pct_of_budget.mean - 90.0).abs() < 1e-9);
        assert_eq!(monopoly.winning_bid.std, 0.0);
    }

    #[test]
    fn tiny_samples_skip_hypothesis_tests() {
        let corpus = fixture();
        let tests = hypothesis_tests(&results(&corpus, dec!(0.6)));
        // one monopoly and one duopoly auction: too few for a pooled test
        assert!(tests.monopoly_vs_duopoly_pricing.is_none());
        // two competitive auctions against one monopoly
        let quality = tests.quality_improvement_with_competition.unwrap();
        assert_eq!(quality.degrees_of_freedom, 1.0);
    }

    #[test]
    fn ablation_shifts_duopoly_winner() {
        let corpus = fixture();
        let sim = Simulator::new(&corpus, &SimulationConfig::default());
        let points = ablation(&sim, &[dec!(0), dec!(0.6)], BidStrategy::Default).unwrap();
        assert_eq!(points.len(), 2);

        let price_only = points[0].markets[&MarketType::Duopoly].mean_bid.unwrap();
        let trust_heavy = points[1].markets[&MarketType::Duopoly].mean_bid.unwrap();
        assert!((price_only - 72.96).abs() < 1e-9);
        assert!((trust_heavy - 89.16).abs() < 1e-9);
        assert_eq!(
            points[0].markets[&MarketType::Monopoly].mean_bid,
            Some(108.0)
        );
    }

    #[test]
    fn baselines_bracket_trust_based_selection() {
        let corpus = fixture();
        let sim = Simulator::new(&corpus, &SimulationConfig::default());
        let res = sim.run_all(dec!(0.6), BidStrategy::Default).unwrap();
        let b = baselines(&sim, &res, BidStrategy::Default, 42);

        assert_eq!(b.ours_trust_based.selections, 3);
        assert_eq!(b.lowest_bid_wins.selections, 3);
        // lowest bid: 108, 72.96, 74.4
        let lowest = b.lowest_bid_wins.mean_bid.unwrap();
        assert!((lowest - (108.0 + 72.96 + 74.4) / 3.0).abs() < 1e-9);
        // Agent_A is the most trusted everywhere it competes
        let highest = b.highest_trust_wins.mean_trust.unwrap();
        assert!((highest - 0.9).abs() < 1e-12);
        assert!(b.ours_trust_based.mean_bid.unwrap() > lowest);
    }

    #[test]
    fn random_selection_is_seeded() {
        let corpus = fixture();
        let sim = Simulator::new(&corpus, &SimulationConfig::default());
        let res = sim.run_all(dec!(0.6), BidStrategy::Default).unwrap();

        let random = baselines(&sim, &res, BidStrategy::Default, 7).random_selection;
        assert_eq!(
            random,
            baselines(&sim, &res, BidStrategy::Default, 7).random_selection
        );
        assert_eq!(random.selections, 3);
        // trust in the fixture ranges from 0.4 (Agent_B) to 0.9 (Agent_A)
        let trust = random.mean_trust.unwrap();
        assert!((0.4..=0.9).contains(&trust));

        // Q1 is a monopoly, so every seed picks Agent_A's 108 there
        let monopoly_only = MarketCorpus::new(
            serde_json::from_str(r#"{"queries": {"Q1": "11"}}"#).unwrap(),
            serde_json::from_str(r#"{"agents": {"Agent_A": {"knowledge": {"Q1": "11"}}}}"#)
                .unwrap(),
            corpus.trust.clone(),
        );
        let sim = Simulator::new(&monopoly_only, &SimulationConfig::default());
        let res = sim.run_all(dec!(0.6), BidStrategy::Default).unwrap();
        for seed in 0..5 {
            let pick = baselines(&sim, &res, BidStrategy::Default, seed).random_selection;
            assert_eq!(pick.mean_bid, Some(108.0));
        }
    }

    #[test]
    fn undercutting_never_beats_trust() {
        let check = manipulation_check(dec!(120));
        assert_eq!(check.high_trust_bid, dec!(89.16));
        assert_eq!(check.high_trust_value, dec!(64.28));
        assert_eq!(check.trials.len(), 4);
        assert_eq!(check.trials[0].low_trust_value, dec!(39.68));
        assert!(check.trials.iter().all(|t| !t.low_trust_wins));
    }

    #[test]
    fn collusion_defector_scores() {
        let check = collusion_check(dec!(120));
        assert_eq!(check.colluding_bid, dec!(102));
        assert_eq!(check.colluder_a_value, dec!(48));
        assert_eq!(check.colluder_b_value, dec!(45));
        assert_eq!(check.defector_value, dec!(46));
        assert!(!check.defector_wins);
    }

    #[test]
    fn report_serialises() {
        let corpus = fixture();
        let report = comprehensive_report(&corpus, &SimulationConfig::default()).unwrap();
        assert_eq!(report.distribution.no_market, 1);
        assert_eq!(report.competition_mismatches.len(), 1);
        assert_eq!(report.ablation_study.len(), 6);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["experiments"]["monopoly"][0]["winning_bid"], 108.0);
        assert_eq!(json["statistics"]["duopoly"]["n"], 1);
        assert!(json["hypothesis_tests"]["monopoly_vs_duopoly_pricing"].is_null());
        assert_eq!(json["robustness"]["collusion"]["defector_wins"], false);
        assert_eq!(json["robustness"]["noise"]["seed"], 42);
        assert_eq!(
            json["robustness"]["winner_distribution"]["by_agent_count"]
                .as_array()
                .unwrap()
                .len(),
            3
        );
        assert_eq!(json["baseline_comparisons"]["random_selection"]["selections"], 3);

        let again = comprehensive_report(&corpus, &SimulationConfig::default()).unwrap();
        assert_eq!(report, again);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let corpus = fixture();
        let config = SimulationConfig {
            trust_weight: dec!(1.2),
            ..SimulationConfig::default()
        };
        assert!(matches!(
            comprehensive_report(&corpus, &config),
            Err(AnalysisError::Config(_))
        ));
    }
}

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tfc_agents::{BidEvaluator, ScoringWeights};
use tfc_models::contract::Bid;
use tfc_models::trust::TrustAssessment;
use tracing::debug;

use crate::config::SimulationConfig;
use crate::corpus::MarketCorpus;
use crate::error::AnalysisError;
use crate::market::{classify, MarketType};

/// Pricing heuristic the simulated agents follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStrategy {
    #[default]
    Default,
    Aggressive,
    Conservative,
}

/// Simulated bid for an agent with `trust` facing `competitors` rivals.
///
/// | strategy     | monopoly | duopoly        | high competition |
/// |--------------|----------|----------------|------------------|
/// | default      | 0.90 B   | B(0.50+0.27t)  | B(0.50+0.30t)    |
/// | aggressive   | 0.95 B   | B(0.45+0.25t)  | B(0.45+0.25t)    |
/// | conservative | 0.85 B   | B(0.55+0.35t)  | B(0.55+0.35t)    |
pub fn simulate_bid(
    strategy: BidStrategy,
    trust: Decimal,
    competitors: usize,
    budget: Decimal,
) -> Decimal {
    let d = Decimal::new;
    let rate = match (strategy, competitors) {
        (BidStrategy::Default, 0) => d(90, 2),
        (BidStrategy::Default, 1) => d(50, 2) + d(27, 2) * trust,
        (BidStrategy::Default, _) => d(50, 2) + d(30, 2) * trust,
        (BidStrategy::Aggressive, 0) => d(95, 2),
        (BidStrategy::Aggressive, _) => d(45, 2) + d(25, 2) * trust,
        (BidStrategy::Conservative, 0) => d(85, 2),
        (BidStrategy::Conservative, _) => d(55, 2) + d(35, 2) * trust,
    };
    budget * rate
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedBid {
    pub agent_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub trust: Decimal,
}

impl SimulatedBid {
    pub fn quality_per_tfc(&self) -> f64 {
        quality_per_tfc(self.trust, self.amount)
    }
}

/// Trust bought per TFC spent.
pub fn quality_per_tfc(trust: Decimal, amount: Decimal) -> f64 {
    match (trust.to_f64(), amount.to_f64()) {
        (Some(t), Some(a)) if a > 0.0 => t / a,
        _ => 0.0,
    }
}

/// Auction result for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub query_id: String,
    pub num_agents: usize,
    pub market_type: MarketType,
    pub winner_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub winning_bid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub winner_trust: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub winner_value: Decimal,
    pub winner_quality_per_tfc: f64,
    /// Every bid, best value first.
    pub all_bids: Vec<SimulatedBid>,
}

impl QueryOutcome {
    pub fn winning_bid_f64(&self) -> f64 {
        self.winning_bid.to_f64().unwrap_or(f64::NAN)
    }
}

/// Outcomes grouped by market type. Queries nobody knows are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SimulationResults {
    by_market: BTreeMap<MarketType, Vec<QueryOutcome>>,
}

impl SimulationResults {
    pub fn market(&self, market: MarketType) -> &[QueryOutcome] {
        self.by_market.get(&market).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.by_market.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_market.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, outcome: QueryOutcome) {
        self.by_market
            .entry(outcome.market_type)
            .or_default()
            .push(outcome);
    }
}

/// Runs simulated auctions over a corpus at a fixed budget.
pub struct Simulator<'a> {
    corpus: &'a MarketCorpus,
    budget: Decimal,
    unrated_trust: Decimal,
}

impl<'a> Simulator<'a> {
    pub fn new(corpus: &'a MarketCorpus, config: &SimulationConfig) -> Self {
        Self {
            corpus,
            budget: config.budget,
            unrated_trust: config.unrated_trust,
        }
    }

    pub fn budget(&self) -> Decimal {
        self.budget
    }

    pub fn corpus(&self) -> &MarketCorpus {
        self.corpus
    }

    /// Requester trust for `agent_id`, or the unrated default.
    pub fn trust_of(&self, agent_id: &str) -> Decimal {
        self.corpus
            .trust
            .record(agent_id)
            .map(|r| r.score)
            .unwrap_or(self.unrated_trust)
    }

    /// One bid from every agent that knows `query_id`, in knowledge-file order.
    pub fn bids(&self, query_id: &str, strategy: BidStrategy) -> Vec<SimulatedBid> {
        let holders = self.corpus.holders(query_id);
        let competitors = holders.len().saturating_sub(1);
        holders
            .iter()
            .map(|agent_id| {
                let trust = self.trust_of(agent_id);
                SimulatedBid {
                    agent_id: agent_id.clone(),
                    amount: simulate_bid(strategy, trust, competitors, self.budget),
                    trust,
                }
            })
            .collect()
    }

    /// Simulate the auction for one query with
    /// `price_weight = 1 - trust_weight` and no risk term. The top-ranked
    /// bid wins. `None` when no agent knows the query.
    pub fn run_single_query(
        &self,
        query_id: &str,
        trust_weight: Decimal,
        strategy: BidStrategy,
    ) -> Result<Option<QueryOutcome>, AnalysisError> {
        let bids = self.bids(query_id, strategy);
        let Some(market_type) = classify(bids.len()) else {
            return Ok(None);
        };

        let assessment = bids.iter().fold(
            TrustAssessment::new(self.corpus.trust.requester_id.clone()),
            |acc, bid| {
                let jobs = self
                    .corpus
                    .trust
                    .record(&bid.agent_id)
                    .map(|r| r.jobs)
                    .unwrap_or(0);
                acc.with_agent(&bid.agent_id, bid.trust, jobs)
            },
        );
        let evaluator = BidEvaluator::new(ScoringWeights {
            trust: trust_weight,
            price: Decimal::ONE - trust_weight,
            risk: Decimal::ZERO,
        });
        let submitted: Vec<Bid> = bids
            .iter()
            .map(|b| Bid::new(b.agent_id.clone(), b.amount))
            .collect();
        let evaluations = evaluator.evaluate(&submitted, &assessment, self.budget)?;

        let Some(top) = evaluations.first() else {
            return Ok(None);
        };
        let ranked: Vec<SimulatedBid> = evaluations
            .iter()
            .filter_map(|e| bids.iter().find(|b| b.agent_id == e.agent_id).cloned())
            .collect();

        debug!(
            query = query_id,
            market = %market_type,
            winner = %top.agent_id,
            bid = %top.bid_amount,
            "Simulated auction"
        );

        Ok(Some(QueryOutcome {
            query_id: query_id.to_string(),
            num_agents: bids.len(),
            market_type,
            winner_id: top.agent_id.clone(),
            winning_bid: top.bid_amount,
            winner_trust: top.trust_score,
            winner_value: top.value_score,
            winner_quality_per_tfc: quality_per_tfc(top.trust_score, top.bid_amount),
            all_bids: ranked,
        }))
    }

    /// Every corpus query at `trust_weight`.
    pub fn run_all(
        &self,
        trust_weight: Decimal,
        strategy: BidStrategy,
    ) -> Result<SimulationResults, AnalysisError> {
        let mut results = SimulationResults::default();
        for query_id in self.corpus.query_ids() {
            if let Some(outcome) = self.run_single_query(query_id, trust_weight, strategy)? {
                results.push(outcome);
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::fixture;
    use rust_decimal_macros::dec;
    use tfc_models::market_data::{AgentKnowledgeBases, MasterQueryDatabase};

    fn simulator(corpus: &MarketCorpus) -> Simulator<'_> {
        Simulator::new(corpus, &SimulationConfig::default())
    }

    #[test]
    fn pricing_table() {
        let b = dec!(120);
        assert_eq!(simulate_bid(BidStrategy::Default, dec!(0.9), 0, b), dec!(108));
        assert_eq!(simulate_bid(BidStrategy::Default, dec!(0.9), 1, b), dec!(89.16));
        assert_eq!(simulate_bid(BidStrategy::Default, dec!(0.5), 2, b), dec!(78));
        assert_eq!(simulate_bid(BidStrategy::Aggressive, dec!(0.9), 0, b), dec!(114));
        assert_eq!(simulate_bid(BidStrategy::Aggressive, dec!(0.4), 3, b), dec!(66));
        assert_eq!(simulate_bid(BidStrategy::Conservative, dec!(0.4), 0, b), dec!(102));
        assert_eq!(simulate_bid(BidStrategy::Conservative, dec!(0.4), 1, b), dec!(82.8));
    }

    #[test]
    fn monopoly_bids_ninety_percent() {
        let corpus = fixture();
        let outcome = simulator(&corpus)
            .run_single_query("Q1", dec!(0.6), BidStrategy::Default)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.market_type, MarketType::Monopoly);
        assert_eq!(outcome.winner_id, "Agent_A");
        assert_eq!(outcome.winning_bid, dec!(108));
        assert!((outcome.winner_quality_per_tfc - 0.9 / 108.0).abs() < 1e-12);
    }

    #[test]
    fn duopoly_prefers_trust_at_default_weight() {
        let corpus = fixture();
        let outcome = simulator(&corpus)
            .run_single_query("Q2", dec!(0.6), BidStrategy::Default)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.market_type, MarketType::Duopoly);
        assert_eq!(outcome.winner_id, "Agent_A");
        assert_eq!(outcome.winning_bid, dec!(89.16));
        assert_eq!(outcome.winner_value, dec!(64.28));
        let amounts: Vec<_> = outcome.all_bids.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![dec!(89.16), dec!(72.96)]);
    }

    #[test]
    fn unrated_agent_gets_default_trust() {
        let corpus = fixture();
        let sim = simulator(&corpus);
        assert_eq!(sim.trust_of("Agent_C"), dec!(0.5));

        let outcome = sim
            .run_single_query("Q3", dec!(0.6), BidStrategy::Default)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.market_type, MarketType::HighCompetition);
        assert_eq!(outcome.winner_id, "Agent_A");
        assert_eq!(outcome.winning_bid, dec!(92.4));
        let c = outcome
            .all_bids
            .iter()
            .find(|b| b.agent_id == "Agent_C")
            .unwrap();
        assert_eq!(c.amount, dec!(78));
    }

    #[test]
    fn price_only_weight_picks_cheapest() {
        let corpus = fixture();
        let sim = simulator(&corpus);
        for query in ["Q2", "Q3"] {
            let outcome = sim
                .run_single_query(query, dec!(0), BidStrategy::Default)
                .unwrap()
                .unwrap();
            assert_eq!(outcome.winner_id, "Agent_B", "{query}");
        }
    }

    #[test]
    fn equal_bids_go_to_first_agent_in_knowledge_file() {
        let master: MasterQueryDatabase =
            serde_json::from_str(r#"{"queries": {"Q1": "11"}}"#).unwrap();
        let knowledge: AgentKnowledgeBases = serde_json::from_str(
            r#"{"agents": {
                "Agent_Z": {"knowledge": {"Q1": "11"}},
                "Agent_Y": {"knowledge": {"Q1": "11"}}
            }}"#,
        )
        .unwrap();
        let corpus = MarketCorpus::new(master, knowledge, TrustAssessment::new("Requester_1"));

        let outcome = simulator(&corpus)
            .run_single_query("Q1", dec!(0.6), BidStrategy::Default)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.all_bids[0].amount, outcome.all_bids[1].amount);
        assert_eq!(outcome.winner_id, "Agent_Z");
    }

    #[test]
    fn unknown_query_has_no_market() {
        let corpus = fixture();
        assert!(simulator(&corpus)
            .run_single_query("Q4", dec!(0.6), BidStrategy::Default)
            .unwrap()
            .is_none());
    }

    #[test]
    fn run_all_groups_by_market() {
        let corpus = fixture();
        let results = simulator(&corpus)
            .run_all(dec!(0.6), BidStrategy::Default)
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results.market(MarketType::Monopoly)[0].query_id, "Q1");
        assert_eq!(results.market(MarketType::Duopoly)[0].query_id, "Q2");
        assert_eq!(results.market(MarketType::HighCompetition)[0].query_id, "Q3");

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["duopoly"][0]["winning_bid"], 89.16);
    }

    #[test]
    fn strategy_names_in_config() {
        let parsed: BidStrategy = serde_json::from_str("\"conservative\"").unwrap();
        assert_eq!(parsed, BidStrategy::Conservative);
        assert_eq!(BidStrategy::default(), BidStrategy::Default);
    }
}

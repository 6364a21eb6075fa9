use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tfc_models::config::{ScoringConfig, ScoringVariant};
use tfc_models::contract::Bid;
use tfc_models::trust::{RiskPolicy, TrustAssessment};
use tracing::debug;

use crate::error::AgentError;

const SCORE_SCALE: Decimal = Decimal::ONE_HUNDRED;

/// Notes reported for an agent the requester has never rated.
pub const NO_HISTORY: &str = "No history";

/// Blend weights for the value score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub trust: Decimal,
    pub price: Decimal,
    pub risk: Decimal,
}

impl ScoringWeights {
    pub fn two_factor() -> Self {
        Self {
            trust: Decimal::new(6, 1),
            price: Decimal::new(4, 1),
            risk: Decimal::ZERO,
        }
    }

    pub fn three_factor() -> Self {
        Self {
            trust: Decimal::new(6, 1),
            price: Decimal::new(3, 1),
            risk: Decimal::new(1, 1),
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        let base = match config.variant {
            ScoringVariant::TwoFactor => Self::two_factor(),
            ScoringVariant::ThreeFactor => Self::three_factor(),
        };
        Self {
            trust: config.trust_weight.unwrap_or(base.trust),
            price: config.price_weight.unwrap_or(base.price),
            risk: config.risk_weight.unwrap_or(base.risk),
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::three_factor()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    Recommended,
    Valid,
    OverBudget,
    FailedCapability,
    ZeroAmount,
    TooRisky,
}

impl BidStatus {
    /// Scored at zero and never a winner.
    pub fn is_rejected(self) -> bool {
        matches!(
            self,
            Self::OverBudget | Self::FailedCapability | Self::ZeroAmount
        )
    }
}

/// Scored view of one bid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidEvaluation {
    pub agent_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub bid_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub trust_score: Decimal,
    pub jobs_done: u32,
    pub capability_passed: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub risk_penalty: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_score: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub value_score: Decimal,
    pub within_budget: bool,
    pub status: BidStatus,
    pub notes: String,
}

/// Requester-side bid ranking. Pure: records nothing.
#[derive(Debug, Clone, Default)]
pub struct BidEvaluator {
    weights: ScoringWeights,
}

impl BidEvaluator {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    /// Score and rank `bids` for a contract with `budget`.
    ///
    /// Trust comes only from the requester's assessment; unknown agents
    /// score as trust 0 with 0 jobs. The sort is stable, so equal scores
    /// keep submission order.
    pub fn evaluate(
        &self,
        bids: &[Bid],
        trust: &TrustAssessment,
        budget: Decimal,
    ) -> Result<Vec<BidEvaluation>, AgentError> {
        if budget <= Decimal::ZERO {
            return Err(AgentError::InvalidInput(format!(
                "budget must be positive, got {budget}"
            )));
        }

        let mut evaluations: Vec<BidEvaluation> = bids
            .iter()
            .map(|bid| self.score(bid, trust, budget))
            .collect();

        evaluations.sort_by(|a, b| b.value_score.cmp(&a.value_score));

        if let Some(top) = evaluations.first_mut() {
            if top.status == BidStatus::Valid {
                top.status = BidStatus::Recommended;
            }
        }

        debug!(
            bids = evaluations.len(),
            budget = %budget,
            top = evaluations.first().map(|e| e.agent_id.as_str()).unwrap_or("-"),
            "Evaluated bids"
        );
        Ok(evaluations)
    }

    /// `100 * (w_trust * trust + w_price * price + w_risk * risk)`.
    pub fn value_score(
        &self,
        trust_score: Decimal,
        price_score: Decimal,
        risk_penalty: Decimal,
    ) -> Decimal {
        SCORE_SCALE
            * (self.weights.trust * trust_score
                + self.weights.price * price_score
                + self.weights.risk * risk_penalty)
    }

    fn score(&self, bid: &Bid, trust: &TrustAssessment, budget: Decimal) -> BidEvaluation {
        let (trust_score, jobs_done) = trust.score_and_jobs(&bid.agent_id);
        let notes = trust
            .record(&bid.agent_id)
            .map(|r| r.notes.clone())
            .unwrap_or_else(|| NO_HISTORY.to_string());
        let risk_penalty = risk_penalty(jobs_done, bid.amount, &trust.risk_policy);
        let within_budget = bid.amount <= budget;

        let rejected = if !within_budget {
            Some(BidStatus::OverBudget)
        } else if bid.amount <= Decimal::ZERO {
            Some(BidStatus::ZeroAmount)
        } else if !bid.capability_passed {
            Some(BidStatus::FailedCapability)
        } else {
            None
        };

        let (price_score, value_score, status) = match rejected {
            Some(status) => (Decimal::ZERO, Decimal::ZERO, status),
            None => {
                let price_score = price_score(bid.amount, budget);
                let value_score = self.value_score(trust_score, price_score, risk_penalty);
                let status = if hard_risk_cap(jobs_done, bid.amount, &trust.risk_policy) {
                    BidStatus::TooRisky
                } else {
                    BidStatus::Valid
                };
                (price_score, value_score, status)
            }
        };

        BidEvaluation {
            agent_id: bid.agent_id.clone(),
            bid_amount: bid.amount,
            trust_score,
            jobs_done,
            capability_passed: bid.capability_passed,
            risk_penalty,
            price_score,
            value_score,
            within_budget,
            status,
            notes,
        }
    }
}

/// `1 - amount / budget`; negative above budget.
pub fn price_score(amount: Decimal, budget: Decimal) -> Decimal {
    Decimal::ONE - amount / budget
}

/// Top-ranked evaluation unless it was rejected. A `TooRisky` top bid still
/// wins; the hard cap only zeroes its risk penalty.
pub fn winner(evaluations: &[BidEvaluation]) -> Option<&BidEvaluation> {
    evaluations.first().filter(|e| !e.status.is_rejected())
}

/// Linear ramp to full trust over `min_jobs_for_full_trust` jobs, forced to
/// zero for an agent with no history bidding above the unknown-agent cap.
pub fn risk_penalty(jobs: u32, amount: Decimal, policy: &RiskPolicy) -> Decimal {
    if hard_risk_cap(jobs, amount, policy) {
        return Decimal::ZERO;
    }
    if jobs < policy.min_jobs_for_full_trust {
        Decimal::from(jobs) / Decimal::from(policy.min_jobs_for_full_trust)
    } else {
        Decimal::ONE
    }
}

fn hard_risk_cap(jobs: u32, amount: Decimal, policy: &RiskPolicy) -> bool {
    jobs == 0 && amount > policy.max_budget_for_unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trust() -> TrustAssessment {
        TrustAssessment::new("Requester_1")
            .with_agent("Agent_A", dec!(0.9), 5)
            .with_agent("Agent_B", dec!(0.4), 1)
    }

    #[test]
    fn two_factor_scores_match_hand_computation() {
        let evaluator = BidEvaluator::new(ScoringWeights::two_factor());
        let bids = vec![Bid::new("Agent_B", dec!(5)), Bid::new("Agent_A", dec!(8))];
        let evals = evaluator.evaluate(&bids, &trust(), dec!(10)).unwrap();

        // A: 100 * (0.6 * 0.9 + 0.4 * 0.2) = 62
        // B: 100 * (0.6 * 0.4 + 0.4 * 0.5) = 44
        assert_eq!(evals[0].agent_id, "Agent_A");
        assert_eq!(evals[0].value_score, dec!(62));
        assert_eq!(evals[1].value_score, dec!(44));
        assert_eq!(evals[0].status, BidStatus::Recommended);
        assert_eq!(evals[1].status, BidStatus::Valid);
        assert_eq!(winner(&evals).unwrap().agent_id, "Agent_A");
    }

    #[test]
    fn three_factor_adds_risk_ramp() {
        let evaluator = BidEvaluator::default();
        let bids = vec![Bid::new("Agent_B", dec!(5))];
        let evals = evaluator.evaluate(&bids, &trust(), dec!(10)).unwrap();
        let risk = dec!(1) / dec!(3);
        assert_eq!(evals[0].risk_penalty, risk);
        let expected = dec!(100) * (dec!(0.6) * dec!(0.4) + dec!(0.3) * dec!(0.5) + dec!(0.1) * risk);
        assert_eq!(evals[0].value_score, expected);
    }

    #[test]
    fn unknown_agent_is_cold_start() {
        let evaluator = BidEvaluator::new(ScoringWeights::two_factor());
        let evals = evaluator
            .evaluate(&[Bid::new("Agent_Z", dec!(5))], &trust(), dec!(10))
            .unwrap();
        assert_eq!(evals[0].trust_score, Decimal::ZERO);
        assert_eq!(evals[0].jobs_done, 0);
        assert_eq!(evals[0].value_score, dec!(20));
        assert_eq!(evals[0].notes, NO_HISTORY);
    }

    #[test]
    fn rejections_score_zero_and_never_win() {
        let evaluator = BidEvaluator::default();
        let bids = vec![
            Bid::new("Agent_A", dec!(12)),
            Bid::new("Agent_A", dec!(0)),
            Bid::new("Agent_A", dec!(4)).without_capability(),
        ];
        let evals = evaluator.evaluate(&bids, &trust(), dec!(10)).unwrap();
        let statuses: Vec<_> = evals.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                BidStatus::OverBudget,
                BidStatus::ZeroAmount,
                BidStatus::FailedCapability
            ]
        );
        assert!(evals.iter().all(|e| e.value_score.is_zero()));
        assert!(!evals[0].within_budget);
        assert!(winner(&evals).is_none());
    }

    #[test]
    fn hard_cap_marks_unknown_big_bid_too_risky() {
        let evaluator = BidEvaluator::default();
        let evals = evaluator
            .evaluate(&[Bid::new("Agent_Z", dec!(60))], &trust(), dec!(100))
            .unwrap();
        assert_eq!(evals[0].risk_penalty, Decimal::ZERO);
        assert_eq!(evals[0].status, BidStatus::TooRisky);
        assert_eq!(winner(&evals).unwrap().agent_id, "Agent_Z");
    }

    #[test]
    fn too_risky_top_bid_still_wins_over_valid_runner_up() {
        let evaluator = BidEvaluator::default();
        let trust = TrustAssessment::new("Requester_1")
            .with_agent("Agent_X", dec!(0.9), 0)
            .with_agent("Agent_Y", dec!(0.1), 5);
        let bids = vec![Bid::new("Agent_X", dec!(80)), Bid::new("Agent_Y", dec!(80))];
        let evals = evaluator.evaluate(&bids, &trust, dec!(100)).unwrap();

        // X: 100 * (0.6 * 0.9 + 0.3 * 0.2 + 0.1 * 0) = 60
        // Y: 100 * (0.6 * 0.1 + 0.3 * 0.2 + 0.1 * 1) = 22
        assert_eq!(evals[0].agent_id, "Agent_X");
        assert_eq!(evals[0].value_score, dec!(60));
        assert_eq!(evals[0].status, BidStatus::TooRisky);
        assert_eq!(evals[1].agent_id, "Agent_Y");
        assert_eq!(evals[1].value_score, dec!(22));
        assert_eq!(evals[1].status, BidStatus::Valid);
        assert_eq!(winner(&evals).unwrap().agent_id, "Agent_X");
    }

    #[test]
    fn ties_keep_submission_order() {
        let evaluator = BidEvaluator::default();
        let bids = vec![
            Bid::new("Agent_A", dec!(6)).with_strategy("first"),
            Bid::new("Agent_A", dec!(6)).with_strategy("second"),
        ];
        let evals = evaluator.evaluate(&bids, &trust(), dec!(10)).unwrap();
        assert_eq!(evals.len(), 2);
        assert_eq!(evals[0].value_score, evals[1].value_score);
        assert_eq!(evals[0].status, BidStatus::Recommended);
        assert_eq!(evals[1].status, BidStatus::Valid);
    }

    #[test]
    fn cheaper_bid_never_scores_lower() {
        let evaluator = BidEvaluator::default();
        let mut previous = None;
        for amount in [dec!(9.5), dec!(8), dec!(5), dec!(2.5), dec!(0.1)] {
            let evals = evaluator
                .evaluate(&[Bid::new("Agent_B", amount)], &trust(), dec!(10))
                .unwrap();
            if let Some(prev) = previous {
                assert!(evals[0].value_score >= prev);
            }
            previous = Some(evals[0].value_score);
        }
    }

    #[test]
    fn more_trust_never_scores_lower() {
        let evaluator = BidEvaluator::default();
        let mut previous = None;
        for score in [dec!(0), dec!(0.25), dec!(0.5), dec!(0.9), dec!(1)] {
            let trust = TrustAssessment::new("Requester_1").with_agent("Agent_C", score, 2);
            let evals = evaluator
                .evaluate(&[Bid::new("Agent_C", dec!(4))], &trust, dec!(10))
                .unwrap();
            if let Some(prev) = previous {
                assert!(evals[0].value_score >= prev);
            }
            previous = Some(evals[0].value_score);
        }
    }

    #[test]
    fn non_positive_budget_is_invalid_input() {
        let evaluator = BidEvaluator::default();
        let result = evaluator.evaluate(&[Bid::new("Agent_A", dec!(1))], &trust(), dec!(0));
        assert!(matches!(result, Err(AgentError::InvalidInput(_))));
    }

    #[test]
    fn weights_from_config_override_variant() {
        let config = ScoringConfig {
            variant: ScoringVariant::TwoFactor,
            trust_weight: Some(dec!(0.2)),
            price_weight: None,
            risk_weight: None,
        };
        let weights = ScoringWeights::from_config(&config);
        assert_eq!(weights.trust, dec!(0.2));
        assert_eq!(weights.price, dec!(0.4));
        assert_eq!(weights.risk, Decimal::ZERO);
    }
}

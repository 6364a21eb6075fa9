use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A requester's private experience with one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustRecord {
    /// 0.0 to 1.0.
    #[serde(default)]
    pub score: Decimal,
    #[serde(default, rename = "based_on_jobs")]
    pub jobs: u32,
    #[serde(default)]
    pub notes: String,
}

/// Limits applied to agents with little or no history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskPolicy {
    #[serde(default = "default_min_jobs")]
    pub min_jobs_for_full_trust: u32,
    #[serde(default = "default_max_unknown")]
    pub max_budget_for_unknown: Decimal,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            min_jobs_for_full_trust: default_min_jobs(),
            max_budget_for_unknown: default_max_unknown(),
        }
    }
}

fn default_min_jobs() -> u32 {
    3
}

fn default_max_unknown() -> Decimal {
    Decimal::from(50)
}

/// The requester trust file: `requester_id`, `trust_scores`, `risk_policy`.
///
/// Agents' self-reported reputation never appears here; the evaluator only
/// trusts what the requester has observed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrustAssessment {
    #[serde(default)]
    pub requester_id: String,
    #[serde(default)]
    pub trust_scores: HashMap<String, TrustRecord>,
    #[serde(default)]
    pub risk_policy: RiskPolicy,
}

impl TrustAssessment {
    pub fn new(requester_id: impl Into<String>) -> Self {
        Self {
            requester_id: requester_id.into(),
            ..Self::default()
        }
    }

    pub fn with_agent(mut self, agent_id: &str, score: Decimal, jobs: u32) -> Self {
        self.trust_scores.insert(
            agent_id.to_string(),
            TrustRecord {
                score,
                jobs,
                notes: String::new(),
            },
        );
        self
    }

    pub fn record(&self, agent_id: &str) -> Option<&TrustRecord> {
        self.trust_scores.get(agent_id)
    }

    /// Cold-start agents get score 0.0 and zero jobs.
    pub fn score_and_jobs(&self, agent_id: &str) -> (Decimal, u32) {
        self.record(agent_id)
            .map(|r| (r.score, r.jobs))
            .unwrap_or((Decimal::ZERO, 0))
    }

    /// The assessment as seen by `requester_id`. A file owned by a different
    /// requester yields no scores, only its risk policy.
    pub fn for_requester(self, requester_id: &str) -> Self {
        if self.requester_id == requester_id {
            self
        } else {
            Self {
                requester_id: requester_id.to_string(),
                trust_scores: HashMap::new(),
                risk_policy: self.risk_policy,
            }
        }
    }
}

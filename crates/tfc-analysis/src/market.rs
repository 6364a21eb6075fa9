use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tfc_models::market_data::AgentKnowledgeBases;

use crate::corpus::MarketCorpus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    Monopoly,
    Duopoly,
    HighCompetition,
}

impl MarketType {
    pub const ALL: [MarketType; 3] = [Self::Monopoly, Self::Duopoly, Self::HighCompetition];
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Monopoly => "monopoly",
            Self::Duopoly => "duopoly",
            Self::HighCompetition => "high_competition",
        })
    }
}

/// Market structure for a query known by `knowledgeable_agents` agents.
/// Nobody knowing it means there is no market.
pub fn classify(knowledgeable_agents: usize) -> Option<MarketType> {
    match knowledgeable_agents {
        0 => None,
        1 => Some(MarketType::Monopoly),
        2 => Some(MarketType::Duopoly),
        _ => Some(MarketType::HighCompetition),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMarket {
    pub query_id: String,
    pub agents: Vec<String>,
}

/// Every corpus query bucketed by market type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketDistribution {
    pub monopoly: Vec<QueryMarket>,
    pub duopoly: Vec<QueryMarket>,
    pub high_competition: Vec<QueryMarket>,
    /// Queries no agent knows.
    pub no_market: Vec<String>,
}

impl MarketDistribution {
    pub fn build(corpus: &MarketCorpus) -> Self {
        let mut dist = Self::default();
        for query_id in corpus.query_ids() {
            let agents = corpus.holders(query_id).to_vec();
            let market = QueryMarket {
                query_id: query_id.to_string(),
                agents,
            };
            match classify(market.agents.len()) {
                Some(MarketType::Monopoly) => dist.monopoly.push(market),
                Some(MarketType::Duopoly) => dist.duopoly.push(market),
                Some(MarketType::HighCompetition) => dist.high_competition.push(market),
                None => dist.no_market.push(market.query_id),
            }
        }
        dist
    }

    pub fn bucket(&self, market: MarketType) -> &[QueryMarket] {
        match market {
            MarketType::Monopoly => &self.monopoly,
            MarketType::Duopoly => &self.duopoly,
            MarketType::HighCompetition => &self.high_competition,
        }
    }

    pub fn counts(&self) -> DistributionCounts {
        DistributionCounts {
            total: self.monopoly.len()
                + self.duopoly.len()
                + self.high_competition.len()
                + self.no_market.len(),
            monopoly: self.monopoly.len(),
            duopoly: self.duopoly.len(),
            high_competition: self.high_competition.len(),
            no_market: self.no_market.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DistributionCounts {
    pub total: usize,
    pub monopoly: usize,
    pub duopoly: usize,
    pub high_competition: usize,
    pub no_market: usize,
}

/// A `competition_analysis` entry that disagrees with actual knowledge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitionMismatch {
    pub query_id: String,
    pub listed: Vec<String>,
    pub actual: Vec<String>,
    /// Agents that know the query but are not listed.
    pub missing: Vec<String>,
    /// Listed agents that do not know the query.
    pub extra: Vec<String>,
}

/// Check the hand-maintained `competition_analysis` listing against the
/// knowledge bases. Keys look like `Q103_monopoly`; the query id is the part
/// before the first underscore.
pub fn verify_competition_analysis(
    bases: &AgentKnowledgeBases,
    corpus: &MarketCorpus,
) -> Vec<CompetitionMismatch> {
    bases
        .competition_analysis
        .iter()
        .filter_map(|(key, listed)| {
            let query_id = key.split('_').next().unwrap_or(key);
            let actual = corpus.holders(query_id);

            let listed_set: BTreeSet<&str> = listed.iter().map(String::as_str).collect();
            let actual_set: BTreeSet<&str> = actual.iter().map(String::as_str).collect();
            if listed_set == actual_set {
                return None;
            }

            Some(CompetitionMismatch {
                query_id: query_id.to_string(),
                listed: listed.clone(),
                actual: actual.to_vec(),
                missing: actual_set
                    .difference(&listed_set)
                    .map(|s| s.to_string())
                    .collect(),
                extra: listed_set
                    .difference(&actual_set)
                    .map(|s| s.to_string())
                    .collect(),
            })
        })
        .collect()
}

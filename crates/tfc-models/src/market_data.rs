use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A knowledge value as found in data files: a bare string, a number, or an
/// object carrying a `response` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum KnowledgeValue {
    Text(String),
    Number(serde_json::Number),
    Record {
        response: serde_json::Value,
        #[serde(flatten)]
        extra: BTreeMap<String, serde_json::Value>,
    },
}

impl KnowledgeValue {
    /// The response normalised to a string.
    pub fn response(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Record { response, .. } => match response {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        }
    }
}

/// `master_query_database.json`: every query with its correct response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MasterQueryDatabase {
    #[serde(default)]
    pub queries: BTreeMap<String, KnowledgeValue>,
}

impl MasterQueryDatabase {
    pub fn query_ids(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }

    pub fn correct_response(&self, query_id: &str) -> Option<String> {
        self.queries.get(query_id).map(KnowledgeValue::response)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentKnowledgeRecord {
    #[serde(default)]
    pub knowledge: BTreeMap<String, KnowledgeValue>,
}

/// `agent_knowledge_bases.json`: per-agent knowledge plus an optional,
/// hand-maintained `competition_analysis` listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentKnowledgeBases {
    /// Keeps file order; simulated auctions break value ties by it.
    #[serde(default)]
    pub agents: IndexMap<String, AgentKnowledgeRecord>,
    #[serde(default)]
    pub competition_analysis: BTreeMap<String, Vec<String>>,
}

impl AgentKnowledgeBases {
    /// Flatten one agent's knowledge into `query -> response` strings.
    pub fn knowledge_of(&self, agent_id: &str) -> Option<HashMap<String, String>> {
        self.agents.get(agent_id).map(|record| {
            record
                .knowledge
                .iter()
                .map(|(q, v)| (q.clone(), v.response()))
                .collect()
        })
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }
}

use std::collections::{BTreeMap, HashMap};

use tfc_models::market_data::AgentKnowledgeBases;

/// One agent's private `atomic query -> response` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentKnowledge {
    pub agent_id: String,
    entries: HashMap<String, String>,
}

impl AgentKnowledge {
    pub fn new(agent_id: impl Into<String>, entries: HashMap<String, String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            entries,
        }
    }

    pub fn from_pairs<'a>(
        agent_id: impl Into<String>,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self::new(
            agent_id,
            pairs
                .into_iter()
                .map(|(q, r)| (q.to_string(), r.to_string()))
                .collect(),
        )
    }

    pub fn knows(&self, query: &str) -> bool {
        self.entries.contains_key(query)
    }

    pub fn response_for(&self, query: &str) -> Option<&str> {
        self.entries.get(query).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Load every agent from a knowledge-bases file, sorted by agent id.
pub fn agents_from_bases(bases: &AgentKnowledgeBases) -> Vec<AgentKnowledge> {
    bases
        .agent_ids()
        .filter_map(|id| bases.knowledge_of(id).map(|k| AgentKnowledge::new(id, k)))
        .collect()
}

/// Inverted index: which agents know each atomic query. Holders keep the
/// order the agents were given in.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeIndex {
    by_query: BTreeMap<String, Vec<String>>,
}

impl KnowledgeIndex {
    pub fn build<'a>(agents: impl IntoIterator<Item = &'a AgentKnowledge>) -> Self {
        let mut by_query: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for agent in agents {
            for query in agent.queries() {
                by_query
                    .entry(query.to_string())
                    .or_default()
                    .push(agent.agent_id.clone());
            }
        }
        Self { by_query }
    }

    pub fn agents_knowing(&self, query: &str) -> &[String] {
        self.by_query.get(query).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, query: &str) -> usize {
        self.agents_knowing(query).len()
    }
}

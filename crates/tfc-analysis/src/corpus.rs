use std::path::Path;

use serde::de::DeserializeOwned;
use tfc_agents::knowledge::{agents_from_bases, AgentKnowledge, KnowledgeIndex};
use tfc_models::market_data::{AgentKnowledgeBases, MasterQueryDatabase};
use tfc_models::trust::TrustAssessment;
use tracing::info;

use crate::config::DataConfig;
use crate::error::AnalysisError;

/// The three market data files, loaded once and treated as immutable.
#[derive(Debug, Clone)]
pub struct MarketCorpus {
    pub master: MasterQueryDatabase,
    pub knowledge: AgentKnowledgeBases,
    pub trust: TrustAssessment,
    agents: Vec<AgentKnowledge>,
    index: KnowledgeIndex,
}

impl MarketCorpus {
    pub fn new(
        master: MasterQueryDatabase,
        knowledge: AgentKnowledgeBases,
        trust: TrustAssessment,
    ) -> Self {
        let agents = agents_from_bases(&knowledge);
        let index = KnowledgeIndex::build(&agents);
        Self {
            master,
            knowledge,
            trust,
            agents,
            index,
        }
    }

    pub fn load(config: &DataConfig) -> Result<Self, AnalysisError> {
        let master: MasterQueryDatabase = read_json(&config.master_queries)?;
        let knowledge: AgentKnowledgeBases = read_json(&config.knowledge_bases)?;
        let trust: TrustAssessment = read_json(&config.trust_scores)?;
        info!(
            queries = master.queries.len(),
            agents = knowledge.agents.len(),
            rated = trust.trust_scores.len(),
            "Loaded market corpus"
        );
        Ok(Self::new(master, knowledge, trust))
    }

    pub fn agents(&self) -> &[AgentKnowledge] {
        &self.agents
    }

    pub fn index(&self) -> &KnowledgeIndex {
        &self.index
    }

    /// Agents that know `query_id`, in knowledge-file order.
    pub fn holders(&self, query_id: &str) -> &[String] {
        self.index.agents_knowing(query_id)
    }

    pub fn query_ids(&self) -> impl Iterator<Item = &str> {
        self.master.query_ids()
    }
}

fn read_json<T: DeserializeOwned>(path: &str) -> Result<T, AnalysisError> {
    let raw = std::fs::read_to_string(Path::new(path)).map_err(|source| AnalysisError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| AnalysisError::Json {
        path: path.to_string(),
        source,
    })
}

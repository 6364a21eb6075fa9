use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not enough data: {0}")]
    InsufficientData(String),

    #[error("Bid evaluation failed: {0}")]
    Agent(#[from] tfc_agents::AgentError),
}

use async_trait::async_trait;

use crate::bid_parser::parse_comment_listing;
use crate::error::AgentError;
use crate::gh_cli::{create_issue, view_comments, GhCliConfig};

/// External tracker that contracts are published to. Mockable for testing.
#[async_trait]
pub trait ContractPoster: Send + Sync {
    /// Publish a contract and return its unique reference.
    async fn post(&self, title: &str, body: &str, labels: &[String]) -> Result<String, AgentError>;

    /// Comment bodies posted on a published contract.
    async fn comments(&self, reference: &str) -> Result<Vec<String>, AgentError>;
}

/// Posts contracts as GitHub issues through the `gh` CLI.
pub struct GhIssuePoster {
    pub cli_config: GhCliConfig,
}

impl GhIssuePoster {
    pub fn new(cli_config: GhCliConfig) -> Self {
        Self { cli_config }
    }
}

#[async_trait]
impl ContractPoster for GhIssuePoster {
    async fn post(&self, title: &str, body: &str, labels: &[String]) -> Result<String, AgentError> {
        create_issue(title, body, labels, &self.cli_config).await
    }

    async fn comments(&self, reference: &str) -> Result<Vec<String>, AgentError> {
        let raw = view_comments(reference, &self.cli_config).await?;
        parse_comment_listing(&raw)
    }
}

use std::time::Duration;
use tfc_models::config::PostingConfig;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

/// Configuration for `gh` invocations.
#[derive(Debug, Clone)]
pub struct GhCliConfig {
    /// Passed as `--repo`; `None` uses the repository of the working directory.
    pub repo: Option<String>,
    pub timeout: Duration,
}

impl Default for GhCliConfig {
    fn default() -> Self {
        Self {
            repo: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&PostingConfig> for GhCliConfig {
    fn from(config: &PostingConfig) -> Self {
        Self {
            repo: config.repo.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// Create an issue and return the URL `gh` prints.
pub async fn create_issue(
    title: &str,
    body: &str,
    labels: &[String],
    config: &GhCliConfig,
) -> Result<String, AgentError> {
    let mut args = vec![
        "issue".to_string(),
        "create".to_string(),
        "--title".to_string(),
        title.to_string(),
        "--body".to_string(),
        body.to_string(),
    ];
    if !labels.is_empty() {
        args.push("--label".to_string());
        args.push(labels.join(","));
    }
    push_repo(&mut args, config);

    let stdout = run_gh(&args, config).await?;
    let url = stdout.trim().lines().last().unwrap_or_default().trim().to_string();
    if url.is_empty() {
        return Err(AgentError::PostingFailed(
            "gh issue create returned no reference".to_string(),
        ));
    }
    Ok(url)
}

/// Raw `gh issue view <reference> --json comments` output.
pub async fn view_comments(reference: &str, config: &GhCliConfig) -> Result<String, AgentError> {
    let mut args = vec![
        "issue".to_string(),
        "view".to_string(),
        reference.to_string(),
        "--json".to_string(),
        "comments".to_string(),
    ];
    push_repo(&mut args, config);
    run_gh(&args, config).await
}

fn push_repo(args: &mut Vec<String>, config: &GhCliConfig) {
    if let Some(repo) = &config.repo {
        args.push("--repo".to_string());
        args.push(repo.clone());
    }
}

async fn run_gh(args: &[String], config: &GhCliConfig) -> Result<String, AgentError> {
    debug!(subcommand = %args.iter().take(2).cloned().collect::<Vec<_>>().join(" "), repo = ?config.repo, "Invoking gh");

    let result = tokio::time::timeout(config.timeout, async {
        Command::new("gh").args(args).output().await
    })
    .await
    .map_err(|_| AgentError::Timeout(config.timeout.as_secs()))?
    .map_err(|e| AgentError::PostingFailed(format!("Failed to spawn gh: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(status = %result.status, stderr = %stderr, "gh failed");
        return Err(AgentError::PostingFailed(format!(
            "gh exited {}: {}",
            result.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&result.stdout).to_string())
}

/// Check if the `gh` CLI is available on the system.
pub async fn check_gh_available() -> bool {
    match Command::new("gh").arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

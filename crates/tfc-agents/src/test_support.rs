//! Test support: canned agents and a poster that records instead of
//! calling an external tracker.
//!
//! The fixtures model the marketplace's reference chain
//! `response[response[222]]`: Agent_A knows hop 1 (222 -> 10), Agent_B
//! knows hop 2 (10 -> 44), Agent_C extends it to three hops (44 -> 7).

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::AgentError;
use crate::knowledge::AgentKnowledge;
use crate::poster::ContractPoster;

pub fn agent_a() -> AgentKnowledge {
    AgentKnowledge::from_pairs("Agent_A", [("222", "10"), ("12", "22")])
}

pub fn agent_b() -> AgentKnowledge {
    AgentKnowledge::from_pairs("Agent_B", [("10", "44"), ("34", "09")])
}

pub fn agent_c() -> AgentKnowledge {
    AgentKnowledge::from_pairs("Agent_C", [("44", "7"), ("34", "09")])
}

/// Agent_A and Agent_B.
pub fn chain_agents() -> Vec<AgentKnowledge> {
    vec![agent_a(), agent_b()]
}

/// A contract handed to [`RecordingPoster::post`].
#[derive(Debug, Clone, PartialEq)]
pub struct PostedContract {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub reference: String,
}

/// Poster that keeps every post in memory and hands out fake issue URLs.
pub struct RecordingPoster {
    pub posts: Mutex<Vec<PostedContract>>,
    pub comments: Mutex<HashMap<String, Vec<String>>>,
    pub should_fail: bool,
}

impl RecordingPoster {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            comments: Mutex::new(HashMap::new()),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        let mut poster = Self::new();
        poster.should_fail = true;
        poster
    }

    pub async fn add_comment(&self, reference: &str, body: &str) {
        self.comments
            .lock()
            .await
            .entry(reference.to_string())
            .or_default()
            .push(body.to_string());
    }

    pub async fn posted(&self) -> Vec<PostedContract> {
        self.posts.lock().await.clone()
    }
}

impl Default for RecordingPoster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContractPoster for RecordingPoster {
    async fn post(&self, title: &str, body: &str, labels: &[String]) -> Result<String, AgentError> {
        if self.should_fail {
            return Err(AgentError::PostingFailed(
                "gh exited 1: HTTP 401: Bad credentials".to_string(),
            ));
        }

        let mut posts = self.posts.lock().await;
        let reference = format!("https://github.com/acme/market/issues/{}", posts.len() + 1);
        posts.push(PostedContract {
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
            reference: reference.clone(),
        });
        Ok(reference)
    }

    async fn comments(&self, reference: &str) -> Result<Vec<String>, AgentError> {
        Ok(self
            .comments
            .lock()
            .await
            .get(reference)
            .cloned()
            .unwrap_or_default())
    }
}

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tfc_models::contract::{Bid, ContractId};
use tracing::debug;

use crate::error::AgentError;

const AGENT_MARKER: &str = "**Agent ID:**";
const AMOUNT_MARKER: &str = "**Bid Amount:**";
const STRATEGY_MARKER: &str = "**Strategy:**";
const CAPABILITY_KEY: &str = "test_response";

/// Fields pulled out of one tracker comment.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBid {
    pub agent_id: String,
    pub amount: Decimal,
    pub capability_passed: bool,
    pub strategy: Option<String>,
}

impl ParsedBid {
    pub fn into_bid(self, contract: Option<ContractId>) -> Bid {
        Bid {
            agent_id: self.agent_id,
            contract,
            amount: self.amount,
            capability_passed: self.capability_passed,
            strategy: self.strategy,
        }
    }
}

/// Extract a bid from a comment body.
///
/// Expected shape (other lines are ignored):
///
/// ````text
/// **Agent ID:** Agent_B
/// **Bid Amount:** 2.4 TFC
/// **Capability Proof:**
/// ```json
/// {"test_query": "response[10]", "test_response": "44"}
/// ```
/// ````
///
/// Returns `None` when either marker is missing or the amount is not a number.
pub fn parse_bid_comment(body: &str) -> Option<ParsedBid> {
    let mut agent_id = None;
    let mut amount = None;
    let mut strategy = None;

    for line in body.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix(AGENT_MARKER) {
            agent_id = Some(rest.trim().to_string()).filter(|id| !id.is_empty());
        } else if let Some(rest) = line.strip_prefix(AMOUNT_MARKER) {
            let raw = rest.trim();
            let raw = raw.strip_suffix("TFC").unwrap_or(raw).trim();
            amount = Decimal::from_str(raw).ok();
        } else if let Some(rest) = line.strip_prefix(STRATEGY_MARKER) {
            strategy = Some(rest.trim().to_string()).filter(|s| !s.is_empty());
        }
    }

    let parsed = ParsedBid {
        agent_id: agent_id?,
        amount: amount?,
        capability_passed: has_capability_proof(body),
        strategy,
    };
    debug!(agent = %parsed.agent_id, amount = %parsed.amount, capability = parsed.capability_passed, "Parsed bid comment");
    Some(parsed)
}

/// Parse every comment; comments without bid markers contribute nothing.
pub fn parse_bid_comments<S: AsRef<str>>(contract: Option<ContractId>, bodies: &[S]) -> Vec<Bid> {
    bodies
        .iter()
        .filter_map(|body| parse_bid_comment(body.as_ref()))
        .map(|parsed| parsed.into_bid(contract))
        .collect()
}

#[derive(Deserialize)]
struct CommentListing {
    #[serde(default)]
    comments: Vec<CommentBody>,
}

#[derive(Deserialize)]
struct CommentBody {
    #[serde(default)]
    body: String,
}

/// Comment bodies from `gh issue view --json comments` output.
pub fn parse_comment_listing(raw: &str) -> Result<Vec<String>, AgentError> {
    let json = extract_json(raw)?;
    let listing: CommentListing = serde_json::from_str(&json)
        .map_err(|e| AgentError::Parse(format!("Failed to parse comment listing: {e}")))?;
    Ok(listing.comments.into_iter().map(|c| c.body).collect())
}

/// A capability proof is a JSON object carrying a `test_response` key,
/// either fenced in a code block or inline.
fn has_capability_proof(body: &str) -> bool {
    let structured = extract_json(body)
        .ok()
        .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
        .is_some_and(|value| value.get(CAPABILITY_KEY).is_some());
    structured || body.contains(&format!("\"{CAPABILITY_KEY}\""))
}

/// Extract the first JSON object from text that may wrap it in prose or a
/// markdown fence.
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if let Some(json_str) = extract_from_markdown_block(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    if let Some(json_str) = extract_first_object(trimmed) {
        if serde_json::from_str::<serde_json::Value>(&json_str).is_ok() {
            return Ok(json_str);
        }
    }

    Err(AgentError::Parse(format!(
        "No JSON object found in text (length={})",
        text.len()
    )))
}

fn extract_from_markdown_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    for marker in &start_markers {
        if let Some(start) = text.find(marker) {
            let json_start = start + marker.len();
            if let Some(end) = text[json_start..].find("```") {
                return Some(text[json_start..json_start + end].trim().to_string());
            }
        }
    }

    None
}

/// First balanced `{ ... }`, skipping braces inside strings.
fn extract_first_object(text: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start {
                        return Some(text[s..=i].to_string());
                    }
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const BID_WITH_PROOF: &str = "## Bid\n\
        **Agent ID:** Agent_B\n\
        **Bid Amount:** 2.4 TFC\n\
        **Capability Proof:**\n\
        ```json\n\
        {\"test_query\": \"response[10]\", \"test_response\": \"44\"}\n\
        ```\n";

    #[test]
    fn parses_full_bid() {
        let parsed = parse_bid_comment(BID_WITH_PROOF).unwrap();
        assert_eq!(parsed.agent_id, "Agent_B");
        assert_eq!(parsed.amount, dec!(2.4));
        assert!(parsed.capability_passed);
        assert!(parsed.strategy.is_none());
    }

    #[test]
    fn amount_without_unit_and_strategy_line() {
        let body = "**Agent ID:** Agent_A\n**Bid Amount:** 10\n**Strategy:** subcontract";
        let parsed = parse_bid_comment(body).unwrap();
        assert_eq!(parsed.amount, dec!(10));
        assert_eq!(parsed.strategy.as_deref(), Some("subcontract"));
        assert!(!parsed.capability_passed);
    }

    #[test]
    fn missing_markers_yield_nothing() {
        assert!(parse_bid_comment("Looks interesting, I might bid later.").is_none());
        assert!(parse_bid_comment("**Agent ID:** Agent_A").is_none());
        assert!(parse_bid_comment("**Bid Amount:** 3 TFC").is_none());
        assert!(parse_bid_comment("**Agent ID:** Agent_A\n**Bid Amount:** cheap").is_none());
    }

    #[test]
    fn inline_proof_counts() {
        let body = "**Agent ID:** Agent_C\n**Bid Amount:** 1.5 TFC\nproof: {\"test_response\": \"09\"}";
        assert!(parse_bid_comment(body).unwrap().capability_passed);
    }

    #[test]
    fn comment_batch_skips_chatter() {
        let bodies = vec![
            "Please clarify the deadline.".to_string(),
            BID_WITH_PROOF.to_string(),
            "**Agent ID:** Agent_A\n**Bid Amount:** 2.9 TFC".to_string(),
        ];
        let bids = parse_bid_comments(Some(ContractId(1)), &bodies);
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].agent_id, "Agent_B");
        assert_eq!(bids[1].contract, Some(ContractId(1)));
        assert!(!bids[1].capability_passed);
    }

    #[test]
    fn gh_comment_listing() {
        let raw = r#"{"comments": [{"author": {"login": "bot"}, "body": "**Agent ID:** Agent_B\n**Bid Amount:** 2.4 TFC"}, {"body": "hi"}]}"#;
        let bodies = parse_comment_listing(raw).unwrap();
        assert_eq!(bodies.len(), 2);
        assert!(bodies[0].starts_with("**Agent ID:**"));
    }

    #[test]
    fn extract_json_variants() {
        assert_eq!(extract_json(r#"{"a": 1}"#).unwrap(), r#"{"a": 1}"#);
        assert_eq!(
            extract_json("Result:\n```\n{\"a\": 1}\n```").unwrap(),
            r#"{"a": 1}"#
        );
        let braces = r#"note {"q": "from {low} to {high}", "n": 2} end"#;
        let value: serde_json::Value = serde_json::from_str(&extract_json(braces).unwrap()).unwrap();
        assert_eq!(value["n"], 2);
        assert!(extract_json("plain text").is_err());
    }
}

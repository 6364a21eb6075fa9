use std::sync::LazyLock;

use regex::Regex;
use tfc_models::query::{DependencyChain, ParsedQuery};

use crate::knowledge::AgentKnowledge;

const WRAPPER: &str = "response[";

static NESTED_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"response\[([^\]]+)\]").expect("valid nested-reference regex"));
static PLAIN_QUERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"query (\d+)").expect("valid plain-query regex"));
static NUMERIC_BRACKET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("valid numeric-bracket regex"));

/// Parse a query expression into its dependency chain.
///
/// - `"What is response[222]?"` gives `["222"]`, depth 1.
/// - `"What is response[response[222]]?"` gives `["222", "response[222]"]`, depth 2.
/// - `"What is the response to query 222?"` gives `["222"]`, depth 1.
///
/// Text with no recognisable reference yields depth 0 and an empty chain.
pub fn parse(query_text: &str) -> ParsedQuery {
    let Some(expr) = NESTED_REF.find(query_text) else {
        return match PLAIN_QUERY.captures(query_text) {
            Some(caps) => ParsedQuery {
                raw: query_text.to_string(),
                chain: DependencyChain(vec![caps[1].to_string()]),
                depth: 1,
            },
            None => ParsedQuery::unresolvable(query_text),
        };
    };

    let expr = expr.as_str();
    let depth = expr.matches(WRAPPER).count();

    let Some(inner) = NUMERIC_BRACKET.captures(expr) else {
        return ParsedQuery::unresolvable(query_text);
    };

    let mut chain = Vec::with_capacity(depth);
    let mut current = inner[1].to_string();
    for i in 0..depth {
        chain.push(current.clone());
        if i + 1 < depth {
            current = format!("{WRAPPER}{current}]");
        }
    }

    ParsedQuery {
        raw: query_text.to_string(),
        chain: DependencyChain(chain),
        depth,
    }
}

/// Wrap an atomic identifier `depth` times: `response[response[id]]`.
pub fn nested_expression(atomic: &str, depth: usize) -> String {
    let mut expr = atomic.to_string();
    for _ in 0..depth {
        expr = format!("{WRAPPER}{expr}]");
    }
    expr
}

/// Canonical form used to compare queries for equality: the nested
/// expression when resolvable, otherwise the trimmed text.
pub fn canonical_key(query_text: &str) -> String {
    let parsed = parse(query_text);
    match parsed.innermost() {
        Some(id) => nested_expression(id, parsed.depth),
        None => query_text.trim().to_string(),
    }
}

/// What an agent can do about the first hop of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstHop {
    /// The query text has no resolvable reference.
    Unresolvable,
    /// The agent does not know the innermost atomic query.
    Unknown,
    /// Single-hop query the agent answers from its own knowledge.
    Direct,
    /// The agent resolves hop 1; the carried value is its response, which
    /// the next hop must be asked about.
    NeedsNextHop { value: String, remaining_depth: usize },
}

impl FirstHop {
    pub fn can_solve(&self) -> bool {
        matches!(self, Self::Direct | Self::NeedsNextHop { .. })
    }

    pub fn next_query_needed(&self) -> Option<&str> {
        match self {
            Self::NeedsNextHop { value, .. } => Some(value),
            _ => None,
        }
    }

    /// `(can_solve, next_query_needed)` view.
    pub fn as_pair(&self) -> (bool, Option<&str>) {
        (self.can_solve(), self.next_query_needed())
    }
}

/// Check whether `knowledge` resolves the first hop of `query_text`.
pub fn can_solve_first_hop(query_text: &str, knowledge: &AgentKnowledge) -> FirstHop {
    let parsed = parse(query_text);
    let Some(first) = parsed.innermost() else {
        return FirstHop::Unresolvable;
    };

    match (parsed.depth, knowledge.response_for(first)) {
        (_, None) => FirstHop::Unknown,
        (1, Some(_)) => FirstHop::Direct,
        (depth, Some(value)) => FirstHop::NeedsNextHop {
            value: value.to_string(),
            remaining_depth: depth - 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(parsed: &ParsedQuery) -> Vec<&str> {
        parsed.chain.iter().collect()
    }

    #[test]
    fn parse_single_hop() {
        let parsed = parse("What is response[222]?");
        assert_eq!(parsed.depth, 1);
        assert_eq!(chain(&parsed), vec!["222"]);
    }

    #[test]
    fn parse_two_hops() {
        let parsed = parse("What is response[response[222]]?");
        assert_eq!(parsed.depth, 2);
        assert_eq!(chain(&parsed), vec!["222", "response[222]"]);
    }

    #[test]
    fn parse_three_hops_wraps_each_intermediate() {
        let parsed = parse("What is response[response[response[222]]]?");
        assert_eq!(parsed.depth, 3);
        assert_eq!(
            chain(&parsed),
            vec!["222", "response[222]", "response[response[222]]"]
        );
    }

    #[test]
    fn chain_length_matches_depth_for_any_nesting() {
        for depth in 1..=6 {
            let text = format!("What is {}?", nested_expression("4711", depth));
            let parsed = parse(&text);
            assert_eq!(parsed.depth, depth);
            assert_eq!(parsed.chain.len(), depth);
            assert_eq!(parsed.innermost(), Some("4711"));
        }
    }

    #[test]
    fn parse_plain_query_fallback() {
        let parsed = parse("What is the response to query 34?");
        assert_eq!(parsed.depth, 1);
        assert_eq!(chain(&parsed), vec!["34"]);
    }

    #[test]
    fn parse_unresolvable_text() {
        let parsed = parse("What is the capital of France?");
        assert_eq!(parsed.depth, 0);
        assert!(parsed.chain.is_empty());
    }

    #[test]
    fn parse_non_numeric_reference_is_unresolvable() {
        assert_eq!(parse("What is response[abc]?").depth, 0);
    }

    #[test]
    fn canonical_key_ignores_phrasing() {
        assert_eq!(
            canonical_key("What is response[response[222]]?"),
            canonical_key("please answer response[response[222]] quickly")
        );
        assert_eq!(canonical_key("  free text "), "free text");
    }

    #[test]
    fn first_hop_unresolvable_regardless_of_knowledge() {
        let knowledge = AgentKnowledge::from_pairs("Agent_A", [("222", "10"), ("0", "1")]);
        let hop = can_solve_first_hop("no reference here", &knowledge);
        assert_eq!(hop, FirstHop::Unresolvable);
        assert_eq!(hop.as_pair(), (false, None));
    }

    #[test]
    fn first_hop_direct_and_unknown() {
        let knowledge = AgentKnowledge::from_pairs("Agent_B", [("10", "44")]);
        assert_eq!(
            can_solve_first_hop("What is response[10]?", &knowledge).as_pair(),
            (true, None)
        );
        assert_eq!(
            can_solve_first_hop("What is response[11]?", &knowledge).as_pair(),
            (false, None)
        );
    }

    #[test]
    fn first_hop_returns_response_value_not_identifier() {
        let knowledge = AgentKnowledge::from_pairs("Agent_A", [("222", "10")]);
        let hop = can_solve_first_hop("What is response[response[222]]?", &knowledge);
        assert_eq!(hop.as_pair(), (true, Some("10")));
        assert_eq!(
            hop,
            FirstHop::NeedsNextHop {
                value: "10".to_string(),
                remaining_depth: 1
            }
        );
    }
}

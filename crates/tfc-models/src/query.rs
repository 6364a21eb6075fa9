use serde::{Deserialize, Serialize};

/// Ordered atomic lookups needed to answer a nested query.
///
/// `chain[0]` is always the innermost atomic identifier; each later element
/// is the textual `response[...]` wrap of the previous one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DependencyChain(pub Vec<String>);

impl DependencyChain {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The atomic query that must be answered first.
    pub fn innermost(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Result of resolving a query expression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedQuery {
    pub raw: String,
    pub chain: DependencyChain,
    /// Number of `response[` wrappers. 0 means the text could not be resolved.
    pub depth: usize,
}

impl ParsedQuery {
    pub fn unresolvable(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            chain: DependencyChain::empty(),
            depth: 0,
        }
    }

    pub fn is_resolvable(&self) -> bool {
        self.depth > 0
    }

    pub fn innermost(&self) -> Option<&str> {
        self.chain.innermost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_serializes_as_plain_array() {
        let chain = DependencyChain(vec!["222".to_string(), "response[222]".to_string()]);
        let json = serde_json::to_string(&chain).unwrap();
        assert_eq!(json, r#"["222","response[222]"]"#);
        assert_eq!(chain.innermost(), Some("222"));
    }

    #[test]
    fn unresolvable_has_depth_zero() {
        let parsed = ParsedQuery::unresolvable("hello");
        assert!(!parsed.is_resolvable());
        assert!(parsed.chain.is_empty());
        assert_eq!(parsed.innermost(), None);
    }
}

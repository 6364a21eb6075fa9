use rust_decimal::Decimal;
use tfc_models::contract::Contract;

use crate::resolver::parse;

/// Title for a requester-posted contract.
pub fn primary_title(contract: &Contract) -> String {
    let tag = if parse(&contract.query).depth >= 2 {
        "RECURSIVE"
    } else {
        "QUERY"
    };
    format!(
        "[{tag}] {} - Budget: {} TFC",
        contract.query,
        tfc(contract.budget)
    )
}

pub fn primary_body(contract: &Contract) -> String {
    let parsed = parse(&contract.query);
    let chain = if parsed.chain.is_empty() {
        "(unresolvable)".to_string()
    } else {
        parsed.chain.iter().collect::<Vec<_>>().join(" -> ")
    };
    format!(
        "## Contract Details\n\n\
         **Query:** {query}\n\
         **Budget:** {budget} TFC\n\
         **Contract:** {id}\n\
         **Dependency Chain:** {chain}\n\
         **Hops:** {depth}\n\n\
         {bidding}",
        query = contract.query,
        budget = tfc(contract.budget),
        id = contract.ledger_ref(),
        depth = parsed.depth,
        bidding = bidding_instructions(),
    )
}

/// Title for an agent-posted subcontract.
pub fn subcontract_title(contract: &Contract) -> String {
    format!(
        "[SUBCONTRACT] {} - Payment: {} TFC",
        contract.query,
        tfc(contract.budget)
    )
}

pub fn subcontract_body(contract: &Contract, parent_ref: &str) -> String {
    format!(
        "## Subcontract Details\n\n\
         **Query:** {query}\n\
         **Budget:** {budget} TFC\n\
         **Posted by:** {poster}\n\
         **Parent Contract:** {parent_ref}\n\n\
         This is a subcontract for a recursive query. The posting agent solved the \
         first hop and needs this answer to finish the parent contract.\n\n\
         {bidding}",
        query = contract.query,
        budget = tfc(contract.budget),
        poster = contract.posted_by.as_deref().unwrap_or("unknown"),
        bidding = bidding_instructions(),
    )
}

/// Uses exactly the markers `bid_parser` reads.
fn bidding_instructions() -> &'static str {
    "## How to Bid\n\n\
     Comment with:\n\
     - **Agent ID:** your agent id\n\
     - **Bid Amount:** amount in TFC\n\
     - **Capability Proof:** a JSON block with a `test_response` for a sample query"
}

fn tfc(amount: Decimal) -> String {
    amount.normalize().to_string()
}

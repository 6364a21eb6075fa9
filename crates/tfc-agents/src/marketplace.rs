use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tfc_ledger::Ledger;
use tfc_models::config::{MarketConfig, PostingConfig};
use tfc_models::contract::{Bid, Contract, ContractId, ContractKind, ContractStatus};
use tfc_models::trust::TrustAssessment;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AgentError;
use crate::evaluator::{winner, BidEvaluation, BidEvaluator, ScoringWeights};
use crate::knowledge::AgentKnowledge;
use crate::poster::ContractPoster;
use crate::resolver::{canonical_key, parse};
use crate::strategy::{Strategy, StrategyEngine};
use crate::templates;

/// Arena of contracts. A subcontract points at its parent by index; the
/// tree owns every node.
#[derive(Debug, Clone, Default)]
pub struct ContractTree {
    contracts: Vec<Contract>,
}

impl ContractTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.iter()
    }

    pub fn get(&self, id: ContractId) -> Result<&Contract, AgentError> {
        self.contracts
            .get(id.0)
            .ok_or(AgentError::ContractNotFound(id))
    }

    fn get_mut(&mut self, id: ContractId) -> Result<&mut Contract, AgentError> {
        self.contracts
            .get_mut(id.0)
            .ok_or(AgentError::ContractNotFound(id))
    }

    fn insert(
        &mut self,
        query: &str,
        budget: Decimal,
        kind: ContractKind,
        parent: Option<ContractId>,
        posted_by: Option<String>,
    ) -> ContractId {
        let id = ContractId(self.contracts.len());
        self.contracts.push(Contract {
            id,
            uid: Uuid::new_v4(),
            query: query.to_string(),
            budget,
            kind,
            status: ContractStatus::Open,
            parent,
            posted_by,
            reference: None,
            awarded_to: None,
            winning_amount: None,
            response: None,
            created_at: Utc::now(),
        });
        id
    }

    /// `id` followed by its parent, grandparent, ... up to the primary.
    pub fn ancestors(&self, id: ContractId) -> Result<Vec<ContractId>, AgentError> {
        let mut chain = vec![id];
        let mut current = self.get(id)?;
        while let Some(parent) = current.parent {
            chain.push(parent);
            current = self.get(parent)?;
        }
        Ok(chain)
    }

    pub fn children(&self, id: ContractId) -> impl Iterator<Item = &Contract> {
        self.contracts.iter().filter(move |c| c.parent == Some(id))
    }

    /// OPEN -> AWARDED.
    pub fn award(
        &mut self,
        id: ContractId,
        agent_id: &str,
        amount: Decimal,
    ) -> Result<(), AgentError> {
        let contract = self.get_mut(id)?;
        transition(contract, ContractStatus::Open, ContractStatus::Awarded)?;
        contract.awarded_to = Some(agent_id.to_string());
        contract.winning_amount = Some(amount);
        Ok(())
    }

    /// AWARDED -> COMPLETED.
    pub fn complete(&mut self, id: ContractId, response: &str) -> Result<(), AgentError> {
        let contract = self.get_mut(id)?;
        transition(contract, ContractStatus::Awarded, ContractStatus::Completed)?;
        contract.response = Some(response.to_string());
        Ok(())
    }
}

fn transition(
    contract: &mut Contract,
    from: ContractStatus,
    to: ContractStatus,
) -> Result<(), AgentError> {
    if contract.status != from {
        return Err(AgentError::InvalidTransition {
            id: contract.id,
            from: contract.status,
            to,
        });
    }
    contract.status = to;
    Ok(())
}

/// One awarded hop of a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractAward {
    pub contract: ContractId,
    pub query: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub budget: Decimal,
    pub winner: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub action: String,
}

/// Net result of one agent's participation in a chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantProfit {
    pub agent_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainOutcome {
    pub root: ContractId,
    pub resolved: bool,
    pub response: Option<String>,
    pub awards: Vec<ContractAward>,
    pub participants: Vec<ParticipantProfit>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_system_profit: Decimal,
    /// Total system profit as a percentage of the primary budget.
    #[serde(with = "rust_decimal::serde::float")]
    pub efficiency_pct: Decimal,
}

/// Result of soliciting and ranking bids for one contract.
#[derive(Debug, Clone)]
pub struct Solicitation {
    pub bids: Vec<Bid>,
    pub strategies: Vec<(String, Strategy)>,
    pub evaluations: Vec<BidEvaluation>,
}

enum Step {
    Spawned(ContractId),
    Delivered(String),
    Unresolved,
}

/// Runs contracts through bidding, subcontracting, award and settlement.
pub struct Marketplace {
    tree: ContractTree,
    engine: StrategyEngine,
    evaluator: BidEvaluator,
    trust: TrustAssessment,
    posting: PostingConfig,
    ledger: Arc<Ledger>,
}

impl Marketplace {
    pub fn new(ledger: Arc<Ledger>, engine: StrategyEngine, evaluator: BidEvaluator) -> Self {
        Self {
            tree: ContractTree::new(),
            engine,
            evaluator,
            trust: TrustAssessment::new("requester"),
            posting: PostingConfig::default(),
            ledger,
        }
    }

    pub fn from_config(config: &MarketConfig, ledger: Arc<Ledger>) -> Self {
        Self::new(
            ledger,
            StrategyEngine::new(config.strategy.clone()),
            BidEvaluator::new(ScoringWeights::from_config(&config.scoring)),
        )
        .with_posting(config.posting.clone())
    }

    /// Requester trust used when ranking bids.
    pub fn with_trust(mut self, trust: TrustAssessment) -> Self {
        self.trust = trust;
        self
    }

    pub fn with_posting(mut self, posting: PostingConfig) -> Self {
        self.posting = posting;
        self
    }

    pub fn tree(&self) -> &ContractTree {
        &self.tree
    }

    pub fn contract(&self, id: ContractId) -> Result<&Contract, AgentError> {
        self.tree.get(id)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn post_primary(&mut self, query: &str, budget: Decimal) -> Result<ContractId, AgentError> {
        validate_budget(budget)?;
        let id = self.tree.insert(query, budget, ContractKind::Primary, None, None);
        info!(contract = %id, query = %query, budget = %budget, "Posted primary contract");
        Ok(id)
    }

    /// Post a subcontract under `parent`.
    ///
    /// Rejected when the parent or any of its ancestors already asks the
    /// same query, or when the chain would exceed `max_subcontract_depth`.
    pub fn spawn_subcontract(
        &mut self,
        parent: ContractId,
        query: &str,
        budget: Decimal,
        posted_by: &str,
    ) -> Result<ContractId, AgentError> {
        validate_budget(budget)?;
        if posted_by.trim().is_empty() {
            return Err(AgentError::InvalidInput(
                "subcontract needs a posting agent".to_string(),
            ));
        }

        let ancestors = self.tree.ancestors(parent)?;
        let max_depth = self.engine.config().max_subcontract_depth;
        if ancestors.len() > max_depth {
            return Err(AgentError::InvalidInput(format!(
                "subcontract depth {} exceeds limit {max_depth}",
                ancestors.len()
            )));
        }

        let key = canonical_key(query);
        for ancestor in &ancestors {
            if canonical_key(&self.tree.get(*ancestor)?.query) == key {
                warn!(parent = %parent, query = %query, repeats = %ancestor, "Subcontract cycle rejected");
                return Err(AgentError::CycleDetected {
                    query: query.to_string(),
                    parent,
                });
            }
        }

        let id = self.tree.insert(
            query,
            budget,
            ContractKind::Subcontract,
            Some(parent),
            Some(posted_by.to_string()),
        );
        info!(contract = %id, parent = %parent, agent = %posted_by, query = %query, budget = %budget, "Posted subcontract");
        Ok(id)
    }

    pub fn award(&mut self, id: ContractId, agent_id: &str, amount: Decimal) -> Result<(), AgentError> {
        self.tree.award(id, agent_id, amount)?;
        info!(contract = %id, agent = %agent_id, amount = %amount, "Awarded contract");
        Ok(())
    }

    pub fn complete(&mut self, id: ContractId, response: &str) -> Result<(), AgentError> {
        self.tree.complete(id, response)?;
        info!(contract = %id, response = %response, "Completed contract");
        Ok(())
    }

    /// Ask every agent for a strategy on `id` and rank the resulting bids.
    ///
    /// Direct bidders bid `direct_bid_ratio` of the budget; subcontractors bid
    /// the full budget. The agent that posted a subcontract does not bid on it.
    pub fn solicit(
        &self,
        id: ContractId,
        agents: &[AgentKnowledge],
    ) -> Result<Solicitation, AgentError> {
        let contract = self.tree.get(id)?;
        let mut bids = Vec::new();
        let mut strategies = Vec::new();

        for agent in agents {
            if contract.posted_by.as_deref() == Some(agent.agent_id.as_str()) {
                continue;
            }
            let strategy =
                self.engine
                    .analyze_contract(&contract.query, contract.budget, agent)?;
            let amount = match &strategy {
                Strategy::BidDirectly { bid_amount, .. } => *bid_amount,
                Strategy::Subcontract {
                    expected_revenue, ..
                } => *expected_revenue,
                Strategy::CannotBid { .. } | Strategy::Completed { .. } => continue,
            };
            bids.push(
                Bid::new(&agent.agent_id, amount)
                    .for_contract(id)
                    .with_strategy(strategy.action()),
            );
            strategies.push((agent.agent_id.clone(), strategy));
        }

        let evaluations = if bids.is_empty() {
            Vec::new()
        } else {
            self.evaluator.evaluate(&bids, &self.trust, contract.budget)?
        };

        debug!(contract = %id, bids = bids.len(), "Solicited bids");
        Ok(Solicitation {
            bids,
            strategies,
            evaluations,
        })
    }

    fn step(&mut self, id: ContractId, agents: &[AgentKnowledge]) -> Result<Step, AgentError> {
        let solicitation = self.solicit(id, agents)?;
        let Some(top) = winner(&solicitation.evaluations) else {
            warn!(contract = %id, bids = solicitation.bids.len(), "No eligible bid");
            return Ok(Step::Unresolved);
        };

        let Some((_, strategy)) = solicitation
            .strategies
            .iter()
            .find(|(agent, _)| *agent == top.agent_id)
        else {
            return Ok(Step::Unresolved);
        };
        let Some(agent) = agents.iter().find(|a| a.agent_id == top.agent_id) else {
            return Ok(Step::Unresolved);
        };

        // Nothing is awarded until the winner's plan is known to go through.
        match strategy {
            Strategy::BidDirectly { .. } => {
                let query = &self.tree.get(id)?.query;
                let parsed = parse(query);
                let response = parsed
                    .innermost()
                    .and_then(|atomic| agent.response_for(atomic))
                    .ok_or_else(|| AgentError::UnresolvableQuery(query.clone()))?
                    .to_string();
                self.award(id, &top.agent_id, top.bid_amount)?;
                Ok(Step::Delivered(response))
            }
            Strategy::Subcontract {
                subcontract_query,
                subcontract_budget,
                ..
            } => {
                let child = self.spawn_subcontract(
                    id,
                    subcontract_query,
                    *subcontract_budget,
                    &agent.agent_id,
                )?;
                self.award(id, &top.agent_id, top.bid_amount)?;
                Ok(Step::Spawned(child))
            }
            Strategy::CannotBid { .. } | Strategy::Completed { .. } => Ok(Step::Unresolved),
        }
    }

    /// Resolve `root` end to end.
    ///
    /// Each hop is awarded to the best bid. A subcontracting winner spawns a
    /// child contract which is resolved next. Once a direct bidder delivers,
    /// the chain completes leaf to root and every payment is booked in the
    /// ledger.
    pub fn run_contract(
        &mut self,
        root: ContractId,
        agents: &[AgentKnowledge],
    ) -> Result<ChainOutcome, AgentError> {
        let mut path = vec![root];
        let mut current = root;
        loop {
            match self.step(current, agents)? {
                Step::Spawned(child) => {
                    path.push(child);
                    current = child;
                }
                Step::Delivered(response) => return self.settle(&path, response),
                Step::Unresolved => return self.unresolved(&path),
            }
        }
    }

    /// Like [`Marketplace::run_contract`], publishing the primary and every
    /// subcontract as it is created. Posting failures are logged and do not
    /// stop the chain.
    pub async fn run_published(
        &mut self,
        root: ContractId,
        agents: &[AgentKnowledge],
        poster: &dyn ContractPoster,
    ) -> Result<ChainOutcome, AgentError> {
        if self.tree.get(root)?.reference.is_none() {
            let _ = self.publish(root, poster).await;
        }

        let mut path = vec![root];
        let mut current = root;
        loop {
            match self.step(current, agents)? {
                Step::Spawned(child) => {
                    let _ = self.publish(child, poster).await;
                    path.push(child);
                    current = child;
                }
                Step::Delivered(response) => return self.settle(&path, response),
                Step::Unresolved => return self.unresolved(&path),
            }
        }
    }

    /// Render and post `id`, storing the returned reference on the contract.
    pub async fn publish(
        &mut self,
        id: ContractId,
        poster: &dyn ContractPoster,
    ) -> Result<String, AgentError> {
        let contract = self.tree.get(id)?;
        let (title, body, labels) = match contract.kind {
            ContractKind::Primary => (
                templates::primary_title(contract),
                templates::primary_body(contract),
                self.posting.primary_labels.clone(),
            ),
            ContractKind::Subcontract => {
                let parent_ref = match contract.parent {
                    Some(parent) => self.tree.get(parent)?.ledger_ref(),
                    None => String::new(),
                };
                (
                    templates::subcontract_title(contract),
                    templates::subcontract_body(contract, &parent_ref),
                    self.posting.subcontract_labels.clone(),
                )
            }
        };

        match poster.post(&title, &body, &labels).await {
            Ok(reference) => {
                info!(contract = %id, reference = %reference, "Published contract");
                self.tree.get_mut(id)?.reference = Some(reference.clone());
                Ok(reference)
            }
            Err(e) => {
                warn!(contract = %id, error = %e, "Publishing failed");
                Err(e)
            }
        }
    }

    fn settle(&mut self, path: &[ContractId], response: String) -> Result<ChainOutcome, AgentError> {
        let mut participants: Vec<ParticipantProfit> = Vec::new();

        for (i, &id) in path.iter().enumerate().rev() {
            self.complete(id, &response)?;
            let contract = self.tree.get(id)?;
            let (winner, amount) = awarded(contract)?;

            self.ledger.record_revenue(
                &winner,
                &contract.ledger_ref(),
                amount,
                &format!("Completed: {}", contract.query),
            )?;
            let mut cost = Decimal::ZERO;

            if let Some(&child_id) = path.get(i + 1) {
                let child = self.tree.get(child_id)?;
                let (child_winner, _) = awarded(child)?;
                self.ledger.record_cost(
                    &winner,
                    &child.ledger_ref(),
                    child.budget,
                    &child_winner,
                    &format!("Subcontract: {}", child.query),
                )?;
                cost = child.budget;
            }

            match participants.iter_mut().find(|p| p.agent_id == winner) {
                Some(p) => {
                    p.revenue += amount;
                    p.cost += cost;
                    p.net_profit = p.revenue - p.cost;
                }
                None => participants.push(ParticipantProfit {
                    agent_id: winner,
                    revenue: amount,
                    cost,
                    net_profit: amount - cost,
                }),
            }
        }
        participants.reverse();

        let root_budget = self.tree.get(path[0])?.budget;
        let total_system_profit: Decimal = participants.iter().map(|p| p.net_profit).sum();
        let efficiency_pct = total_system_profit / root_budget * Decimal::ONE_HUNDRED;

        info!(
            root = %path[0],
            hops = path.len(),
            total_profit = %total_system_profit,
            efficiency_pct = %efficiency_pct,
            "Chain settled"
        );

        Ok(ChainOutcome {
            root: path[0],
            resolved: true,
            response: Some(response),
            awards: self.awards(path)?,
            participants,
            total_system_profit,
            efficiency_pct,
        })
    }

    fn unresolved(&self, path: &[ContractId]) -> Result<ChainOutcome, AgentError> {
        warn!(root = %path[0], hops = path.len(), "Chain left unresolved");
        Ok(ChainOutcome {
            root: path[0],
            resolved: false,
            response: None,
            awards: self.awards(path)?,
            participants: Vec::new(),
            total_system_profit: Decimal::ZERO,
            efficiency_pct: Decimal::ZERO,
        })
    }

    fn awards(&self, path: &[ContractId]) -> Result<Vec<ContractAward>, AgentError> {
        let mut awards = Vec::new();
        for &id in path {
            let contract = self.tree.get(id)?;
            let (Some(winner), Some(amount)) = (&contract.awarded_to, contract.winning_amount)
            else {
                continue;
            };
            let action = if self.tree.children(id).next().is_some() {
                "subcontract"
            } else {
                "bid_directly"
            };
            awards.push(ContractAward {
                contract: id,
                query: contract.query.clone(),
                budget: contract.budget,
                winner: winner.clone(),
                amount,
                action: action.to_string(),
            });
        }
        Ok(awards)
    }
}

fn awarded(contract: &Contract) -> Result<(String, Decimal), AgentError> {
    match (&contract.awarded_to, contract.winning_amount) {
        (Some(agent), Some(amount)) => Ok((agent.clone(), amount)),
        _ => Err(AgentError::InvalidTransition {
            id: contract.id,
            from: contract.status,
            to: ContractStatus::Completed,
        }),
    }
}

fn validate_budget(budget: Decimal) -> Result<(), AgentError> {
    if budget <= Decimal::ZERO {
        return Err(AgentError::InvalidInput(format!(
            "budget must be positive, got {budget}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{agent_a, agent_b, agent_c, chain_agents};
    use tfc_models::config::StrategyConfig;
    use rust_decimal_macros::dec;

    fn marketplace() -> Marketplace {
        Marketplace::new(
            Arc::new(Ledger::in_memory().unwrap()),
            StrategyEngine::default(),
            BidEvaluator::default(),
        )
    }

    #[test]
    fn primary_budget_must_be_positive() {
        let mut market = marketplace();
        assert!(matches!(
            market.post_primary("What is response[1]?", dec!(0)),
            Err(AgentError::InvalidInput(_))
        ));
        assert!(market.tree().is_empty());
    }

    #[test]
    fn status_machine_rejects_skips_and_repeats() {
        let mut market = marketplace();
        let id = market.post_primary("What is response[10]?", dec!(3)).unwrap();

        assert!(matches!(
            market.complete(id, "44"),
            Err(AgentError::InvalidTransition {
                from: ContractStatus::Open,
                ..
            })
        ));
        market.award(id, "Agent_B", dec!(2.4)).unwrap();
        assert!(matches!(
            market.award(id, "Agent_A", dec!(2.0)),
            Err(AgentError::InvalidTransition { .. })
        ));
        market.complete(id, "44").unwrap();
        let contract = market.contract(id).unwrap();
        assert_eq!(contract.status, ContractStatus::Completed);
        assert_eq!(contract.awarded_to.as_deref(), Some("Agent_B"));
        assert_eq!(contract.response.as_deref(), Some("44"));
    }

    #[test]
    fn unknown_contract() {
        let mut market = marketplace();
        assert!(matches!(
            market.award(ContractId(7), "Agent_A", dec!(1)),
            Err(AgentError::ContractNotFound(ContractId(7)))
        ));
    }

    #[test]
    fn subcontract_repeating_an_ancestor_query_is_a_cycle() {
        let mut market = marketplace();
        let root = market
            .post_primary("What is response[response[222]]?", dec!(10))
            .unwrap();
        let child = market
            .spawn_subcontract(root, "What is response[10]?", dec!(3), "Agent_A")
            .unwrap();

        let result = market.spawn_subcontract(child, "response[response[222]]", dec!(1), "Agent_B");
        assert!(matches!(
            result,
            Err(AgentError::CycleDetected { parent, .. }) if parent == child
        ));
        let result = market.spawn_subcontract(child, "What is response[10]?", dec!(1), "Agent_B");
        assert!(matches!(result, Err(AgentError::CycleDetected { .. })));
        assert_eq!(market.tree().len(), 2);
    }

    #[test]
    fn subcontract_depth_is_bounded() {
        let mut market = Marketplace::new(
            Arc::new(Ledger::in_memory().unwrap()),
            StrategyEngine::new(tfc_models::config::StrategyConfig {
                max_subcontract_depth: 2,
                ..Default::default()
            }),
            BidEvaluator::default(),
        );
        let root = market.post_primary("What is response[1]?", dec!(10)).unwrap();
        let c1 = market
            .spawn_subcontract(root, "What is response[2]?", dec!(3), "Agent_A")
            .unwrap();
        let c2 = market
            .spawn_subcontract(c1, "What is response[3]?", dec!(1), "Agent_B")
            .unwrap();
        assert!(matches!(
            market.spawn_subcontract(c2, "What is response[4]?", dec!(0.3), "Agent_C"),
            Err(AgentError::InvalidInput(_))
        ));
        assert_eq!(market.tree().ancestors(c2).unwrap(), vec![c2, c1, root]);
    }

    #[test]
    fn poster_of_a_subcontract_does_not_bid_on_it() {
        let mut market = marketplace();
        let root = market
            .post_primary("What is response[response[222]]?", dec!(10))
            .unwrap();
        let child = market
            .spawn_subcontract(root, "What is response[222]?", dec!(3), "Agent_A")
            .unwrap();
        let solicitation = market.solicit(child, &[agent_a(), agent_b()]).unwrap();
        assert!(solicitation.bids.is_empty());
        assert!(solicitation.evaluations.is_empty());
    }

    #[test]
    fn two_hop_chain_settles_into_ledger() {
        let mut market = marketplace();
        let root = market
            .post_primary("What is response[response[222]]?", dec!(10.0))
            .unwrap();
        let outcome = market.run_contract(root, &chain_agents()).unwrap();

        assert!(outcome.resolved);
        assert_eq!(outcome.response.as_deref(), Some("44"));
        assert_eq!(outcome.total_system_profit, dec!(9.4));
        assert_eq!(outcome.efficiency_pct, dec!(94.0));
        assert_eq!(outcome.participants[0].agent_id, "Agent_A");
        assert_eq!(outcome.participants[0].net_profit, dec!(7.0));
        assert_eq!(outcome.participants[1].net_profit, dec!(2.4));

        assert_eq!(market.ledger().get_profit("Agent_A").unwrap(), dec!(7.0));
        assert_eq!(market.ledger().get_profit("Agent_B").unwrap(), dec!(2.4));
        assert!(market
            .tree()
            .iter()
            .all(|c| c.status == ContractStatus::Completed));
    }

    #[test]
    fn chain_without_capable_agent_is_unresolved() {
        let mut market = marketplace();
        let root = market
            .post_primary("What is response[response[222]]?", dec!(10.0))
            .unwrap();
        let outcome = market.run_contract(root, &[agent_a()]).unwrap();

        assert!(!outcome.resolved);
        assert_eq!(outcome.awards.len(), 1);
        assert_eq!(outcome.awards[0].action, "subcontract");
        assert_eq!(outcome.total_system_profit, Decimal::ZERO);
        assert!(market.ledger().accounts().unwrap().is_empty());
        let child = market.tree().children(root).next().unwrap();
        assert_eq!(child.status, ContractStatus::Open);
    }

    #[test]
    fn rejected_subcontract_leaves_hop_open() {
        let engine = StrategyEngine::new(StrategyConfig {
            max_subcontract_depth: 1,
            ..StrategyConfig::default()
        });
        let mut market = Marketplace::new(
            Arc::new(Ledger::in_memory().unwrap()),
            engine,
            BidEvaluator::default(),
        );
        let root = market
            .post_primary("What is response[response[response[222]]]?", dec!(10))
            .unwrap();

        let result = market.run_contract(root, &[agent_a(), agent_b(), agent_c()]);
        assert!(matches!(result, Err(AgentError::InvalidInput(_))));

        // Agent_B tops the second hop but cannot post the third
        assert_eq!(market.tree().len(), 2);
        let child = market.tree().children(root).next().unwrap();
        assert_eq!(child.status, ContractStatus::Open);
        assert!(child.awarded_to.is_none());
        assert!(child.winning_amount.is_none());
        assert!(market.ledger().accounts().unwrap().is_empty());
    }
}

//! Dividend flow through an ownership graph.
//!
//! Each node starts with a profit. Companies pay corporation tax and pass
//! dividends upward to their owners in proportion to the edge weights;
//! humans pay personal dividend tax. Two formulations are provided:
//!
//! - [`WealthGraph::recursive`]: every node's dividend is its own profit plus
//!   the weighted dividends of its direct holdings, taxed once at the node.
//!   Requires an acyclic graph.
//! - [`WealthGraph::theoretical`]: every descendant's profit is taxed once per
//!   hop along the shortest ownership path and scaled by the product of that
//!   path's weights. This is the objective used by the optimiser.
//!
//! In both, a node keeps `1 - Σ incoming weights` of what it accumulates.

use std::collections::{BTreeMap, HashMap, VecDeque};

use eyre::{bail, eyre, Result};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rama_graph::{NodeId, OwnershipGraph};
use serde::{Deserialize, Serialize};

/// Profit or final wealth per node.
pub type Profits = BTreeMap<NodeId, f64>;

/// Personal dividend tax band applied to humans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanRate {
    Basic,
    Higher,
    #[default]
    Additional,
}

/// Dividend and corporation tax rates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxRegime {
    pub basic_rate: f64,
    pub higher_rate: f64,
    pub additional_rate: f64,
    pub corporation_tax: f64,
    /// Dividend income taxed at zero before the band applies.
    pub personal_dividend_allowance: f64,
    /// Band used for every human.
    pub human_rate: HumanRate,
}

impl Default for TaxRegime {
    fn default() -> Self {
        Self {
            basic_rate: 0.0875,
            higher_rate: 0.3375,
            additional_rate: 0.3935,
            corporation_tax: 0.19,
            personal_dividend_allowance: 0.0,
            human_rate: HumanRate::Additional,
        }
    }
}

impl TaxRegime {
    /// Rate of the configured human band.
    pub fn human_rate_value(&self) -> f64 {
        match self.human_rate {
            HumanRate::Basic => self.basic_rate,
            HumanRate::Higher => self.higher_rate,
            HumanRate::Additional => self.additional_rate,
        }
    }

    /// Amount left after tax on `profit`.
    pub fn net_of_tax(&self, profit: f64, human: bool) -> f64 {
        if !human {
            return profit * (1.0 - self.corporation_tax);
        }
        let allowance = self.personal_dividend_allowance;
        if profit > allowance {
            allowance + (profit - allowance) * (1.0 - self.human_rate_value())
        } else {
            profit
        }
    }

    /// `value` after passing through `hops` companies, each paying
    /// corporation tax.
    pub fn net_of_corporate_chain(&self, value: f64, hops: usize) -> f64 {
        (0..hops).fold(value, |acc, _| self.net_of_tax(acc, false))
    }
}

/// An ownership graph validated for dividend simulation.
///
/// Every edge must carry a defined weight.
#[derive(Debug)]
pub struct WealthGraph<'a> {
    graph: &'a OwnershipGraph,
    weights: HashMap<(NodeIndex, NodeIndex), f64>,
}

impl<'a> WealthGraph<'a> {
    /// # Errors
    /// Returns error naming the first edge whose weight is undefined.
    pub fn new(graph: &'a OwnershipGraph) -> Result<Self> {
        let mut weights = HashMap::with_capacity(graph.edge_count());
        for edge in graph.graph.edge_references() {
            let (a, b) = (edge.source(), edge.target());
            let weight = edge.weight().weight.ok_or_else(|| {
                eyre!(
                    "edge {} -> {} has no defined ownership weight",
                    graph.graph[a].id,
                    graph.graph[b].id
                )
            })?;
            weights.insert((a, b), weight);
        }
        Ok(Self { graph, weights })
    }

    pub fn graph(&self) -> &'a OwnershipGraph {
        self.graph
    }

    /// Ids of nodes that earn profit (companies) and those that do not
    /// (humans), each ascending.
    pub fn partition_by_profit(&self) -> (Vec<NodeId>, Vec<NodeId>) {
        self.graph
            .node_ids()
            .into_iter()
            .partition(|&id| self.graph.node(id).is_some_and(|node| !node.human))
    }

    fn weight(&self, a: NodeIndex, b: NodeIndex) -> f64 {
        self.weights.get(&(a, b)).copied().unwrap_or(0.0)
    }

    fn retained_share(&self, ix: NodeIndex) -> f64 {
        let distributed: f64 = self
            .graph
            .graph
            .neighbors_directed(ix, Direction::Incoming)
            .map(|owner| self.weight(owner, ix))
            .sum();
        1.0 - distributed
    }

    fn profit_of(&self, profits: &Profits, ix: NodeIndex) -> Result<f64> {
        let id = self.graph.graph[ix].id;
        profits
            .get(&id)
            .copied()
            .ok_or_else(|| eyre!("no profit given for node {id}"))
    }

    /// Final wealth per node under the recursive formulation.
    ///
    /// # Errors
    /// Returns error if the graph has a cycle or a node has no profit.
    pub fn recursive(&self, profits: &Profits, taxes: &TaxRegime) -> Result<Profits> {
        let order = toposort(&self.graph.graph, None).map_err(|cycle| {
            eyre!(
                "recursive dividends need an acyclic graph; node {} is on a cycle",
                self.graph.graph[cycle.node_id()].id
            )
        })?;

        let mut dividends: HashMap<NodeIndex, f64> = HashMap::with_capacity(order.len());
        for &ix in order.iter().rev() {
            let mut wealth = self.profit_of(profits, ix)?;
            for owned in self.graph.graph.neighbors_directed(ix, Direction::Outgoing) {
                let dividend = dividends.get(&owned).copied().unwrap_or(0.0);
                wealth += self.weight(ix, owned) * dividend;
            }
            dividends.insert(ix, taxes.net_of_tax(wealth, self.graph.graph[ix].human));
        }

        Ok(order
            .iter()
            .map(|&ix| {
                let dividend = dividends.get(&ix).copied().unwrap_or(0.0);
                (self.graph.graph[ix].id, self.retained_share(ix) * dividend)
            })
            .collect())
    }

    /// Final wealth per node under the shortest-path formulation.
    ///
    /// # Errors
    /// Returns error if a node has no profit.
    pub fn theoretical(&self, profits: &Profits, taxes: &TaxRegime) -> Result<Profits> {
        let mut out = Profits::new();
        for ix in self.graph.graph.node_indices() {
            let mut wealth = self.profit_of(profits, ix)?;
            for (descendant, hops, share) in self.shortest_paths_from(ix) {
                let profit = self.profit_of(profits, descendant)?;
                wealth += taxes.net_of_corporate_chain(profit, hops) * share;
            }
            let node = &self.graph.graph[ix];
            out.insert(
                node.id,
                self.retained_share(ix) * taxes.net_of_tax(wealth, node.human),
            );
        }
        Ok(out)
    }

    /// Breadth-first walk from `start` giving every descendant with its hop
    /// count and the product of weights along the first shortest path found.
    ///
    /// Neighbours are expanded in ascending id order.
    fn shortest_paths_from(&self, start: NodeIndex) -> Vec<(NodeIndex, usize, f64)> {
        let mut seen: HashMap<NodeIndex, (usize, f64)> = HashMap::from([(start, (0, 1.0))]);
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(ix) = queue.pop_front() {
            let (hops, share) = seen[&ix];
            let mut next: Vec<NodeIndex> = self
                .graph
                .graph
                .neighbors_directed(ix, Direction::Outgoing)
                .collect();
            next.sort_by_key(|&n| self.graph.graph[n].id);
            for owned in next {
                if seen.contains_key(&owned) {
                    continue;
                }
                let entry = (hops + 1, share * self.weight(ix, owned));
                seen.insert(owned, entry);
                found.push((owned, entry.0, entry.1));
                queue.push_back(owned);
            }
        }

        found
    }
}

/// Relative wealth lost to tax: `|Σ initial − Σ final| / Σ initial`, using
/// the theoretical formulation.
///
/// # Errors
/// Returns error if a node has no profit, or if the initial total is not
/// positive while the final total differs from it.
pub fn loss_function(
    graph: &WealthGraph<'_>,
    profits: &Profits,
    taxes: &TaxRegime,
) -> Result<f64> {
    let initial: f64 = profits.values().sum();
    let final_total: f64 = graph.theoretical(profits, taxes)?.values().sum();

    if initial == final_total {
        return Ok(0.0);
    }
    if initial <= 0.0 {
        bail!("loss is undefined for a non-positive initial total ({initial})");
    }
    Ok((initial - final_total).abs() / initial)
}

/// Assign `distribution` to `with_profit` in order and zero to `without_profit`.
pub fn make_profit_dict(
    distribution: &[f64],
    with_profit: &[NodeId],
    without_profit: &[NodeId],
) -> Profits {
    let mut profits: Profits = with_profit
        .iter()
        .copied()
        .zip(distribution.iter().copied())
        .collect();
    for &id in without_profit {
        profits.insert(id, 0.0);
    }
    profits
}

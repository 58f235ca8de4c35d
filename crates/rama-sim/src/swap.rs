//! Random rewiring of ownership edges under structural constraints.
//!
//! [`one_swap`] moves one end of a random edge to a random third node.
//! [`get_swapped_subgraph`] repeats that on fresh copies of the input until a
//! candidate passes every [`Check`], or the attempt budget runs out.

use std::fmt;
use std::str::FromStr;

use eyre::{bail, Result};
use petgraph::algo::connected_components;
use petgraph::unionfind::UnionFind;
use petgraph::visit::{EdgeRef, NodeIndexable};
use rand::seq::SliceRandom;
use rand::Rng;
use rama_graph::{NodeId, OwnershipGraph};
use serde::{Deserialize, Serialize};

/// Default human in-degree limit for [`Check::HumanInDegreeAtMost`].
pub const DEFAULT_HUMAN_OWNER_LIMIT: usize = 2;

/// Which end of the chosen edge is moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapMode {
    /// Replace the owner.
    #[serde(alias = "source")]
    Origin,
    /// Replace the owned company.
    Destination,
    /// Either end with equal probability.
    #[default]
    Random,
}

impl FromStr for SwapMode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "origin" | "source" => Ok(Self::Origin),
            "destination" => Ok(Self::Destination),
            "random" => Ok(Self::Random),
            other => bail!("invalid swap mode {other:?}; expected origin, destination or random"),
        }
    }
}

impl fmt::Display for SwapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Origin => "origin",
            Self::Destination => "destination",
            Self::Random => "random",
        })
    }
}

/// Settings for [`get_swapped_subgraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Maximum number of candidate swaps to try.
    pub n_tries: usize,
    pub mode: SwapMode,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            n_tries: 1000,
            mode: SwapMode::Random,
        }
    }
}

/// Structural constraint a swapped graph must satisfy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    /// The undirected graph is a forest.
    NoCycles,
    /// Exactly one weakly-connected component.
    Connected,
    /// No human has more than this many owners.
    HumanInDegreeAtMost(usize),
    /// Every node without owners is a human.
    OnlyHumanRoots,
    /// No human is owned by anyone.
    NoHumanOwned,
}

impl Check {
    pub fn passes(self, graph: &OwnershipGraph) -> bool {
        match self {
            Self::NoCycles => no_cycles(graph),
            Self::Connected => connected(graph),
            Self::HumanInDegreeAtMost(limit) => no_more_than_n_per(graph, limit),
            Self::OnlyHumanRoots => only_human_roots(graph),
            Self::NoHumanOwned => no_slavery(graph),
        }
    }
}

/// Whether the undirected cycle basis is empty.
///
/// Opposite edges between the same pair count once; a self-loop is a cycle.
pub fn no_cycles(graph: &OwnershipGraph) -> bool {
    let mut pairs: Vec<(usize, usize)> = graph
        .graph
        .edge_references()
        .map(|edge| {
            let (a, b) = (edge.source().index(), edge.target().index());
            (a.min(b), a.max(b))
        })
        .collect();
    pairs.sort_unstable();
    pairs.dedup();

    let mut forest = UnionFind::<usize>::new(graph.graph.node_bound());
    pairs.into_iter().all(|(a, b)| a != b && forest.union(a, b))
}

/// Whether the graph forms exactly one weakly-connected component.
pub fn connected(graph: &OwnershipGraph) -> bool {
    graph.node_count() > 0 && connected_components(&graph.graph) == 1
}

/// Whether every human has at most `limit` owners.
pub fn no_more_than_n_per(graph: &OwnershipGraph, limit: usize) -> bool {
    graph
        .graph
        .node_indices()
        .filter(|&ix| graph.graph[ix].human)
        .all(|ix| graph.in_degree(ix) <= limit)
}

/// [`no_more_than_n_per`] with the default limit of two.
pub fn no_more_than_two_per(graph: &OwnershipGraph) -> bool {
    no_more_than_n_per(graph, DEFAULT_HUMAN_OWNER_LIMIT)
}

/// Whether every root is a human.
pub fn only_human_roots(graph: &OwnershipGraph) -> bool {
    graph
        .graph
        .node_indices()
        .filter(|&ix| graph.in_degree(ix) == 0)
        .all(|ix| graph.graph[ix].human)
}

/// Whether no human is owned.
pub fn no_slavery(graph: &OwnershipGraph) -> bool {
    graph
        .graph
        .node_indices()
        .filter(|&ix| graph.graph[ix].human)
        .all(|ix| graph.in_degree(ix) == 0)
}

/// Whether `graph` passes every check in order.
pub fn check_if_subgraph_passes(graph: &OwnershipGraph, checks: &[Check]) -> bool {
    checks.iter().all(|check| check.passes(graph))
}

/// Copy of `graph` with one endpoint of a random edge moved to a random node
/// that is not on that edge.
///
/// The moved edge keeps its attributes and replaces any edge already joining
/// the new pair. Graphs without edges, or without a third node, are returned
/// unchanged.
pub fn one_swap<R>(graph: &OwnershipGraph, mode: SwapMode, rng: &mut R) -> OwnershipGraph
where
    R: Rng + ?Sized,
{
    let mut swapped = graph.clone();

    let edges = graph.edge_pairs();
    let Some(&(owner, owned)) = edges.choose(rng) else {
        return swapped;
    };

    let others: Vec<NodeId> = graph
        .node_ids()
        .into_iter()
        .filter(|&id| id != owner && id != owned)
        .collect();
    let Some(&third) = others.choose(rng) else {
        tracing::debug!(owner, owned, "no third node to swap to");
        return swapped;
    };

    let Some(edge) = swapped.remove_edge(owner, owned) else {
        return swapped;
    };
    let move_origin = match mode {
        SwapMode::Origin => true,
        SwapMode::Destination => false,
        SwapMode::Random => rng.gen_bool(0.5),
    };
    let (from, to) = if move_origin {
        (third, owned)
    } else {
        (owner, third)
    };
    swapped.set_edge(from, to, edge);
    swapped.refresh_degrees();
    swapped
}

/// First swap of `graph` that passes every check, or `None` once
/// `config.n_tries` candidates have failed.
pub fn get_swapped_subgraph<R>(
    graph: &OwnershipGraph,
    checks: &[Check],
    config: &SwapConfig,
    rng: &mut R,
) -> Option<OwnershipGraph>
where
    R: Rng + ?Sized,
{
    for attempt in 1..=config.n_tries {
        let candidate = one_swap(graph, config.mode, rng);
        if check_if_subgraph_passes(&candidate, checks) {
            tracing::debug!(attempt, mode = %config.mode, "found passing swap");
            return Some(candidate);
        }
    }
    tracing::debug!(tries = config.n_tries, "no passing swap found");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rama_graph::EdgeList;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn graph(edges: &[(NodeId, NodeId)], humans: &[NodeId]) -> OwnershipGraph {
        let mut graph = OwnershipGraph::from_edge_list(&EdgeList {
            edges: edges.to_vec(),
        });
        for &id in humans {
            let ix = graph.ix(id).expect("node");
            graph.graph[ix].human = true;
        }
        graph
    }

    #[test]
    fn swap_mode_parsing() {
        assert_eq!("origin".parse::<SwapMode>().expect("valid"), SwapMode::Origin);
        assert_eq!("source".parse::<SwapMode>().expect("valid"), SwapMode::Origin);
        assert_eq!(
            "Destination".parse::<SwapMode>().expect("valid"),
            SwapMode::Destination
        );
        assert!("sideways".parse::<SwapMode>().is_err());
    }

    #[test]
    fn cycle_checks() {
        assert!(no_cycles(&graph(&[(1, 2), (2, 3)], &[])));
        assert!(!no_cycles(&graph(&[(1, 2), (2, 3), (1, 3)], &[])));
        assert!(!no_cycles(&graph(&[(1, 1)], &[])));
        // Mutual ownership collapses to a single undirected edge.
        assert!(no_cycles(&graph(&[(1, 2), (2, 1)], &[])));
    }

    #[test]
    fn connectivity_check() {
        assert!(connected(&graph(&[(1, 2), (3, 2)], &[])));
        assert!(!connected(&graph(&[(1, 2), (3, 4)], &[])));
        assert!(!connected(&OwnershipGraph::default()));
    }

    #[test]
    fn human_checks() {
        let g = graph(&[(1, 3), (2, 3), (4, 1), (5, 1), (6, 1)], &[1, 2]);
        assert!(!no_more_than_two_per(&g));
        assert!(no_more_than_n_per(&g, 3));
        assert!(!no_slavery(&g));
        assert!(!only_human_roots(&g));

        let clean = graph(&[(1, 3), (2, 3)], &[1, 2]);
        assert!(no_slavery(&clean));
        assert!(only_human_roots(&clean));
    }

    #[test]
    fn one_swap_moves_exactly_one_endpoint() {
        let g = graph(&[(1, 2), (2, 3)], &[]);
        let mut rng = Pcg64Mcg::seed_from_u64(7);

        for mode in [SwapMode::Origin, SwapMode::Destination, SwapMode::Random] {
            for _ in 0..20 {
                let swapped = one_swap(&g, mode, &mut rng);
                assert_eq!(swapped.node_count(), 3);
                let kept = swapped
                    .edge_pairs()
                    .into_iter()
                    .filter(|pair| g.edge_pairs().contains(pair))
                    .count();
                assert!(kept >= 1, "{mode}: {:?}", swapped.edge_pairs());
            }
        }
    }

    #[test]
    fn origin_swap_keeps_destination() {
        let g = graph(&[(1, 2)], &[]);
        let mut g3 = g.clone();
        g3.ensure_node(3);
        let mut rng = Pcg64Mcg::seed_from_u64(1);

        let swapped = one_swap(&g3, SwapMode::Origin, &mut rng);
        assert_eq!(swapped.edge_pairs(), vec![(3, 2)]);
        let swapped = one_swap(&g3, SwapMode::Destination, &mut rng);
        assert_eq!(swapped.edge_pairs(), vec![(1, 3)]);
    }

    #[test]
    fn two_node_graph_is_returned_unchanged() {
        let g = graph(&[(1, 2)], &[1]);
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let config = SwapConfig {
            n_tries: 5,
            ..SwapConfig::default()
        };

        let checks = [Check::NoCycles, Check::Connected];
        let swapped =
            get_swapped_subgraph(&g, &checks, &config, &mut rng).expect("unchanged graph passes");
        assert_eq!(swapped.edge_pairs(), g.edge_pairs());
    }

    #[test]
    fn swapped_graph_passes_every_check() {
        // Two humans owning a holding that owns two subsidiaries.
        let g = graph(&[(1, 3), (2, 3), (3, 4), (3, 5)], &[1, 2]);
        let checks = [
            Check::NoCycles,
            Check::Connected,
            Check::HumanInDegreeAtMost(DEFAULT_HUMAN_OWNER_LIMIT),
            Check::OnlyHumanRoots,
            Check::NoHumanOwned,
        ];
        let mut rng = Pcg64Mcg::seed_from_u64(42);

        let swapped = get_swapped_subgraph(&g, &checks, &SwapConfig::default(), &mut rng)
            .expect("a passing swap exists");
        assert!(check_if_subgraph_passes(&swapped, &checks));
        assert_eq!(swapped.edge_count(), 4);
    }

    #[test]
    fn impossible_constraints_exhaust_the_budget() {
        let g = graph(&[(1, 2), (2, 3)], &[]);
        let config = SwapConfig {
            n_tries: 10,
            mode: SwapMode::Random,
        };
        let mut rng = Pcg64Mcg::seed_from_u64(9);
        // No company-only graph has human roots.
        assert!(get_swapped_subgraph(&g, &[Check::OnlyHumanRoots], &config, &mut rng).is_none());
    }
}

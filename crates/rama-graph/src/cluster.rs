//! Weakly-connected cluster description and shape classification.
//!
//! A cluster is one weakly-connected component of the ownership graph.
//! [`describe_cluster`] computes its structural and temporal descriptors and
//! [`classify`] maps the `(nodes, roots, branches)` triple to a
//! [`ClusterClass`].
//!
//! Degrees are read from the graph the cluster lives in, so a component
//! described on the full graph and on its own induced subgraph agree.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use eyre::{eyre, Result, WrapErr};
use petgraph::graph::NodeIndex;
use petgraph::unionfind::UnionFind;
use petgraph::visit::{EdgeRef, NodeIndexable};
use petgraph::Direction;
use serde::Serialize;

use crate::ownership_graph::{distinct_sic_codes, OwnershipGraph};
use crate::resolve::NodeId;

/// Days per year used for growing times.
pub const GROWTH_PERIOD_DAYS: f64 = 365.2425;

/// Shape class of a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterClass {
    /// Fewer than three nodes.
    Boring,
    /// One root, no branches.
    Bush,
    /// Several roots, no branches.
    Arrow,
    /// One root, at least one branch.
    Tree,
    /// Several roots and at least one branch.
    Bug,
    /// No root, e.g. a pure ownership cycle.
    Unclassified,
}

impl ClusterClass {
    /// Integer code: boring 0 through bug 4, unclassified -1.
    pub fn code(self) -> i8 {
        match self {
            Self::Boring => 0,
            Self::Bush => 1,
            Self::Arrow => 2,
            Self::Tree => 3,
            Self::Bug => 4,
            Self::Unclassified => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boring => "boring",
            Self::Bush => "bush",
            Self::Arrow => "arrow",
            Self::Tree => "tree",
            Self::Bug => "bug",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ClusterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a cluster from its counts. The first matching rule wins.
pub fn classify(node_count: usize, root_count: usize, branch_count: usize) -> ClusterClass {
    match (node_count, root_count, branch_count) {
        (n, _, _) if n < 3 => ClusterClass::Boring,
        (_, 1, 0) => ClusterClass::Bush,
        (_, r, 0) if r > 1 => ClusterClass::Arrow,
        (_, 1, _) => ClusterClass::Tree,
        (_, r, b) if r > 0 && b > 0 => ClusterClass::Bug,
        _ => ClusterClass::Unclassified,
    }
}

/// A direct child of a branch node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SproutDetail {
    pub node: NodeId,
    pub date_of_creation: Option<NaiveDate>,
    /// Years between the branch's creation and this sprout's.
    pub growing_time: Option<f64>,
    pub sic_codes: Option<Vec<String>>,
}

/// A node that is owned and owns more than one company.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BranchDetail {
    pub node: NodeId,
    pub out_degree: usize,
    pub date_of_creation: Option<NaiveDate>,
    /// Years between the cluster's earliest creation date and this branch's.
    pub growing_time: Option<f64>,
    pub sprouts: Vec<SproutDetail>,
}

/// Structural and temporal summary of one cluster.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterDescriptor {
    /// Member ids, ascending.
    pub nodes: Vec<NodeId>,
    pub node_count: usize,
    pub root_count: usize,
    pub branch_count: usize,
    /// Longest simple ownership chain, in edges.
    pub max_length: usize,
    pub human_count: usize,
    pub min_date_of_creation: Option<NaiveDate>,
    pub max_date_of_creation: Option<NaiveDate>,
    /// Years spanned by the members' creation dates.
    pub growing_time: Option<f64>,
    /// Distinct SIC codes across members.
    pub sic_codes: Vec<String>,
    pub branches: Vec<BranchDetail>,
}

impl ClusterDescriptor {
    pub fn class(&self) -> ClusterClass {
        classify(self.node_count, self.root_count, self.branch_count)
    }
}

/// A descriptor together with its class.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassifiedCluster {
    pub class: ClusterClass,
    pub code: i8,
    pub descriptor: ClusterDescriptor,
}

impl From<ClusterDescriptor> for ClassifiedCluster {
    fn from(descriptor: ClusterDescriptor) -> Self {
        let class = descriptor.class();
        Self {
            class,
            code: class.code(),
            descriptor,
        }
    }
}

fn years_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / GROWTH_PERIOD_DAYS
}

/// Describe the cluster formed by `ids` within `graph`.
///
/// # Errors
/// Returns error if `ids` is empty or names a node absent from the graph.
pub fn describe_cluster(graph: &OwnershipGraph, ids: &[NodeId]) -> Result<ClusterDescriptor> {
    if ids.is_empty() {
        return Err(eyre!("cannot describe an empty cluster"));
    }

    let mut nodes = ids.to_vec();
    nodes.sort_unstable();
    nodes.dedup();

    let members = nodes
        .iter()
        .map(|&id| {
            graph
                .ix(id)
                .ok_or_else(|| eyre!("node {id} is not part of the graph"))
        })
        .collect::<Result<Vec<NodeIndex>>>()?;

    let mut root_count = 0;
    let mut human_count = 0;
    let mut branch_ixs = Vec::new();
    for &ix in &members {
        let in_degree = graph.in_degree(ix);
        let out_degree = graph.out_degree(ix);
        if in_degree == 0 {
            root_count += 1;
        }
        if in_degree > 0 && out_degree > 1 {
            branch_ixs.push(ix);
        }
        if graph.graph[ix].human {
            human_count += 1;
        }
    }

    let dates: Vec<NaiveDate> = members
        .iter()
        .filter_map(|&ix| graph.graph[ix].date_of_creation)
        .collect();
    let min_date = dates.iter().min().copied();
    let max_date = dates.iter().max().copied();
    let growing_time = min_date.zip(max_date).map(|(lo, hi)| years_between(lo, hi));

    let branches = branch_ixs
        .iter()
        .map(|&ix| branch_detail(graph, ix, min_date))
        .collect::<Vec<_>>();

    let max_length = members
        .iter()
        .map(|&ix| longest_path_from(graph, ix))
        .max()
        .unwrap_or(0);

    Ok(ClusterDescriptor {
        node_count: nodes.len(),
        root_count,
        branch_count: branches.len(),
        max_length,
        human_count,
        min_date_of_creation: min_date,
        max_date_of_creation: max_date,
        growing_time,
        sic_codes: distinct_sic_codes(graph, &nodes),
        branches,
        nodes,
    })
}

fn branch_detail(
    graph: &OwnershipGraph,
    ix: NodeIndex,
    cluster_start: Option<NaiveDate>,
) -> BranchDetail {
    let node = &graph.graph[ix];
    let branch_date = node.date_of_creation;

    let mut sprouts: Vec<SproutDetail> = graph
        .graph
        .edges_directed(ix, Direction::Outgoing)
        .map(|edge| {
            let sprout = &graph.graph[edge.target()];
            SproutDetail {
                node: sprout.id,
                date_of_creation: sprout.date_of_creation,
                growing_time: branch_date
                    .zip(sprout.date_of_creation)
                    .map(|(from, to)| years_between(from, to)),
                sic_codes: sprout.sic_codes.clone(),
            }
        })
        .collect();
    sprouts.sort_by_key(|sprout| sprout.node);

    BranchDetail {
        node: node.id,
        out_degree: sprouts.len(),
        date_of_creation: branch_date,
        growing_time: cluster_start
            .zip(branch_date)
            .map(|(from, to)| years_between(from, to)),
        sprouts,
    }
}

/// Length in edges of the longest simple path starting at `start`.
///
/// Following an edge back onto the current path ends that exploration and
/// counts as a path of length one, so cycles and self-loops truncate rather
/// than loop forever.
fn longest_path_from(graph: &OwnershipGraph, start: NodeIndex) -> usize {
    let successors = |ix: NodeIndex| -> Vec<NodeIndex> {
        graph
            .graph
            .neighbors_directed(ix, Direction::Outgoing)
            .collect()
    };

    let mut best = 0;
    let mut on_path: HashSet<NodeIndex> = HashSet::from([start]);
    let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = vec![(start, successors(start))];

    while let Some((node, pending)) = stack.last_mut() {
        let node = *node;
        match pending.pop() {
            Some(next) if on_path.contains(&next) => best = best.max(1),
            Some(next) => {
                on_path.insert(next);
                stack.push((next, successors(next)));
                best = best.max(stack.len() - 1);
            }
            None => {
                on_path.remove(&node);
                stack.pop();
            }
        }
    }

    best
}

/// Weakly-connected components as sorted id lists.
///
/// Ordered by descending size, ties by smallest member id.
pub fn weakly_connected_components(graph: &OwnershipGraph) -> Vec<Vec<NodeId>> {
    let mut union_find = UnionFind::<usize>::new(graph.graph.node_bound());
    for edge in graph.graph.edge_references() {
        union_find.union(edge.source().index(), edge.target().index());
    }

    let mut groups: HashMap<usize, Vec<NodeId>> = HashMap::new();
    for ix in graph.graph.node_indices() {
        groups
            .entry(union_find.find(ix.index()))
            .or_default()
            .push(graph.graph[ix].id);
    }

    let mut components: Vec<Vec<NodeId>> = groups
        .into_values()
        .map(|mut component| {
            component.sort_unstable();
            component
        })
        .collect();
    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    tracing::debug!(components = components.len(), "found weak components");
    components
}

/// Describe and classify every component, labelled by position.
///
/// # Errors
/// Returns error if a component names a node absent from the graph.
#[tracing::instrument(skip_all, fields(components = components.len()))]
pub fn classify_components(
    graph: &OwnershipGraph,
    components: &[Vec<NodeId>],
) -> Result<BTreeMap<usize, ClassifiedCluster>> {
    let mut classified = BTreeMap::new();
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();

    for (label, component) in components.iter().enumerate() {
        let descriptor = describe_cluster(graph, component)
            .wrap_err_with(|| format!("describing component {label}"))?;
        let cluster = ClassifiedCluster::from(descriptor);
        *counts.entry(cluster.class.as_str()).or_default() += 1;
        classified.insert(label, cluster);
    }

    tracing::info!(?counts, "classified clusters");
    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_list::EdgeList;

    fn graph(edges: &[(NodeId, NodeId)]) -> OwnershipGraph {
        OwnershipGraph::from_edge_list(&EdgeList {
            edges: edges.to_vec(),
        })
    }

    fn set_date(graph: &mut OwnershipGraph, id: NodeId, y: i32, m: u32, d: u32) {
        let ix = graph.ix(id).expect("node");
        graph.graph[ix].date_of_creation = NaiveDate::from_ymd_opt(y, m, d);
    }

    #[test]
    fn classification_table() {
        assert_eq!(classify(1, 1, 0), ClusterClass::Boring);
        assert_eq!(classify(2, 0, 0), ClusterClass::Boring);
        assert_eq!(classify(5, 1, 0), ClusterClass::Bush);
        assert_eq!(classify(5, 2, 0), ClusterClass::Arrow);
        assert_eq!(classify(5, 1, 2), ClusterClass::Tree);
        assert_eq!(classify(5, 3, 1), ClusterClass::Bug);
        assert_eq!(classify(5, 0, 0), ClusterClass::Unclassified);
        assert_eq!(classify(5, 0, 2), ClusterClass::Unclassified);
    }

    #[test]
    fn class_codes_and_names() {
        assert_eq!(ClusterClass::Tree.code(), 3);
        assert_eq!(ClusterClass::Unclassified.code(), -1);
        assert_eq!(ClusterClass::Arrow.to_string(), "arrow");
    }

    #[test]
    fn chain_is_a_bush() {
        let g = graph(&[(1, 2), (2, 3), (3, 4)]);
        let d = describe_cluster(&g, &[1, 2, 3, 4]).expect("cluster");
        assert_eq!((d.node_count, d.root_count, d.branch_count), (4, 1, 0));
        assert_eq!(d.max_length, 3);
        assert_eq!(d.class(), ClusterClass::Bush);
    }

    #[test]
    fn owned_holding_with_two_subsidiaries_is_a_tree() {
        // 1 owns 2; 2 owns 3 and 4.
        let mut g = graph(&[(1, 2), (2, 3), (2, 4)]);
        set_date(&mut g, 2, 2000, 1, 1);
        set_date(&mut g, 3, 2001, 1, 1);
        set_date(&mut g, 4, 2002, 1, 1);

        let d = describe_cluster(&g, &[1, 2, 3, 4]).expect("cluster");
        assert_eq!(d.class(), ClusterClass::Tree);
        assert_eq!(d.max_length, 2);
        assert_eq!(d.branches.len(), 1);

        let branch = &d.branches[0];
        assert_eq!(branch.node, 2);
        assert_eq!(branch.out_degree, 2);
        assert_eq!(branch.growing_time, Some(0.0));
        assert_eq!(
            branch.sprouts.iter().map(|s| s.node).collect::<Vec<_>>(),
            vec![3, 4]
        );
        let first = branch.sprouts[0].growing_time.expect("dated");
        assert!((first - 366.0 / GROWTH_PERIOD_DAYS).abs() < 1e-12);

        let span = d.growing_time.expect("dated");
        assert!((span - 731.0 / GROWTH_PERIOD_DAYS).abs() < 1e-12);
        assert_eq!(d.min_date_of_creation, NaiveDate::from_ymd_opt(2000, 1, 1));
    }

    #[test]
    fn cycle_truncates_instead_of_looping() {
        let g = graph(&[(1, 2), (2, 3), (3, 1)]);
        let d = describe_cluster(&g, &[1, 2, 3]).expect("cluster");
        assert_eq!(d.max_length, 2);
        assert_eq!(d.root_count, 0);
        assert_eq!(d.class(), ClusterClass::Unclassified);
    }

    #[test]
    fn self_loop_counts_as_length_one() {
        let g = graph(&[(7, 7)]);
        let d = describe_cluster(&g, &[7]).expect("cluster");
        assert_eq!(d.max_length, 1);
    }

    #[test]
    fn undated_cluster_has_no_growing_time() {
        let g = graph(&[(1, 2)]);
        let d = describe_cluster(&g, &[1, 2]).expect("cluster");
        assert_eq!(d.growing_time, None);
        assert_eq!(d.min_date_of_creation, None);
    }

    #[test]
    fn unknown_or_empty_members_are_errors() {
        let g = graph(&[(1, 2)]);
        assert!(describe_cluster(&g, &[]).is_err());
        assert!(describe_cluster(&g, &[1, 9]).is_err());
    }

    #[test]
    fn components_ordered_by_size_then_smallest_id() {
        let g = graph(&[(10, 11), (1, 2), (2, 3), (20, 21)]);
        let components = weakly_connected_components(&g);
        assert_eq!(components, vec![vec![1, 2, 3], vec![10, 11], vec![20, 21]]);

        let classified = classify_components(&g, &components).expect("classified");
        assert_eq!(classified[&0].class, ClusterClass::Bush);
        assert_eq!(classified[&1].class, ClusterClass::Boring);
        assert_eq!(classified[&2].code, 0);
    }
}

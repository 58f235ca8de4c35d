//! Ownership graph construction and attribute assembly.
//!
//! Builds a directed graph where nodes are resolved identities and edges
//! point from owner to owned. Nodes are created from the edge list with
//! placeholder attributes, then [`OwnershipGraph::set_attributes`] joins the
//! link tables back against the company registry.
//!
//! ## Totality
//!
//! Every node ends up with a full [`Node`] record. Attributes that no source
//! table provides stay `None` (or empty); nodes are never dropped for lack
//! of data, so downstream lookups by index cannot miss.
//!
//! One edge exists per ordered node pair. When the link tables repeat a
//! pair, the first row's natures of control are kept.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use eyre::{eyre, Result};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rama_data::clean::parse_registry_date;
use rama_data::vocab::{band_weight, is_ownership_tag};
use rama_data::CompanyRecord;
use serde::Serialize;

use crate::edge_list::EdgeList;
use crate::resolve::{CompanyRegistry, NodeId, ResolvedLinks};

/// A value gathered from several source rows that may disagree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Reconciled {
    /// No source row carried a value.
    #[default]
    Missing,
    /// All non-null values agree.
    Single(String),
    /// Distinct non-null values, in first-seen order.
    Many(Vec<String>),
}

impl Reconciled {
    /// Collapse candidate values: unanimous non-null → `Single`, several
    /// distinct non-null → `Many`, none → `Missing`.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let mut distinct: Vec<String> = Vec::new();
        for value in values.into_iter().flatten() {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        match distinct.len() {
            0 => Self::Missing,
            1 => Self::Single(distinct.remove(0)),
            _ => Self::Many(distinct),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// All known values.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Missing => Vec::new(),
            Self::Single(value) => vec![value.as_str()],
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Attributes of one ownership-graph participant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub human: bool,
    /// Owns nothing.
    pub leaf: bool,
    pub name: Option<String>,
    pub company_number: Option<String>,
    /// PSC `kind` of the row in which this node is a controller.
    pub kind: Option<String>,
    /// Registry `CompanyCategory`.
    pub category: Option<String>,
    /// Registry `CompanyStatus`.
    pub status: Option<String>,
    pub date_of_creation: Option<NaiveDate>,
    pub sic_codes: Option<Vec<String>>,
    pub previous_names: Vec<String>,
    pub country: Reconciled,
    pub postal_code: Reconciled,
    pub in_degree: usize,
    pub out_degree: usize,
}

impl Node {
    /// Node with every optional attribute unset.
    pub fn placeholder(id: NodeId) -> Self {
        Self {
            id,
            human: false,
            leaf: false,
            name: None,
            company_number: None,
            kind: None,
            category: None,
            status: None,
            date_of_creation: None,
            sic_codes: None,
            previous_names: Vec::new(),
            country: Reconciled::Missing,
            postal_code: Reconciled::Missing,
            in_degree: 0,
            out_degree: 0,
        }
    }
}

/// One ownership relation from owner to owned.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OwnershipEdge {
    /// Share-ownership tags of the relation, possibly empty.
    pub ownership: Vec<String>,
    /// Stake implied by `ownership`; `None` when absent or contradictory.
    pub weight: Option<f64>,
}

impl OwnershipEdge {
    pub fn from_natures(natures_of_control: &[String]) -> Self {
        let ownership: Vec<String> = natures_of_control
            .iter()
            .filter(|tag| is_ownership_tag(tag))
            .cloned()
            .collect();
        let weight = weight_from_ownership(&ownership);
        Self { ownership, weight }
    }
}

/// Stake implied by a set of ownership tags.
///
/// A single band, possibly repeated, gives its fixed stake. Bands that
/// disagree give `None` rather than an average, as does an empty set.
pub fn weight_from_ownership(ownership: &[String]) -> Option<f64> {
    let mut weights = ownership.iter().filter_map(|tag| band_weight(tag));
    let first = weights.next()?;
    weights.all(|w| w == first).then_some(first)
}

/// Directed ownership graph keyed by resolved [`NodeId`].
#[derive(Clone, Debug, Default)]
pub struct OwnershipGraph {
    /// The underlying petgraph directed graph.
    pub graph: DiGraph<Node, OwnershipEdge>,
    /// Lookup from node id to graph index.
    pub id_to_ix: HashMap<NodeId, NodeIndex>,
}

impl OwnershipGraph {
    /// Build the topology from an edge list, one edge per ordered pair.
    ///
    /// Nodes carry placeholder attributes, apart from degrees, until
    /// [`Self::set_attributes`].
    pub fn from_edge_list(edge_list: &EdgeList) -> Self {
        let mut graph = Self::default();
        for &(owner, owned) in &edge_list.edges {
            graph.ensure_node(owner);
            graph.ensure_node(owned);
            graph.add_edge(owner, owned, OwnershipEdge::default());
        }
        graph.refresh_degrees();
        graph
    }

    /// Add a node if absent, returning its graph index.
    pub fn ensure_node(&mut self, id: NodeId) -> NodeIndex {
        let graph = &mut self.graph;
        *self
            .id_to_ix
            .entry(id)
            .or_insert_with(|| graph.add_node(Node::placeholder(id)))
    }

    /// Add `owner → owned` unless the pair already has an edge.
    ///
    /// Both nodes must exist. Returns `None` if either is missing or the
    /// edge was already present.
    pub fn add_edge(
        &mut self,
        owner: NodeId,
        owned: NodeId,
        edge: OwnershipEdge,
    ) -> Option<EdgeIndex> {
        let a = self.ix(owner)?;
        let b = self.ix(owned)?;
        if self.graph.find_edge(a, b).is_some() {
            return None;
        }
        Some(self.graph.add_edge(a, b, edge))
    }

    /// Insert `owner → owned`, replacing the attributes of an existing edge.
    ///
    /// Returns `None` if either node is missing.
    pub fn set_edge(
        &mut self,
        owner: NodeId,
        owned: NodeId,
        edge: OwnershipEdge,
    ) -> Option<EdgeIndex> {
        let a = self.ix(owner)?;
        let b = self.ix(owned)?;
        Some(self.graph.update_edge(a, b, edge))
    }

    /// Remove `owner → owned`, returning its attributes.
    pub fn remove_edge(&mut self, owner: NodeId, owned: NodeId) -> Option<OwnershipEdge> {
        let edge = self.graph.find_edge(self.ix(owner)?, self.ix(owned)?)?;
        self.graph.remove_edge(edge)
    }

    pub fn ix(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_to_ix.get(&id).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.ix(id).map(|ix| &self.graph[ix])
    }

    pub fn edge(&self, owner: NodeId, owned: NodeId) -> Option<&OwnershipEdge> {
        let edge = self.graph.find_edge(self.ix(owner)?, self.ix(owned)?)?;
        self.graph.edge_weight(edge)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All node ids, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.id_to_ix.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All edges as `(owner, owned)` id pairs, ascending.
    pub fn edge_pairs(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<(NodeId, NodeId)> = self
            .graph
            .edge_references()
            .map(|e| (self.graph[e.source()].id, self.graph[e.target()].id))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    /// Live in-degree of a node (number of owners).
    pub fn in_degree(&self, ix: NodeIndex) -> usize {
        self.graph.edges_directed(ix, Direction::Incoming).count()
    }

    /// Live out-degree of a node (number of owned companies).
    pub fn out_degree(&self, ix: NodeIndex) -> usize {
        self.graph.edges_directed(ix, Direction::Outgoing).count()
    }

    /// Recompute cached degrees and leaf flags from the current topology.
    pub fn refresh_degrees(&mut self) {
        for ix in self.graph.node_indices().collect::<Vec<_>>() {
            let in_degree = self.in_degree(ix);
            let out_degree = self.out_degree(ix);
            let node = &mut self.graph[ix];
            node.in_degree = in_degree;
            node.out_degree = out_degree;
            node.leaf = out_degree == 0;
        }
    }

    /// Induced subgraph on `ids`, keeping node and edge attributes.
    ///
    /// # Errors
    /// Returns error if any id is not a node of this graph.
    pub fn subgraph(&self, ids: &[NodeId]) -> Result<Self> {
        let mut sub = Self::default();
        for &id in ids {
            if sub.id_to_ix.contains_key(&id) {
                continue;
            }
            let node = self
                .node(id)
                .ok_or_else(|| eyre!("node {id} is not part of the graph"))?;
            let ix = sub.graph.add_node(node.clone());
            sub.id_to_ix.insert(id, ix);
        }
        for edge in self.graph.edge_references() {
            let owner = self.graph[edge.source()].id;
            let owned = self.graph[edge.target()].id;
            if sub.id_to_ix.contains_key(&owner) && sub.id_to_ix.contains_key(&owned) {
                sub.add_edge(owner, owned, edge.weight().clone());
            }
        }
        sub.refresh_degrees();
        Ok(sub)
    }

    /// Fill node and edge attributes from the link tables and the registry.
    ///
    /// `companies` must be the same cleaned table the links were resolved
    /// against. Degrees are cached from the current topology.
    #[tracing::instrument(skip_all, fields(nodes = self.node_count(), edges = self.edge_count()))]
    pub fn set_attributes(&mut self, links: &ResolvedLinks, companies: &[CompanyRecord]) {
        let registry = CompanyRegistry::new(companies);
        let tables = AttributeTables::collect(links);

        for ix in self.graph.node_indices().collect::<Vec<_>>() {
            let id = self.graph[ix].id;
            self.graph[ix] = tables.node(id, &registry);
        }
        self.refresh_degrees();

        let mut unmatched = 0usize;
        for edge in self.graph.edge_indices().collect::<Vec<_>>() {
            let Some((a, b)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let pair = (self.graph[a].id, self.graph[b].id);
            match tables.natures.get(&pair) {
                Some(natures) => self.graph[edge] = OwnershipEdge::from_natures(natures),
                None => unmatched += 1,
            }
        }

        let unweighted = self
            .graph
            .edge_weights()
            .filter(|edge| edge.weight.is_none())
            .count();
        if unmatched > 0 {
            tracing::warn!(unmatched, "edges without a source link row");
        }
        tracing::info!(unweighted, "assembled node and edge attributes");
    }
}

/// Per-node attribute candidates joined from the link tables.
///
/// Scalar attributes keep the first value seen; address fields keep every
/// candidate so they can be reconciled.
#[derive(Debug, Default)]
struct AttributeTables {
    humans: HashSet<NodeId>,
    names: HashMap<NodeId, String>,
    numbers: HashMap<NodeId, String>,
    kinds: HashMap<NodeId, String>,
    countries: HashMap<NodeId, Vec<Option<String>>>,
    postal_codes: HashMap<NodeId, Vec<Option<String>>>,
    natures: HashMap<(NodeId, NodeId), Vec<String>>,
}

impl AttributeTables {
    fn collect(links: &ResolvedLinks) -> Self {
        let mut tables = Self::default();

        for link in &links.company_company {
            tables.name(link.idx_owner, Some(&link.owner_name));
            tables.name(link.idx_owned, link.owned_name.as_deref());
            tables.number(link.idx_owned, Some(&link.owned_number));
            tables.number(link.idx_owner, link.owner_number.as_deref());
            tables.kind(link.idx_owner, link.owner.kind.as_deref());
            tables.address(
                link.idx_owner,
                &link.owner.address_country,
                &link.owner.address_postal_code,
            );
            tables.natures(link.idx_owner, link.idx_owned, &link.natures_of_control);
        }

        for link in &links.human_company {
            tables.humans.insert(link.idx_human);
            tables.name(link.idx_company, Some(&link.company.company_name));
            tables.name(link.idx_human, link.human.name.as_deref());
            tables.number(link.idx_company, Some(&link.company.company_number));
            tables.kind(link.idx_human, link.human.kind.as_deref());
            tables.address(
                link.idx_human,
                &link.human.address_country,
                &link.human.address_postal_code,
            );
            tables.natures(link.idx_human, link.idx_company, &link.natures_of_control);
        }

        for link in &links.super_secure {
            tables.name(link.idx_company, link.company_name.as_deref());
            tables.name(link.idx_controller, link.controller.name.as_deref());
            tables.number(link.idx_company, Some(&link.company_number));
            tables.kind(link.idx_controller, link.controller.kind.as_deref());
            tables.address(
                link.idx_controller,
                &link.controller.address_country,
                &link.controller.address_postal_code,
            );
            tables.natures(
                link.idx_controller,
                link.idx_company,
                &link.natures_of_control,
            );
        }

        tables
    }

    fn name(&mut self, id: NodeId, name: Option<&str>) {
        if let Some(name) = name {
            self.names.entry(id).or_insert_with(|| name.to_string());
        }
    }

    fn number(&mut self, id: NodeId, number: Option<&str>) {
        if let Some(number) = number {
            self.numbers.entry(id).or_insert_with(|| number.to_string());
        }
    }

    fn kind(&mut self, id: NodeId, kind: Option<&str>) {
        if let Some(kind) = kind {
            self.kinds.entry(id).or_insert_with(|| kind.to_string());
        }
    }

    fn address(&mut self, id: NodeId, country: &Option<String>, postal_code: &Option<String>) {
        self.countries.entry(id).or_default().push(country.clone());
        self.postal_codes
            .entry(id)
            .or_default()
            .push(postal_code.clone());
    }

    fn natures(&mut self, owner: NodeId, owned: NodeId, natures: &[String]) {
        self.natures
            .entry((owner, owned))
            .or_insert_with(|| natures.to_vec());
    }

    /// Total construction of one node record. Missing data stays `None`.
    fn node(&self, id: NodeId, registry: &CompanyRegistry<'_>) -> Node {
        let mut node = Node::placeholder(id);
        node.human = self.humans.contains(&id);
        node.name = self.names.get(&id).cloned();
        node.company_number = self.numbers.get(&id).cloned();
        node.kind = self.kinds.get(&id).cloned();

        let company = node
            .company_number
            .as_deref()
            .and_then(|number| registry.by_number(number));
        if let Some(company) = company {
            node.category = company.category.clone();
            node.status = company.status.clone();
            node.date_of_creation = company
                .incorporation_date
                .as_deref()
                .and_then(parse_registry_date);
            node.sic_codes = (!company.sic_codes.is_empty()).then(|| company.sic_codes.clone());
            node.previous_names = company
                .previous_names
                .iter()
                .map(|previous| previous.company_name.clone())
                .collect();
        }

        // Controllers report their own address; companies that only appear
        // as owned fall back to the registered office.
        match (self.countries.get(&id), self.postal_codes.get(&id)) {
            (Some(countries), Some(postal_codes)) => {
                node.country = Reconciled::from_values(countries.iter().cloned());
                node.postal_code = Reconciled::from_values(postal_codes.iter().cloned());
            }
            _ => {
                if let Some(company) = company {
                    node.country = Reconciled::from_values([company.registered_country.clone()]);
                    node.postal_code =
                        Reconciled::from_values([company.registered_postal_code.clone()]);
                }
            }
        }

        node
    }
}

/// SIC codes of a set of nodes, deduplicated and sorted.
pub fn distinct_sic_codes(graph: &OwnershipGraph, ids: &[NodeId]) -> Vec<String> {
    ids.iter()
        .filter_map(|&id| graph.node(id))
        .filter_map(|node| node.sic_codes.as_ref())
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

//! Edge-list construction from the resolved link tables.
//!
//! The edge list is pure topology: `(owner, owned)` pairs in the order
//! humans, companies, super-secure controllers. Duplicate pairs are kept;
//! attributes are merged when the graph is assembled.

use serde::Serialize;

use crate::resolve::{NodeId, ResolvedLinks};

/// Directed `(owner, owned)` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EdgeList {
    pub edges: Vec<(NodeId, NodeId)>,
}

impl EdgeList {
    /// Concatenate the three link tiers.
    pub fn from_links(links: &ResolvedLinks) -> Self {
        let humans = links
            .human_company
            .iter()
            .map(|link| (link.idx_human, link.idx_company));
        let companies = links
            .company_company
            .iter()
            .map(|link| (link.idx_owner, link.idx_owned));
        let super_secure = links
            .super_secure
            .iter()
            .map(|link| (link.idx_controller, link.idx_company));

        Self {
            edges: humans.chain(companies).chain(super_secure).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Every index that appears at either end of an edge, ascending.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.edges.iter().flat_map(|&(i, j)| [i, j]).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

//! End-to-end table processing: clean → resolve → edge list → graph.

use eyre::{bail, Result};
use rama_data::clean::{clean_companies, clean_psc};
use rama_data::vocab::{is_nature_filter, DEFAULT_OWNERSHIP_FILTER};
use rama_data::{CompanyRecord, PscRecord};
use serde::{Deserialize, Serialize};

use crate::edge_list::EdgeList;
use crate::ownership_graph::OwnershipGraph;
use crate::resolve::{resolve_links, ResolvedLinks};

/// Environment variable overriding [`PipelineConfig::ownership_filter`].
pub const OWNERSHIP_FILTER_ENV: &str = "RAMA_OWNERSHIP_FILTER";

/// Settings for [`process_database`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Substring a PSC row's natures of control must contain to be kept.
    pub ownership_filter: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ownership_filter: DEFAULT_OWNERSHIP_FILTER.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overridden by [`OWNERSHIP_FILTER_ENV`] when set.
    ///
    /// # Errors
    /// Returns error if the variable is set but not valid UTF-8 or rejected
    /// by [`PipelineConfig::with_filter`].
    pub fn from_env() -> Result<Self> {
        match std::env::var(OWNERSHIP_FILTER_ENV) {
            Ok(filter) => Self::default().with_filter(&filter),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(err) => bail!("{OWNERSHIP_FILTER_ENV}: {err}"),
        }
    }

    /// Replace the ownership filter.
    ///
    /// # Errors
    /// Returns error if `filter` is blank, which would keep every row, or
    /// matches no nature-of-control family.
    pub fn with_filter(mut self, filter: &str) -> Result<Self> {
        let filter = filter.trim();
        if filter.is_empty() {
            bail!("ownership filter must not be empty");
        }
        if !is_nature_filter(filter) {
            bail!("ownership filter {filter:?} matches no nature-of-control family");
        }
        self.ownership_filter = filter.to_string();
        Ok(self)
    }
}

/// Cleaned registry, resolved links and edge list.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProcessedDatabase {
    pub companies: Vec<CompanyRecord>,
    pub links: ResolvedLinks,
    pub edge_list: EdgeList,
}

impl ProcessedDatabase {
    /// Assemble the attributed ownership graph.
    pub fn build_graph(&self) -> OwnershipGraph {
        let mut graph = OwnershipGraph::from_edge_list(&self.edge_list);
        graph.set_attributes(&self.links, &self.companies);
        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "built ownership graph"
        );
        graph
    }
}

/// Clean both registries, resolve identities and build the edge list.
#[tracing::instrument(skip_all, fields(filter = %config.ownership_filter))]
pub fn process_database(
    psc_tables: &[Vec<PscRecord>],
    company_tables: &[Vec<CompanyRecord>],
    config: &PipelineConfig,
) -> ProcessedDatabase {
    let psc = clean_psc(psc_tables, &config.ownership_filter);
    let companies = clean_companies(company_tables);
    let links = resolve_links(&psc, &companies);
    let edge_list = EdgeList::from_links(&links);

    tracing::info!(
        edges = edge_list.len(),
        nodes = edge_list.node_ids().len(),
        "processed database"
    );

    ProcessedDatabase {
        companies,
        links,
        edge_list,
    }
}

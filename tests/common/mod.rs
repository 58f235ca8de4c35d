//! Shared test helpers and utilities.
//!
//! Provides factory functions for registry rows and small ownership graphs
//! with sensible defaults.

#![allow(dead_code)]

use std::sync::Once;

use rama_data::{CompanyRecord, PscRecord};
use rama_graph::{EdgeList, NodeId, OwnershipEdge, OwnershipGraph};
use tracing_subscriber::EnvFilter;

pub const INDIVIDUAL: &str = "individual-person-with-significant-control";
pub const CORPORATE: &str = "corporate-entity-person-with-significant-control";
pub const SUPER_SECURE: &str = "super-secure-person-with-significant-control";

/// Installs a test-writer subscriber once per test binary.
///
/// Honours `RUST_LOG`, defaulting to `debug`.
pub fn init_test_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Stringified natures-of-control list as found in the registry.
pub fn natures(tags: &[&str]) -> String {
    let quoted: Vec<String> = tags.iter().map(|tag| format!("'{tag}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// An individual PSC row with raw (uncleaned) name and number.
///
/// # Example
/// ```ignore
/// let row = individual("Alice Smith", 1970, 4, "123", &["ownership-of-shares-25-to-50-percent"]);
/// ```
pub fn individual(name: &str, year: i32, month: u32, number: &str, tags: &[&str]) -> PscRecord {
    PscRecord {
        name: Some(name.to_string()),
        kind: Some(INDIVIDUAL.to_string()),
        birth_year: Some(year),
        birth_month: Some(month),
        company_number: number.to_string(),
        natures_of_control: Some(natures(tags)),
        ..PscRecord::default()
    }
}

/// A corporate PSC row: `owner` controls company `number`.
pub fn corporate(owner: &str, number: &str, tags: &[&str]) -> PscRecord {
    PscRecord {
        name: Some(owner.to_string()),
        kind: Some(CORPORATE.to_string()),
        company_number: number.to_string(),
        natures_of_control: Some(natures(tags)),
        ..PscRecord::default()
    }
}

/// A super-secure PSC row on company `number`.
pub fn super_secure(number: &str, tags: &[&str]) -> PscRecord {
    PscRecord {
        kind: Some(SUPER_SECURE.to_string()),
        company_number: number.to_string(),
        natures_of_control: Some(natures(tags)),
        ..PscRecord::default()
    }
}

/// A registry row with an incorporation date in registry text.
pub fn company(name: &str, number: &str, incorporated: Option<&str>) -> CompanyRecord {
    CompanyRecord {
        company_name: name.to_string(),
        company_number: number.to_string(),
        incorporation_date: incorporated.map(str::to_string),
        ..CompanyRecord::default()
    }
}

/// Graph with the given weighted edges; `humans` are flagged as people.
pub fn weighted_graph(edges: &[(NodeId, NodeId, f64)], humans: &[NodeId]) -> OwnershipGraph {
    let mut graph = OwnershipGraph::from_edge_list(&EdgeList {
        edges: edges.iter().map(|&(a, b, _)| (a, b)).collect(),
    });
    for &(a, b, weight) in edges {
        graph.set_edge(
            a,
            b,
            OwnershipEdge {
                ownership: Vec::new(),
                weight: Some(weight),
            },
        );
    }
    for &id in humans {
        let ix = graph.ix(id).expect("human node should exist");
        graph.graph[ix].human = true;
    }
    graph
}

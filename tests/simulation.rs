//! Integration tests for rama-sim: swaps, dividend flow and the optimiser on
//! graphs built from registry rows.

mod common;

use common::*;
use rama_graph::{process_database, OwnershipGraph, PipelineConfig};
use rama_sim::evolution::{differential_evolution, EvolutionConfig, Selection};
use rama_sim::swap::{
    check_if_subgraph_passes, get_swapped_subgraph, Check, SwapConfig, SwapMode,
    DEFAULT_HUMAN_OWNER_LIMIT,
};
use rama_sim::wealth::{loss_function, make_profit_dict, TaxRegime, WealthGraph};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

const QUARTER: &str = "ownership-of-shares-25-to-50-percent";
const HALF: &str = "ownership-of-shares-50-to-75-percent";
const MAJORITY: &str = "ownership-of-shares-75-to-100-percent";

const ALL_CHECKS: [Check; 5] = [
    Check::NoCycles,
    Check::Connected,
    Check::HumanInDegreeAtMost(DEFAULT_HUMAN_OWNER_LIMIT),
    Check::OnlyHumanRoots,
    Check::NoHumanOwned,
];

/// alice=1 owns 75% of holdco=3; bob=2 owns 25% of sub one=4;
/// holdco owns half of sub one and half of sub two=5.
fn holding_group() -> OwnershipGraph {
    let psc = vec![
        individual("Alice", 1970, 1, "1", &[MAJORITY]),
        individual("Bob", 1980, 6, "2", &[QUARTER]),
        corporate("HoldCo", "2", &[HALF]),
        corporate("HoldCo", "3", &[HALF]),
    ];
    let companies = vec![
        company("HoldCo", "1", None),
        company("Sub One", "2", None),
        company("Sub Two", "3", None),
    ];
    process_database(&[psc], &[companies], &PipelineConfig::default())
        .build_graph()
}

#[test]
fn registry_graph_has_expected_shape() {
    init_test_tracing();
    let graph = holding_group();
    assert_eq!(graph.edge_pairs(), vec![(1, 3), (2, 4), (3, 4), (3, 5)]);
    assert!(check_if_subgraph_passes(&graph, &ALL_CHECKS));
}

#[test]
fn formulations_agree_on_a_tree() -> eyre::Result<()> {
    let graph = holding_group();
    let wealth = WealthGraph::new(&graph)?;
    let (companies, humans) = wealth.partition_by_profit();
    assert_eq!(companies, vec![3, 4, 5]);
    assert_eq!(humans, vec![1, 2]);

    let profits = make_profit_dict(&[0.2, 0.5, 0.3], &companies, &humans);
    let taxes = TaxRegime::default();
    let recursive = wealth.recursive(&profits, &taxes)?;
    let theoretical = wealth.theoretical(&profits, &taxes)?;

    for (id, value) in &theoretical {
        assert!(
            (recursive[id] - value).abs() < 1e-12,
            "node {id}: recursive {} vs theoretical {value}",
            recursive[id]
        );
    }
    Ok(())
}

#[test]
fn untaxed_flow_conserves_wealth() {
    let graph = holding_group();
    let wealth = WealthGraph::new(&graph).expect("all edges weighted");
    let (companies, humans) = wealth.partition_by_profit();
    let profits = make_profit_dict(&[0.6, 0.1, 0.3], &companies, &humans);

    let untaxed = TaxRegime {
        basic_rate: 0.0,
        higher_rate: 0.0,
        additional_rate: 0.0,
        corporation_tax: 0.0,
        personal_dividend_allowance: 0.0,
        ..TaxRegime::default()
    };
    let loss = loss_function(&wealth, &profits, &untaxed).expect("loss");
    assert!(loss.abs() < 1e-12, "loss {loss}");

    let taxed = loss_function(&wealth, &profits, &TaxRegime::default()).expect("loss");
    assert!(taxed > 0.0 && taxed <= 1.0, "loss {taxed}");
}

#[test]
fn recursive_flow_rejects_ownership_rings() {
    let psc = vec![
        corporate("A", "2", &[HALF]),
        corporate("B", "3", &[HALF]),
        corporate("C", "1", &[HALF]),
    ];
    let companies = vec![
        company("A", "1", None),
        company("B", "2", None),
        company("C", "3", None),
    ];
    let graph = process_database(&[psc], &[companies], &PipelineConfig::default())
        .build_graph();
    let wealth = WealthGraph::new(&graph).expect("all edges weighted");
    let profits = make_profit_dict(&[0.3, 0.3, 0.4], &[1, 2, 3], &[]);

    let err = wealth
        .recursive(&profits, &TaxRegime::default())
        .expect_err("cyclic");
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn conflicting_bands_block_simulation() {
    let psc = vec![individual("Alice", 1970, 1, "1", &[QUARTER, MAJORITY])];
    let companies = vec![company("Only", "1", None)];
    let graph = process_database(&[psc], &[companies], &PipelineConfig::default())
        .build_graph();

    assert_eq!(graph.edge(1, 2).and_then(|e| e.weight), None);
    assert!(WealthGraph::new(&graph).is_err());
}

#[test]
fn optimiser_returns_normalised_allocations() {
    init_test_tracing();
    let graph = holding_group();
    let config = EvolutionConfig {
        generations: 4,
        max_iterations: 80,
        ..EvolutionConfig::default()
    };
    let mut rng = Pcg64Mcg::seed_from_u64(2024);

    let outcome = differential_evolution(&graph, &config, &TaxRegime::default(), &mut rng)
        .expect("valid configuration");

    assert_eq!(outcome.companies, vec![3, 4, 5]);
    assert_eq!(outcome.best_losses.len(), 80);
    assert!(outcome.best_losses.windows(2).all(|pair| pair[1] <= pair[0]));
    for best in &outcome.best_distributions {
        assert!((best.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(best.iter().all(|x| (0.0..=1.0).contains(x)));
    }
}

#[test]
fn feasibility_aware_run_is_reproducible() {
    let graph = holding_group();
    let config = EvolutionConfig {
        generations: 4,
        max_iterations: 40,
        selection: Selection::FeasibilityAware,
        ..EvolutionConfig::default()
    };
    let run = || {
        let mut rng = Pcg64Mcg::seed_from_u64(77);
        differential_evolution(&graph, &config, &TaxRegime::default(), &mut rng)
            .expect("valid configuration")
    };
    assert_eq!(run(), run());
}

#[test]
fn swapped_group_passes_every_check() {
    init_test_tracing();
    let graph = holding_group();
    let mut rng = Pcg64Mcg::seed_from_u64(8);

    for mode in ["origin", "destination", "random"] {
        let config = SwapConfig {
            mode: mode.parse().expect("valid mode"),
            ..SwapConfig::default()
        };
        let swapped = get_swapped_subgraph(&graph, &ALL_CHECKS, &config, &mut rng)
            .expect("a legal swap exists");
        assert!(check_if_subgraph_passes(&swapped, &ALL_CHECKS));
        assert_eq!(swapped.node_count(), graph.node_count());
    }
}

#[test]
fn invalid_swap_mode_is_a_configuration_error() {
    let err = "upside-down".parse::<SwapMode>().expect_err("invalid");
    assert!(err.to_string().contains("upside-down"));
}

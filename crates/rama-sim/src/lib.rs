//! Simulations over reconstructed ownership graphs.
//!
//! - [`swap`]: constrained random rewiring of ownership edges.
//! - [`wealth`]: dividend and tax flow through a weighted ownership graph.
//! - [`evolution`]: differential evolution over profit allocations.
//!
//! Randomness is always supplied by the caller as a [`rand::Rng`].

pub mod evolution;
pub mod swap;
pub mod wealth;

pub use evolution::{differential_evolution, EvolutionConfig, EvolutionOutcome, Selection};
pub use swap::{get_swapped_subgraph, one_swap, Check, SwapConfig, SwapMode};
pub use wealth::{loss_function, make_profit_dict, Profits, TaxRegime, WealthGraph};

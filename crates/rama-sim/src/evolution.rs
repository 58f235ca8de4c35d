//! Differential evolution over profit allocations.
//!
//! Searches for the split of one unit of profit across the companies of a
//! graph that minimises a loss, by default [`loss_function`]. Humans earn no
//! profit of their own. Each individual of the population is an allocation
//! vector normalised to sum to one.
//!
//! One iteration draws four distinct individuals (target, base, upper,
//! lower), builds the mutant `base + F·(upper − lower)`, crosses it with the
//! target and keeps whichever of trial and target the [`Selection`] rule
//! prefers.

use eyre::{bail, Result, WrapErr};
use rama_graph::{NodeId, OwnershipGraph};
use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::wealth::{loss_function, make_profit_dict, Profits, TaxRegime, WealthGraph};

/// How the trial vector competes with its target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Trial replaces target only on strictly lower loss.
    #[default]
    Greedy,
    /// Prefer vectors whose components all round into `(0, 1)`, then loss.
    FeasibilityAware,
}

/// Optimiser parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Mutation scale `F`, in `(0, 2]`.
    pub differential_weight: f64,
    /// Crossover probability `CR`, in `[0, 1]`.
    pub crossover_probability: f64,
    /// Population size per company.
    pub generations: usize,
    pub max_iterations: usize,
    pub selection: Selection,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            differential_weight: 0.8,
            crossover_probability: 0.9,
            generations: 10,
            max_iterations: 100,
            selection: Selection::Greedy,
        }
    }
}

impl EvolutionConfig {
    /// Population size for `companies` companies.
    pub fn population_size(&self, companies: usize) -> usize {
        self.generations.saturating_mul(companies)
    }

    /// # Errors
    /// Returns error for out-of-range rates, no companies, or a population
    /// too small to draw four distinct individuals.
    pub fn validate(&self, companies: usize) -> Result<()> {
        if !(self.differential_weight > 0.0 && self.differential_weight <= 2.0) {
            bail!(
                "differential weight must be in (0, 2], got {}",
                self.differential_weight
            );
        }
        if !(0.0..=1.0).contains(&self.crossover_probability) {
            bail!(
                "crossover probability must be in [0, 1], got {}",
                self.crossover_probability
            );
        }
        if companies == 0 {
            bail!("graph has no companies to allocate profit to");
        }
        let population = self.population_size(companies);
        if population < 4 {
            bail!("population of {population} is too small; need at least 4 individuals");
        }
        Ok(())
    }
}

/// Result of a differential evolution run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvolutionOutcome {
    /// Companies in allocation-vector order.
    pub companies: Vec<NodeId>,
    /// Every final individual tied at the minimum loss.
    pub best_distributions: Vec<Vec<f64>>,
    /// Best population loss after each iteration.
    pub best_losses: Vec<f64>,
    /// Loss of the best distributions.
    pub final_loss: f64,
}

impl EvolutionOutcome {
    /// First best distribution as a profit map.
    pub fn best_profits(&self) -> Option<Profits> {
        self.best_distributions
            .first()
            .map(|best| make_profit_dict(best, &self.companies, &[]))
    }
}

/// Run the optimiser with the theoretical tax-loss objective.
///
/// # Errors
/// Returns error if the configuration is invalid, an edge weight is
/// undefined, or the loss cannot be evaluated.
pub fn differential_evolution<R>(
    graph: &OwnershipGraph,
    config: &EvolutionConfig,
    taxes: &TaxRegime,
    rng: &mut R,
) -> Result<EvolutionOutcome>
where
    R: Rng + ?Sized,
{
    differential_evolution_with(graph, config, rng, |wealth, profits| {
        loss_function(wealth, profits, taxes)
    })
}

/// Run the optimiser with a caller-supplied loss.
///
/// # Errors
/// As [`differential_evolution`], plus any error returned by `loss`.
#[tracing::instrument(skip_all, fields(nodes = graph.node_count(), selection = ?config.selection))]
pub fn differential_evolution_with<R, F>(
    graph: &OwnershipGraph,
    config: &EvolutionConfig,
    rng: &mut R,
    mut loss: F,
) -> Result<EvolutionOutcome>
where
    R: Rng + ?Sized,
    F: FnMut(&WealthGraph<'_>, &Profits) -> Result<f64>,
{
    let wealth = WealthGraph::new(graph)?;
    let (companies, humans) = wealth.partition_by_profit();
    config.validate(companies.len())?;

    let len = companies.len();
    let population_size = config.population_size(len);
    let mut evaluate = |vector: &[f64]| -> Result<f64> {
        loss(&wealth, &make_profit_dict(vector, &companies, &humans))
    };

    let mut population: Vec<Vec<f64>> = (0..population_size)
        .map(|_| normalized((0..len).map(|_| rng.gen::<f64>()).collect()))
        .collect();
    let mut losses = population
        .iter()
        .map(|vector| evaluate(vector))
        .collect::<Result<Vec<f64>>>()
        .wrap_err("evaluating initial population")?;

    tracing::info!(
        companies = len,
        population = population_size,
        iterations = config.max_iterations,
        initial_best = min_loss(&losses),
        "starting differential evolution"
    );

    let mut best_losses = Vec::with_capacity(config.max_iterations);
    for iteration in 0..config.max_iterations {
        let picks = sample(rng, population_size, 4).into_vec();
        let (target, base, upper, lower) = (picks[0], picks[1], picks[2], picks[3]);
        let forced = rng.gen_range(0..len);

        let mut mutant: Vec<f64> = (0..len)
            .map(|j| {
                population[base][j]
                    + config.differential_weight * (population[upper][j] - population[lower][j])
            })
            .collect();
        for component in &mut mutant {
            if !in_open_unit(*component) {
                *component = rng.gen();
            }
        }

        let mask: Vec<bool> = (0..len)
            .map(|j| rng.gen::<f64>() <= config.crossover_probability || j == forced)
            .collect();
        let trial = normalized(
            population[target]
                .iter()
                .zip(&mutant)
                .zip(&mask)
                .map(|((&t, &m), &take)| if take { m } else { t })
                .collect(),
        );
        let target_vector = normalized(population[target].clone());

        let loss_trial = evaluate(&trial)
            .wrap_err_with(|| format!("evaluating trial at iteration {iteration}"))?;
        let loss_target = evaluate(&target_vector)
            .wrap_err_with(|| format!("evaluating target at iteration {iteration}"))?;

        let take_trial = match config.selection {
            Selection::Greedy => loss_trial < loss_target,
            Selection::FeasibilityAware => select_trial(
                loss_trial,
                loss_target,
                feasible_components(&trial),
                feasible_components(&target_vector),
                len,
            ),
        };
        if take_trial {
            population[target] = trial;
            losses[target] = loss_trial;
        }

        let best = min_loss(&losses);
        if best_losses.last().is_some_and(|&previous| best < previous) {
            tracing::debug!(iteration, best, "improved best loss");
        }
        best_losses.push(best);
    }

    let final_loss = min_loss(&losses);
    let best_distributions: Vec<Vec<f64>> = population
        .into_iter()
        .zip(&losses)
        .filter(|(_, &l)| l == final_loss)
        .map(|(vector, _)| vector)
        .collect();

    tracing::info!(
        final_loss,
        tied = best_distributions.len(),
        "finished differential evolution"
    );

    Ok(EvolutionOutcome {
        companies,
        best_distributions,
        best_losses,
        final_loss,
    })
}

/// Feasibility-aware choice between trial and target.
///
/// A feasible vector has every component rounding into `(0, 1)`. Feasible
/// beats infeasible; between two feasible vectors the lower loss wins; between
/// two infeasible ones the trial needs both more feasible components and a
/// lower loss.
pub fn select_trial(
    loss_trial: f64,
    loss_target: f64,
    feasible_trial: usize,
    feasible_target: usize,
    len: usize,
) -> bool {
    match (feasible_trial == len, feasible_target == len) {
        (true, true) => loss_trial < loss_target,
        (false, true) => false,
        (true, false) => true,
        (false, false) => feasible_trial > feasible_target && loss_trial < loss_target,
    }
}

/// Number of components that round, to two decimals, into `(0, 1)`.
pub fn feasible_components(vector: &[f64]) -> usize {
    vector.iter().filter(|&&x| in_open_unit(x)).count()
}

fn in_open_unit(x: f64) -> bool {
    let rounded = (x * 100.0).round() / 100.0;
    rounded > 0.0 && rounded < 1.0
}

fn normalized(mut vector: Vec<f64>) -> Vec<f64> {
    let total: f64 = vector.iter().sum();
    if total.is_finite() && total > 0.0 {
        for x in &mut vector {
            *x /= total;
        }
    }
    vector
}

fn min_loss(losses: &[f64]) -> f64 {
    losses.iter().copied().fold(f64::INFINITY, f64::min)
}

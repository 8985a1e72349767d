//! Shared population machinery of the metaheuristic strategies.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::consolidation_algorithm::ConsolidationAlgorithm;
use crate::core::consolidation_algorithms::first_fit::FirstFit;
use crate::core::fitness::Fitness;
use crate::core::local_search;
use crate::core::model::InfrastructureModel;

/// Fraction of the population seeded from the deterministic first fit heuristic.
const FIRST_FIT_SEED_SHARE: f64 = 0.25;

/// Population/swarm sizes below this are seeded purely at random, as there is
/// no room for the fractional seed categories.
const MIN_MIXED_SEEDING_SIZE: u32 = 3;

/// A member of the population: a VM-to-PM assignment with its fitness and the
/// number of iterations it survived without improvement.
#[derive(Clone, Debug)]
pub struct Individual {
    pub mapping: Vec<usize>,
    pub fitness: Fitness,
    pub trials: u32,
}

impl Individual {
    pub fn new(mapping: Vec<usize>, fitness: Fitness) -> Self {
        Self {
            mapping,
            fitness,
            trials: 0,
        }
    }
}

/// Uniformly random VM-to-PM assignment.
pub fn random_mapping(base: &InfrastructureModel, rng: &mut Pcg64) -> Vec<usize> {
    let pm_count = base.pms.len();
    (0..base.vms.len()).map(|_| rng.gen_range(0..pm_count)).collect()
}

/// Evaluates the fitness of an assignment against the seed snapshot.
pub fn evaluate_mapping(base: &InfrastructureModel, mapping: &[usize]) -> Fitness {
    let mut model = base.clone();
    model.apply_mapping(mapping);
    model.evaluate()
}

/// Builds an individual by applying the assignment and repairing it with the
/// best-fit-decreasing local search.
pub fn repaired_individual(base: &InfrastructureModel, mapping: &[usize]) -> Individual {
    let mut model = base.clone();
    model.apply_mapping(mapping);
    local_search::repair(&mut model);
    let fitness = model.evaluate();
    Individual::new(model.mapping(), fitness)
}

/// Replaces each VM's assigned PM independently with the given probability and
/// repairs the result.
pub fn mutate_individual(
    base: &InfrastructureModel,
    mapping: &[usize],
    probability: f64,
    rng: &mut Pcg64,
) -> Individual {
    let pm_count = base.pms.len();
    let mutated: Vec<usize> = mapping
        .iter()
        .map(|&pm| {
            if rng.gen_bool(probability) {
                rng.gen_range(0..pm_count)
            } else {
                pm
            }
        })
        .collect();
    repaired_individual(base, &mutated)
}

/// Seeds a population from the current snapshot: one unchanged copy of the
/// live mapping, a fixed fraction derived from first fit and the remainder
/// randomized. Sizes below three degenerate to pure-random individuals.
pub fn seed_population(base: &InfrastructureModel, size: u32, rng: &mut Pcg64) -> Vec<Individual> {
    let mut population = Vec::with_capacity(size as usize);
    if size >= MIN_MIXED_SEEDING_SIZE {
        let unchanged = base.mapping();
        let fitness = evaluate_mapping(base, &unchanged);
        population.push(Individual::new(unchanged, fitness));

        let first_fit_model = FirstFit::new().optimize(base, rng);
        let first_fit_seed = Individual::new(first_fit_model.mapping(), first_fit_model.evaluate());
        let first_fit_count = ((size as f64 * FIRST_FIT_SEED_SHARE) as u32).max(1);
        for _ in 0..first_fit_count {
            population.push(first_fit_seed.clone());
        }
    }
    while population.len() < size as usize {
        let mapping = random_mapping(base, rng);
        let fitness = evaluate_mapping(base, &mapping);
        population.push(Individual::new(mapping, fitness));
    }
    population
}

/// Index of the best individual in the population.
pub fn best_index(population: &[Individual]) -> usize {
    let mut best = 0;
    for i in 1..population.len() {
        if population[i].fitness.better_than(&population[best].fitness) {
            best = i;
        }
    }
    best
}

/// Writes the individual's assignment back into a result snapshot.
pub fn realize(base: &InfrastructureModel, individual: &Individual) -> InfrastructureModel {
    let mut model = base.clone();
    model.apply_mapping(&individual.mapping);
    model
}

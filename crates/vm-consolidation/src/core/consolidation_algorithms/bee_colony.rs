//! Artificial bee colony search over VM-to-PM mappings.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::config::ConsolidationConfig;
use crate::core::consolidation_algorithm::ConsolidationAlgorithm;
use crate::core::consolidation_algorithms::population::{
    evaluate_mapping, mutate_individual, random_mapping, realize, seed_population, Individual,
};
use crate::core::model::InfrastructureModel;

/// Artificial bee colony in three phases per iteration.
///
/// Employed bees mutate every individual and replace it on improvement.
/// Onlooker bees estimate each individual's quality from a fixed number of
/// random pairwise comparisons, converting the win count into a re-mutation
/// probability `(base + wins) / (base + samples)`. Scout bees replace any
/// individual that went too many trials without improvement with a fresh
/// random one. The best solution seen across all phases is the result.
pub struct BeeColony {
    colony_size: u32,
    iterations: u32,
    mutation_probability: f64,
    limit_trials: u32,
    sample_size: u32,
    probability_base: u32,
}

impl BeeColony {
    pub fn new(config: &ConsolidationConfig) -> Self {
        Self {
            colony_size: config.population_size,
            iterations: config.iterations,
            mutation_probability: config.mutation_probability,
            limit_trials: config.limit_trials,
            sample_size: config.sample_size,
            probability_base: config.probability_base,
        }
    }

    fn try_improve(
        &self,
        model: &InfrastructureModel,
        population: &mut [Individual],
        i: usize,
        best: &mut Individual,
        rng: &mut Pcg64,
    ) {
        let candidate = mutate_individual(model, &population[i].mapping, self.mutation_probability, rng);
        if candidate.fitness.better_than(&population[i].fitness) {
            population[i] = candidate;
        } else {
            population[i].trials += 1;
        }
        if population[i].fitness.better_than(&best.fitness) {
            *best = population[i].clone();
        }
    }
}

impl ConsolidationAlgorithm for BeeColony {
    fn optimize(&self, model: &InfrastructureModel, rng: &mut Pcg64) -> InfrastructureModel {
        if model.vms.is_empty() {
            return model.clone();
        }
        let mut population = seed_population(model, self.colony_size, rng);
        let mut best = population[0].clone();
        for individual in population.iter() {
            if individual.fitness.better_than(&best.fitness) {
                best = individual.clone();
            }
        }

        for _ in 0..self.iterations {
            // employed bees
            for i in 0..population.len() {
                self.try_improve(model, &mut population, i, &mut best, rng);
            }

            // onlooker bees
            if population.len() > 1 {
                for i in 0..population.len() {
                    let mut wins = 0;
                    for _ in 0..self.sample_size {
                        let mut other = rng.gen_range(0..population.len());
                        while other == i {
                            other = rng.gen_range(0..population.len());
                        }
                        if population[i].fitness.better_than(&population[other].fitness) {
                            wins += 1;
                        }
                    }
                    let probability =
                        (self.probability_base + wins) as f64 / (self.probability_base + self.sample_size) as f64;
                    if rng.gen_bool(probability.min(1.)) {
                        self.try_improve(model, &mut population, i, &mut best, rng);
                    }
                }
            }

            // scout bees
            for individual in population.iter_mut() {
                if individual.trials > self.limit_trials {
                    let mapping = random_mapping(model, rng);
                    let fitness = evaluate_mapping(model, &mapping);
                    *individual = Individual::new(mapping, fitness);
                    if individual.fitness.better_than(&best.fitness) {
                        best = individual.clone();
                    }
                }
            }
        }
        realize(model, &best)
    }
}

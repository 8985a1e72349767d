//! Genetic algorithm over VM-to-PM mapping genomes.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::config::ConsolidationConfig;
use crate::core::consolidation_algorithm::ConsolidationAlgorithm;
use crate::core::consolidation_algorithms::population::{
    best_index, mutate_individual, realize, repaired_individual, seed_population,
};
use crate::core::model::InfrastructureModel;

/// Elitist genetic algorithm: per-VM mutation and uniform crossover, both
/// followed by the local search repair; a child replaces its parent only when
/// its fitness is strictly better, so population members never regress.
pub struct Genetic {
    population_size: u32,
    iterations: u32,
    mutation_probability: f64,
    crossover_count: u32,
}

impl Genetic {
    pub fn new(config: &ConsolidationConfig) -> Self {
        Self {
            population_size: config.population_size,
            iterations: config.iterations,
            mutation_probability: config.mutation_probability,
            crossover_count: config.crossover_count,
        }
    }
}

impl ConsolidationAlgorithm for Genetic {
    fn optimize(&self, model: &InfrastructureModel, rng: &mut Pcg64) -> InfrastructureModel {
        if model.vms.is_empty() {
            return model.clone();
        }
        let mut population = seed_population(model, self.population_size, rng);
        for _ in 0..self.iterations {
            for i in 0..population.len() {
                let child = mutate_individual(model, &population[i].mapping, self.mutation_probability, rng);
                if child.fitness.better_than(&population[i].fitness) {
                    population[i] = child;
                }
            }
            for _ in 0..self.crossover_count {
                if population.len() < 2 {
                    break;
                }
                let a = rng.gen_range(0..population.len());
                let mut b = rng.gen_range(0..population.len());
                while b == a {
                    b = rng.gen_range(0..population.len());
                }
                let genome: Vec<usize> = population[a]
                    .mapping
                    .iter()
                    .zip(population[b].mapping.iter())
                    .map(|(&x, &y)| if rng.gen_bool(0.5) { x } else { y })
                    .collect();
                let child = repaired_individual(model, &genome);
                if child.fitness.better_than(&population[a].fitness) {
                    population[a] = child;
                }
            }
        }
        realize(model, &population[best_index(&population)])
    }
}

//! Particle swarm optimization over VM-to-PM index vectors.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::config::ConsolidationConfig;
use crate::core::consolidation_algorithm::ConsolidationAlgorithm;
use crate::core::consolidation_algorithms::population::{evaluate_mapping, seed_population, Individual};
use crate::core::fitness::Fitness;
use crate::core::model::InfrastructureModel;

/// Classic PSO with linearly decayed inertia weight.
///
/// A particle's position is a vector of PM indices, one entry per VM; velocity
/// updates attract each particle towards its personal best and the global best
/// with randomly scaled learning rates, and positions are rounded and clamped
/// back to valid PM indices before evaluation. The global best particle is the
/// final result.
pub struct ParticleSwarm {
    swarm_size: u32,
    iterations: u32,
    c1: f64,
    c2: f64,
    inertia_min: f64,
    inertia_max: f64,
}

struct Particle {
    position: Vec<f64>,
    velocity: Vec<f64>,
    best_position: Vec<f64>,
    best_fitness: Fitness,
}

impl ParticleSwarm {
    pub fn new(config: &ConsolidationConfig) -> Self {
        Self {
            swarm_size: config.population_size,
            iterations: config.iterations,
            c1: config.pso_c1,
            c2: config.pso_c2,
            inertia_min: config.pso_inertia_min,
            inertia_max: config.pso_inertia_max,
        }
    }

    fn round_mapping(position: &[f64], pm_count: usize) -> Vec<usize> {
        position
            .iter()
            .map(|&x| (x.round().max(0.) as usize).min(pm_count - 1))
            .collect()
    }
}

impl ConsolidationAlgorithm for ParticleSwarm {
    fn optimize(&self, model: &InfrastructureModel, rng: &mut Pcg64) -> InfrastructureModel {
        if model.vms.is_empty() {
            return model.clone();
        }
        let pm_count = model.pms.len();
        let max_index = (pm_count - 1) as f64;

        let seeds = seed_population(model, self.swarm_size, rng);
        let mut particles: Vec<Particle> = seeds
            .iter()
            .map(|seed| {
                let position: Vec<f64> = seed.mapping.iter().map(|&pm| pm as f64).collect();
                Particle {
                    velocity: vec![0.; position.len()],
                    best_position: position.clone(),
                    best_fitness: seed.fitness,
                    position,
                }
            })
            .collect();

        let mut global_best = {
            let mut best: Option<(Vec<f64>, Fitness)> = None;
            for particle in particles.iter() {
                if best
                    .as_ref()
                    .map_or(true, |(_, fitness)| particle.best_fitness.better_than(fitness))
                {
                    best = Some((particle.best_position.clone(), particle.best_fitness));
                }
            }
            best.unwrap()
        };

        for iteration in 0..self.iterations {
            let progress = if self.iterations > 1 {
                iteration as f64 / (self.iterations - 1) as f64
            } else {
                0.
            };
            let inertia = self.inertia_max - (self.inertia_max - self.inertia_min) * progress;

            for particle in particles.iter_mut() {
                for d in 0..particle.position.len() {
                    let r1: f64 = rng.gen();
                    let r2: f64 = rng.gen();
                    particle.velocity[d] = inertia * particle.velocity[d]
                        + self.c1 * r1 * (particle.best_position[d] - particle.position[d])
                        + self.c2 * r2 * (global_best.0[d] - particle.position[d]);
                    particle.position[d] = (particle.position[d] + particle.velocity[d]).clamp(0., max_index);
                }
                let mapping = Self::round_mapping(&particle.position, pm_count);
                let fitness = evaluate_mapping(model, &mapping);
                if fitness.better_than(&particle.best_fitness) {
                    particle.best_fitness = fitness;
                    particle.best_position = particle.position.clone();
                }
                if fitness.better_than(&global_best.1) {
                    global_best = (particle.position.clone(), fitness);
                }
            }
        }

        let winner = Individual::new(Self::round_mapping(&global_best.0, pm_count), global_best.1);
        let mut result = model.clone();
        result.apply_mapping(&winner.mapping);
        result
    }
}

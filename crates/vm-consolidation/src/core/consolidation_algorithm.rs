//! VM consolidation algorithms.

use rand_pcg::Pcg64;

use crate::core::config::{parse_config_value, parse_options, ConsolidationConfig};
use crate::core::consolidation_algorithms::bee_colony::BeeColony;
use crate::core::consolidation_algorithms::first_fit::FirstFit;
use crate::core::consolidation_algorithms::genetic::Genetic;
use crate::core::consolidation_algorithms::particle_swarm::ParticleSwarm;
use crate::core::model::InfrastructureModel;

/// Trait for implementation of VM consolidation algorithms.
///
/// The algorithm takes a snapshot of the current VM-to-PM mapping and returns
/// a new snapshot with an improved mapping. It never touches the live cluster;
/// the caller diffs the result against the cluster and compiles an action plan.
///
/// The random generator is passed explicitly so that a whole consolidation
/// cycle is reproducible from a single seed.
pub trait ConsolidationAlgorithm {
    fn optimize(&self, model: &InfrastructureModel, rng: &mut Pcg64) -> InfrastructureModel;
}

/// Resolves an algorithm spec string such as `FirstFit` or
/// `Genetic[mutation_probability=0.1,iterations=20]` into an algorithm
/// instance. Options override the corresponding config fields; unknown
/// algorithm names and option keys are fatal.
pub fn consolidation_algorithm_resolver(config: &ConsolidationConfig) -> Box<dyn ConsolidationAlgorithm> {
    let (name, options) = parse_config_value(&config.algorithm);
    let mut config = config.clone();
    if let Some(options) = options {
        apply_option_overrides(&mut config, &options);
    }
    match name.as_str() {
        "FirstFit" => Box::new(FirstFit::new()),
        "Genetic" => Box::new(Genetic::new(&config)),
        "ParticleSwarm" => Box::new(ParticleSwarm::new(&config)),
        "BeeColony" => Box::new(BeeColony::new(&config)),
        _ => panic!("Can't resolve consolidation algorithm: {}", config.algorithm),
    }
}

fn apply_option_overrides(config: &mut ConsolidationConfig, options_str: &str) {
    let options = parse_options(options_str);
    for (key, value) in options.iter() {
        match key.as_str() {
            "population_size" => config.population_size = parse(key, value),
            "iterations" => config.iterations = parse(key, value),
            "mutation_probability" => config.mutation_probability = parse(key, value),
            "crossover_count" => config.crossover_count = parse(key, value),
            "limit_trials" => config.limit_trials = parse(key, value),
            "c1" => config.pso_c1 = parse(key, value),
            "c2" => config.pso_c2 = parse(key, value),
            "inertia_min" => config.pso_inertia_min = parse(key, value),
            "inertia_max" => config.pso_inertia_max = parse(key, value),
            "sample_size" => config.sample_size = parse(key, value),
            "probability_base" => config.probability_base = parse(key, value),
            _ => panic!("Unknown algorithm option: {}", key),
        }
    }
    config.validate();
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> T {
    value
        .parse::<T>()
        .unwrap_or_else(|_| panic!("Can't parse algorithm option {}={}", key, value))
}

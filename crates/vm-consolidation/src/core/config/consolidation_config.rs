//! Consolidation cycle configuration.

use serde::{Deserialize, Serialize};

/// Holds raw config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawConsolidationConfig {
    pub algorithm: Option<String>,
    pub lower_threshold: Option<f64>,
    pub upper_threshold: Option<f64>,
    pub population_size: Option<u32>,
    pub iterations: Option<u32>,
    pub mutation_probability: Option<f64>,
    pub crossover_count: Option<u32>,
    pub limit_trials: Option<u32>,
    pub pso_c1: Option<f64>,
    pub pso_c2: Option<f64>,
    pub pso_inertia_min: Option<f64>,
    pub pso_inertia_max: Option<f64>,
    pub sample_size: Option<u32>,
    pub probability_base: Option<u32>,
    pub seed: Option<u64>,
    pub skip_empty_pms: Option<bool>,
}

/// Represents consolidation configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ConsolidationConfig {
    /// Consolidation algorithm spec, e.g. `FirstFit` or `Genetic[mutation_probability=0.1]`.
    pub algorithm: String,
    /// Fraction of PM capacity below which the PM counts as underallocated.
    pub lower_threshold: f64,
    /// Fraction of PM capacity above which the PM counts as overallocated.
    pub upper_threshold: f64,
    /// Population/swarm size of the population-based algorithms.
    pub population_size: u32,
    /// Number of search iterations.
    pub iterations: u32,
    /// Per-VM reassignment probability used by the mutation operator.
    pub mutation_probability: f64,
    /// Number of crossover children produced per genetic algorithm iteration.
    pub crossover_count: u32,
    /// Trials without improvement before a bee colony scout resets an individual.
    pub limit_trials: u32,
    /// Cognitive learning rate of particle swarm optimization.
    pub pso_c1: f64,
    /// Social learning rate of particle swarm optimization.
    pub pso_c2: f64,
    /// Final inertia weight of particle swarm optimization.
    pub pso_inertia_min: f64,
    /// Initial inertia weight of particle swarm optimization.
    pub pso_inertia_max: f64,
    /// Number of pairwise comparisons sampled by the bee colony onlooker phase.
    pub sample_size: u32,
    /// Base term of the onlooker acceptance probability.
    pub probability_base: u32,
    /// Seed of the random generator shared by the whole cycle.
    pub seed: u64,
    /// Excludes PMs hosting no VMs from the snapshot (when an external PM
    /// scheduler already manages idle capacity).
    pub skip_empty_pms: bool,
}

impl ConsolidationConfig {
    /// Creates config with default parameter values.
    pub fn new() -> Self {
        Self {
            algorithm: "FirstFit".to_string(),
            lower_threshold: 0.3,
            upper_threshold: 0.8,
            population_size: 32,
            iterations: 50,
            mutation_probability: 0.05,
            crossover_count: 8,
            limit_trials: 5,
            pso_c1: 2.,
            pso_c2: 2.,
            pso_inertia_min: 0.4,
            pso_inertia_max: 0.9,
            sample_size: 15,
            probability_base: 5,
            seed: 42,
            skip_empty_pms: false,
        }
    }

    /// Creates config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Self {
        let raw: RawConsolidationConfig = serde_yaml::from_str(
            &std::fs::read_to_string(file_name).unwrap_or_else(|_| panic!("Can't read file {}", file_name)),
        )
        .unwrap_or_else(|_| panic!("Can't parse YAML from file {}", file_name));
        Self::from_raw(raw)
    }

    /// Creates config from a YAML string.
    pub fn from_str(content: &str) -> Self {
        let raw: RawConsolidationConfig =
            serde_yaml::from_str(content).unwrap_or_else(|_| panic!("Can't parse YAML config: {}", content));
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConsolidationConfig) -> Self {
        let default = Self::new();
        let config = Self {
            algorithm: raw.algorithm.unwrap_or(default.algorithm),
            lower_threshold: raw.lower_threshold.unwrap_or(default.lower_threshold),
            upper_threshold: raw.upper_threshold.unwrap_or(default.upper_threshold),
            population_size: raw.population_size.unwrap_or(default.population_size),
            iterations: raw.iterations.unwrap_or(default.iterations),
            mutation_probability: raw.mutation_probability.unwrap_or(default.mutation_probability),
            crossover_count: raw.crossover_count.unwrap_or(default.crossover_count),
            limit_trials: raw.limit_trials.unwrap_or(default.limit_trials),
            pso_c1: raw.pso_c1.unwrap_or(default.pso_c1),
            pso_c2: raw.pso_c2.unwrap_or(default.pso_c2),
            pso_inertia_min: raw.pso_inertia_min.unwrap_or(default.pso_inertia_min),
            pso_inertia_max: raw.pso_inertia_max.unwrap_or(default.pso_inertia_max),
            sample_size: raw.sample_size.unwrap_or(default.sample_size),
            probability_base: raw.probability_base.unwrap_or(default.probability_base),
            seed: raw.seed.unwrap_or(default.seed),
            skip_empty_pms: raw.skip_empty_pms.unwrap_or(default.skip_empty_pms),
        };
        config.validate();
        config
    }

    /// Checks parameter values, panics on invalid configuration.
    ///
    /// Validation happens before any command is issued to the live cluster, so
    /// a misconfigured cycle never partially commits.
    pub fn validate(&self) {
        if !(self.lower_threshold > 0. && self.lower_threshold < 1.) {
            panic!("Invalid lower_threshold {}, expected (0, 1)", self.lower_threshold);
        }
        if !(self.upper_threshold > 0. && self.upper_threshold < 1.) {
            panic!("Invalid upper_threshold {}, expected (0, 1)", self.upper_threshold);
        }
        if self.lower_threshold >= self.upper_threshold {
            panic!(
                "lower_threshold {} must be below upper_threshold {}",
                self.lower_threshold, self.upper_threshold
            );
        }
        if !(0. ..=1.).contains(&self.mutation_probability) {
            panic!(
                "Invalid mutation_probability {}, expected [0, 1]",
                self.mutation_probability
            );
        }
        if self.population_size == 0 {
            panic!("population_size must be positive");
        }
        if self.iterations == 0 {
            panic!("iterations must be positive");
        }
        // the onlooker acceptance probability divides by this sum
        if self.probability_base + self.sample_size == 0 {
            panic!("probability_base + sample_size must be positive");
        }
        if self.pso_inertia_min > self.pso_inertia_max {
            panic!(
                "pso_inertia_min {} must not exceed pso_inertia_max {}",
                self.pso_inertia_min, self.pso_inertia_max
            );
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = ConsolidationConfig::from_str("algorithm: BeeColony\nupper_threshold: 0.75\nseed: 7\n");
        assert_eq!(config.algorithm, "BeeColony");
        assert_eq!(config.upper_threshold, 0.75);
        assert_eq!(config.seed, 7);
        assert_eq!(config.lower_threshold, 0.3);
        assert_eq!(config.population_size, 32);
    }

    #[test]
    #[should_panic]
    fn inverted_thresholds_are_fatal() {
        ConsolidationConfig::from_str("lower_threshold: 0.9\nupper_threshold: 0.5\n");
    }

    #[test]
    #[should_panic]
    fn zero_onlooker_probability_terms_are_fatal() {
        ConsolidationConfig::from_str("probability_base: 0\nsample_size: 0\n");
    }
}

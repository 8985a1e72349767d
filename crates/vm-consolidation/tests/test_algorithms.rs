use rand::SeedableRng;
use rand_pcg::Pcg64;

use vm_consolidation::core::cluster::PowerState;
use vm_consolidation::core::config::ConsolidationConfig;
use vm_consolidation::core::consolidation_algorithm::{consolidation_algorithm_resolver, ConsolidationAlgorithm};
use vm_consolidation::core::model::InfrastructureModel;
use vm_consolidation::core::resources::ResourceVector;
use vm_consolidation::extensions::simulated_cluster::SimulatedCluster;

const ALGORITHMS: [&str; 4] = ["FirstFit", "Genetic", "ParticleSwarm", "BeeColony"];

fn pm_capacity() -> ResourceVector {
    ResourceVector::new(10., 1000., 100)
}

fn test_config(algorithm: &str) -> ConsolidationConfig {
    let mut config = ConsolidationConfig::new();
    config.algorithm = algorithm.to_string();
    config.lower_threshold = 0.25;
    config.upper_threshold = 0.75;
    config.population_size = 16;
    config.iterations = 30;
    config
}

fn optimize(algorithm: &str, cluster: &SimulatedCluster) -> InfrastructureModel {
    let config = test_config(algorithm);
    let resolved = consolidation_algorithm_resolver(&config);
    let model = InfrastructureModel::from_cluster(cluster, &config);
    let mut rng = Pcg64::seed_from_u64(config.seed);
    resolved.optimize(&model, &mut rng)
}

#[test]
// Two PMs at 50% load are already balanced: nothing to migrate, both stay on.
fn balanced_cluster_needs_no_migrations() {
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_pm(2, pm_capacity(), PowerState::On);
    cluster.add_vm(101, ResourceVector::new(5., 1000., 50), 1);
    cluster.add_vm(102, ResourceVector::new(5., 1000., 50), 2);

    for algorithm in ALGORITHMS {
        let result = optimize(algorithm, &cluster);
        let fitness = result.evaluate();
        assert_eq!(fitness.migrations, 0, "{} migrated on a balanced cluster", algorithm);
        assert_eq!(fitness.active_pms, 2, "{} changed the active PM count", algorithm);
        assert_eq!(fitness.total_overload, 0., "{} overloaded a PM", algorithm);
    }
}

#[test]
// All VMs fit on a single PM: every strategy must consolidate down to one.
fn small_vms_consolidate_to_one_pm() {
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_pm(2, pm_capacity(), PowerState::On);
    cluster.add_pm(3, pm_capacity(), PowerState::On);
    cluster.add_vm(101, ResourceVector::new(2., 1000., 10), 1);
    cluster.add_vm(102, ResourceVector::new(1., 1000., 10), 2);
    cluster.add_vm(103, ResourceVector::new(1., 1000., 10), 3);

    for algorithm in ALGORITHMS {
        let result = optimize(algorithm, &cluster);
        let fitness = result.evaluate();
        assert_eq!(fitness.active_pms, 1, "{} left extra PMs active", algorithm);
        assert_eq!(fitness.total_overload, 0., "{} overloaded a PM", algorithm);
        // every VM remains placed
        let placed: usize = result.pms.iter().map(|pm| pm.vms.len()).sum();
        assert_eq!(placed, 3);
    }
}

#[test]
// Search never returns something worse than the mapping it started from.
fn result_is_never_worse_than_initial() {
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_pm(2, pm_capacity(), PowerState::On);
    cluster.add_pm(3, pm_capacity(), PowerState::On);
    cluster.add_vm(101, ResourceVector::new(8., 1000., 40), 1);
    cluster.add_vm(102, ResourceVector::new(2., 1000., 20), 1);
    cluster.add_vm(103, ResourceVector::new(3., 1000., 30), 2);
    cluster.add_vm(104, ResourceVector::new(1., 1000., 10), 3);

    for algorithm in ALGORITHMS {
        let config = test_config(algorithm);
        let model = InfrastructureModel::from_cluster(&cluster, &config);
        let initial = model.evaluate();
        let result = optimize(algorithm, &cluster);
        let fitness = result.evaluate();
        assert!(
            !initial.better_than(&fitness),
            "{} regressed: {} -> {}",
            algorithm,
            initial,
            fitness
        );
    }
}

#[test]
// A fixed seed makes a whole search reproducible.
fn search_is_reproducible() {
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_pm(2, pm_capacity(), PowerState::On);
    cluster.add_pm(3, pm_capacity(), PowerState::On);
    cluster.add_vm(101, ResourceVector::new(4., 1000., 30), 1);
    cluster.add_vm(102, ResourceVector::new(3., 1000., 20), 2);
    cluster.add_vm(103, ResourceVector::new(2., 1000., 10), 3);

    for algorithm in ["Genetic", "ParticleSwarm", "BeeColony"] {
        let first = optimize(algorithm, &cluster);
        let second = optimize(algorithm, &cluster);
        assert_eq!(first.mapping(), second.mapping(), "{} is not reproducible", algorithm);
    }
}

#[test]
// Populations below three are seeded purely at random and still work.
fn tiny_population_degenerates_to_random_seeding() {
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_pm(2, pm_capacity(), PowerState::On);
    cluster.add_vm(101, ResourceVector::new(2., 1000., 10), 1);
    cluster.add_vm(102, ResourceVector::new(1., 1000., 10), 2);

    for algorithm in ["Genetic", "ParticleSwarm", "BeeColony"] {
        let mut config = test_config(algorithm);
        config.population_size = 2;
        config.iterations = 10;
        let resolved = consolidation_algorithm_resolver(&config);
        let model = InfrastructureModel::from_cluster(&cluster, &config);
        let mut rng = Pcg64::seed_from_u64(config.seed);
        let result = resolved.optimize(&model, &mut rng);
        let placed: usize = result.pms.iter().map(|pm| pm.vms.len()).sum();
        assert_eq!(placed, 2, "{} lost a VM", algorithm);
    }
}

#[test]
// Option strings override config fields per algorithm.
fn algorithm_options_override_config() {
    let mut config = ConsolidationConfig::new();
    config.algorithm = "Genetic[iterations=5,mutation_probability=0.5]".to_string();
    // resolution succeeds and runs with the overridden parameters
    let resolved = consolidation_algorithm_resolver(&config);
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_vm(101, ResourceVector::new(5., 1000., 50), 1);
    let model = InfrastructureModel::from_cluster(&cluster, &config);
    let mut rng = Pcg64::seed_from_u64(1);
    let result = resolved.optimize(&model, &mut rng);
    assert_eq!(result.vms.len(), 1);
}

#[test]
#[should_panic]
fn unknown_algorithm_is_fatal() {
    let mut config = ConsolidationConfig::new();
    config.algorithm = "SimulatedAnnealing".to_string();
    consolidation_algorithm_resolver(&config);
}

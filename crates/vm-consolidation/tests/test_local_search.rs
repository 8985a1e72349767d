use vm_consolidation::core::cluster::PowerState;
use vm_consolidation::core::config::ConsolidationConfig;
use vm_consolidation::core::local_search::repair;
use vm_consolidation::core::model::{InfrastructureModel, PmLoadClass};
use vm_consolidation::core::resources::ResourceVector;
use vm_consolidation::extensions::simulated_cluster::SimulatedCluster;

fn pm_capacity() -> ResourceVector {
    ResourceVector::new(10., 1000., 100)
}

fn test_config(lower: f64, upper: f64) -> ConsolidationConfig {
    let mut config = ConsolidationConfig::new();
    config.lower_threshold = lower;
    config.upper_threshold = upper;
    config
}

#[test]
// One PM at 90% with 4 equal VMs and an empty PM nearby: repair must move at
// least one VM off and end below the upper threshold.
fn repair_relieves_overloaded_pm() {
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_pm(2, pm_capacity(), PowerState::On);
    for vm in 101..105 {
        cluster.add_vm(vm, ResourceVector::new(2.25, 1000., 10), 1);
    }
    let mut model = InfrastructureModel::from_cluster(&cluster, &test_config(0.2, 0.75));
    assert_eq!(model.pms[0].load_class, PmLoadClass::OverallocatedRunning);

    repair(&mut model);

    assert!(!model.pms[0].load_class.is_overallocated());
    let fitness = model.evaluate();
    assert!(fitness.migrations >= 1);
    assert_eq!(fitness.total_overload, 0.);
    assert!(model.pms[0].consumed.total_processing() <= 0.75 * 10000.);
}

#[test]
// Underallocated PMs are emptied entirely and their VMs packed onto the most
// loaded PM that accepts them.
fn repair_drains_underallocated_pm() {
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_pm(2, pm_capacity(), PowerState::On);
    cluster.add_vm(101, ResourceVector::new(5., 1000., 40), 1);
    cluster.add_vm(102, ResourceVector::new(2., 1000., 10), 2);
    let mut model = InfrastructureModel::from_cluster(&cluster, &test_config(0.3, 0.75));
    assert_eq!(model.pms[1].load_class, PmLoadClass::UnderallocatedRunning);

    repair(&mut model);

    let fitness = model.evaluate();
    assert_eq!(fitness.active_pms, 1);
    assert_eq!(fitness.migrations, 1);
    assert_eq!(model.pms[1].vms.len(), 0);
    assert_eq!(model.pms[0].vms.len(), 2);
}

#[test]
// With nowhere to go the evictee returns to its initial host, and the PM is
// marked unchangeable after two failed passes instead of looping forever.
fn repair_falls_back_to_initial_host() {
    let mut cluster = SimulatedCluster::new();
    cluster.add_pm(1, pm_capacity(), PowerState::On);
    cluster.add_pm(2, pm_capacity(), PowerState::On);
    cluster.add_vm(101, ResourceVector::new(8., 1000., 80), 1);
    cluster.add_vm(102, ResourceVector::new(7., 1000., 70), 2);
    let mut model = InfrastructureModel::from_cluster(&cluster, &test_config(0.2, 0.75));
    assert_eq!(model.pms[0].load_class, PmLoadClass::OverallocatedRunning);

    repair(&mut model);

    // every VM is still placed
    assert_eq!(model.pms[0].vms.len() + model.pms[1].vms.len(), 2);
    assert_eq!(model.pms[0].load_class, PmLoadClass::UnchangeableOverallocated);
    assert_eq!(model.evaluate().migrations, 0);
}

#[test]
// Repeated repair terminates and leaves no changeable PM overallocated.
fn repair_converges() {
    let mut cluster = SimulatedCluster::new();
    for pm in 1..=4 {
        cluster.add_pm(pm, pm_capacity(), PowerState::On);
    }
    cluster.add_vm(101, ResourceVector::new(4., 1000., 35), 1);
    cluster.add_vm(102, ResourceVector::new(4., 1000., 30), 1);
    cluster.add_vm(103, ResourceVector::new(1., 1000., 10), 2);
    cluster.add_vm(104, ResourceVector::new(2., 1000., 15), 3);
    cluster.add_vm(105, ResourceVector::new(3., 1000., 20), 4);
    let mut model = InfrastructureModel::from_cluster(&cluster, &test_config(0.3, 0.75));

    repair(&mut model);
    repair(&mut model);

    for pm in model.pms.iter() {
        assert_ne!(pm.load_class, PmLoadClass::OverallocatedRunning);
    }
    let consumed: f64 = model.pms.iter().map(|pm| pm.consumed.total_processing()).sum();
    assert!((consumed - 14000.).abs() < 1e-9);
}

//! In-memory snapshot of the cluster's VM-to-PM mapping.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::cluster::{Cluster, PowerState};
use crate::core::config::ConsolidationConfig;
use crate::core::fitness::Fitness;
use crate::core::resources::ResourceVector;

/// Number of failed repair attempts after which a PM is marked unchangeable
/// for the rest of the consolidation cycle.
const MAX_FAILED_REPAIRS: u8 = 2;

/// Load classification of a PM relative to its thresholds.
///
/// `Unchangeable*` marks a PM whose repair failed twice in a row within the
/// current cycle; such PMs are skipped by further repair passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PmLoadClass {
    EmptyOff,
    EmptyRunning,
    NormalRunning,
    UnderallocatedRunning,
    OverallocatedRunning,
    UnchangeableOverallocated,
    UnchangeableUnderallocated,
}

impl PmLoadClass {
    pub fn is_overallocated(&self) -> bool {
        matches!(
            self,
            PmLoadClass::OverallocatedRunning | PmLoadClass::UnchangeableOverallocated
        )
    }

    pub fn is_underallocated(&self) -> bool {
        matches!(
            self,
            PmLoadClass::UnderallocatedRunning | PmLoadClass::UnchangeableUnderallocated
        )
    }

    pub fn is_changeable(&self) -> bool {
        !matches!(
            self,
            PmLoadClass::UnchangeableOverallocated | PmLoadClass::UnchangeableUnderallocated
        )
    }
}

/// Snapshot-local view of a VM: identity, allocation and current host.
///
/// `initial_host` is the PM the VM occupied when the snapshot was built; it
/// never changes and is the basis for counting migrations.
#[derive(Clone, Debug)]
pub struct VmRecord {
    pub id: u32,
    pub allocated: ResourceVector,
    pub host: usize,
    pub initial_host: usize,
}

/// Snapshot-local view of a PM: capacity, consumption and hosted VMs.
#[derive(Clone, Debug)]
pub struct PmRecord {
    pub id: u32,
    pub total: ResourceVector,
    pub consumed: ResourceVector,
    pub lower_threshold: f64,
    pub upper_threshold: f64,
    pub vms: BTreeSet<usize>,
    pub powered_on: bool,
    pub load_class: PmLoadClass,
    pub failed_repairs: u8,
}

impl PmRecord {
    /// Whether adding `extra` would push the PM above its upper threshold.
    pub fn would_overallocate(&self, extra: &ResourceVector) -> bool {
        self.consumed.add(extra).exceeds_share(&self.total, self.upper_threshold)
    }

    /// Processing load fraction, used to order PMs for best-fit packing.
    pub fn load(&self) -> f64 {
        let total = self.total.total_processing();
        if total == 0. {
            return 0.;
        }
        self.consumed.total_processing() / total
    }
}

/// Complete, self-consistent mapping of VM records to PM records.
///
/// Built once per consolidation cycle from the live cluster; all mutation is
/// local to the snapshot and never touches the cluster. Records are addressed
/// by stable vector indices, while VM/PM identity (`id`) is preserved across
/// clones for cross-snapshot comparison.
#[derive(Clone, Debug, Default)]
pub struct InfrastructureModel {
    pub pms: Vec<PmRecord>,
    pub vms: Vec<VmRecord>,
}

impl InfrastructureModel {
    /// Builds a snapshot from the live cluster. This is the only place where
    /// real PM/VM capacity and current placement are read.
    pub fn from_cluster(cluster: &dyn Cluster, config: &ConsolidationConfig) -> Self {
        let mut model = InfrastructureModel::default();
        for pm_id in cluster.pm_ids() {
            let hosted = cluster.pm_vms(pm_id);
            if config.skip_empty_pms && hosted.is_empty() {
                continue;
            }
            let pm_idx = model.pms.len();
            model.pms.push(PmRecord {
                id: pm_id,
                total: cluster.pm_capacity(pm_id),
                consumed: ResourceVector::zero(),
                lower_threshold: config.lower_threshold,
                upper_threshold: config.upper_threshold,
                vms: BTreeSet::new(),
                powered_on: cluster.pm_power_state(pm_id) == PowerState::On,
                load_class: PmLoadClass::EmptyOff,
                failed_repairs: 0,
            });
            for vm_id in hosted {
                if let Some(allocated) = cluster.vm_allocation(vm_id) {
                    let vm_idx = model.vms.len();
                    model.vms.push(VmRecord {
                        id: vm_id,
                        allocated,
                        host: pm_idx,
                        initial_host: pm_idx,
                    });
                    model.pms[pm_idx].vms.insert(vm_idx);
                    model.pms[pm_idx].consumed = model.pms[pm_idx].consumed.add(&allocated);
                }
            }
            model.reclassify(pm_idx);
        }
        model
    }

    /// Recomputes the load class of the specified PM.
    /// Unchangeable marks stick for the rest of the cycle.
    pub fn reclassify(&mut self, pm: usize) {
        let record = &mut self.pms[pm];
        if !record.load_class.is_changeable() {
            return;
        }
        record.load_class = if record.vms.is_empty() {
            if record.powered_on {
                PmLoadClass::EmptyRunning
            } else {
                PmLoadClass::EmptyOff
            }
        } else if record.consumed.exceeds_share(&record.total, record.upper_threshold) {
            PmLoadClass::OverallocatedRunning
        } else if record.consumed.below_share(&record.total, record.lower_threshold) {
            PmLoadClass::UnderallocatedRunning
        } else {
            PmLoadClass::NormalRunning
        };
    }

    /// Places the VM on the PM and updates consumption and load class.
    /// A powered-off PM receiving a VM is powered on within the snapshot.
    pub fn add_vm(&mut self, pm: usize, vm: usize) {
        let allocated = self.vms[vm].allocated;
        self.vms[vm].host = pm;
        let record = &mut self.pms[pm];
        record.vms.insert(vm);
        record.consumed = record.consumed.add(&allocated);
        record.powered_on = true;
        self.reclassify(pm);
    }

    /// Removes the VM from the PM and updates consumption and load class.
    pub fn remove_vm(&mut self, pm: usize, vm: usize) {
        let allocated = self.vms[vm].allocated;
        let record = &mut self.pms[pm];
        record.vms.remove(&vm);
        record.consumed = record.consumed.subtract(&allocated);
        self.reclassify(pm);
    }

    /// Moves the VM from its current host to the target PM.
    pub fn migrate_vm(&mut self, vm: usize, target: usize) {
        let source = self.vms[vm].host;
        if source == target {
            return;
        }
        self.remove_vm(source, vm);
        self.add_vm(target, vm);
    }

    /// Speculatively checks whether the PM can accept the VM without becoming
    /// overallocated. The trial never commits: the snapshot is left unchanged.
    pub fn is_migration_possible(&self, pm: usize, vm: usize) -> bool {
        if !self.pms[pm].load_class.is_changeable() {
            return false;
        }
        !self.pms[pm].would_overallocate(&self.vms[vm].allocated)
    }

    /// Counts a failed repair attempt on the PM; after two consecutive
    /// failures the PM is marked unchangeable for the rest of the cycle.
    pub fn record_failed_repair(&mut self, pm: usize) {
        self.pms[pm].failed_repairs += 1;
        if self.pms[pm].failed_repairs >= MAX_FAILED_REPAIRS {
            self.mark_unchangeable(pm);
        }
    }

    /// Excludes the PM from further repair attempts within this cycle.
    pub fn mark_unchangeable(&mut self, pm: usize) {
        let record = &mut self.pms[pm];
        if record.load_class == PmLoadClass::OverallocatedRunning {
            record.load_class = PmLoadClass::UnchangeableOverallocated;
        } else if record.load_class == PmLoadClass::UnderallocatedRunning {
            record.load_class = PmLoadClass::UnchangeableUnderallocated;
        }
    }

    /// Clears a PM's failed repair counter once it reaches a normal state.
    pub fn reset_failed_repairs(&mut self, pm: usize) {
        self.pms[pm].failed_repairs = 0;
    }

    /// Current VM-to-PM assignment as a vector of PM indices, one per VM.
    pub fn mapping(&self) -> Vec<usize> {
        self.vms.iter().map(|vm| vm.host).collect()
    }

    /// Rebuilds the snapshot state from the given assignment. PMs left with no
    /// VMs are powered off, PMs receiving VMs are powered on; unchangeable
    /// marks and repair counters are cleared.
    pub fn apply_mapping(&mut self, mapping: &[usize]) {
        for pm in self.pms.iter_mut() {
            pm.vms.clear();
            pm.consumed = ResourceVector::zero();
            pm.load_class = PmLoadClass::EmptyOff;
            pm.failed_repairs = 0;
        }
        for (vm_idx, &pm_idx) in mapping.iter().enumerate() {
            self.vms[vm_idx].host = pm_idx;
            let allocated = self.vms[vm_idx].allocated;
            let record = &mut self.pms[pm_idx];
            record.vms.insert(vm_idx);
            record.consumed = record.consumed.add(&allocated);
        }
        for pm_idx in 0..self.pms.len() {
            self.pms[pm_idx].powered_on = !self.pms[pm_idx].vms.is_empty();
            self.reclassify(pm_idx);
        }
    }

    /// Evaluates the multi-objective fitness of the snapshot.
    pub fn evaluate(&self) -> Fitness {
        let mut total_overload = 0.;
        let mut active_pms = 0;
        for pm in self.pms.iter() {
            if !pm.powered_on {
                continue;
            }
            active_pms += 1;
            let processing_limit = pm.upper_threshold * pm.total.total_processing();
            if processing_limit > 0. && pm.consumed.total_processing() > processing_limit {
                total_overload += pm.consumed.total_processing() / processing_limit - 1.;
            }
            let memory_limit = pm.upper_threshold * pm.total.memory as f64;
            if memory_limit > 0. && pm.consumed.memory as f64 > memory_limit {
                total_overload += pm.consumed.memory as f64 / memory_limit - 1.;
            }
        }
        let migrations = self
            .vms
            .iter()
            .filter(|vm| vm.host != vm.initial_host)
            .count() as u32;
        Fitness::new(total_overload, active_pms, migrations)
    }

    /// Returns the index of the PM with the given cluster ID.
    pub fn pm_index(&self, id: u32) -> Option<usize> {
        self.pms.iter().position(|pm| pm.id == id)
    }
}

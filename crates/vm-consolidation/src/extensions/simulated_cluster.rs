//! In-memory cluster used by tests and experiments.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::core::cluster::{Cluster, ClusterEvent, PowerState, VmStatus};
use crate::core::resources::ResourceVector;

/// A command issued to the cluster and not yet completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Migrate { vm: u32, target: u32 },
    PowerOn { pm: u32 },
    PowerOff { pm: u32 },
}

#[derive(Clone, Debug)]
struct PmEntry {
    capacity: ResourceVector,
    power: PowerState,
    vms: BTreeSet<u32>,
}

#[derive(Clone, Debug)]
struct VmEntry {
    allocated: ResourceVector,
    status: VmStatus,
    host: Option<u32>,
}

/// In-memory implementation of [`Cluster`].
///
/// Commands are queued instead of applied: the caller decides when (and in
/// which order) each command completes, which makes out-of-order confirmation
/// and stale-precondition scenarios straightforward to reproduce. Completions
/// append state-change notifications to an event queue drained by the caller.
#[derive(Clone, Debug, Default)]
pub struct SimulatedCluster {
    pms: BTreeMap<u32, PmEntry>,
    vms: BTreeMap<u32, VmEntry>,
    pending: VecDeque<Command>,
    events: VecDeque<ClusterEvent>,
}

impl SimulatedCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a PM with the given capacity and power state.
    pub fn add_pm(&mut self, id: u32, capacity: ResourceVector, power: PowerState) {
        self.pms.insert(
            id,
            PmEntry {
                capacity,
                power,
                vms: BTreeSet::new(),
            },
        );
    }

    /// Adds a running VM on the given powered-on PM.
    pub fn add_vm(&mut self, id: u32, allocated: ResourceVector, host: u32) {
        self.pms.get_mut(&host).unwrap_or_else(|| panic!("Unknown PM {}", host)).vms.insert(id);
        self.vms.insert(
            id,
            VmEntry {
                allocated,
                status: VmStatus::Running,
                host: Some(host),
            },
        );
    }

    /// Removes a VM, e.g. because its workload finished.
    pub fn remove_vm(&mut self, id: u32) {
        if let Some(entry) = self.vms.remove(&id) {
            if let Some(host) = entry.host {
                if let Some(pm) = self.pms.get_mut(&host) {
                    pm.vms.remove(&id);
                }
            }
        }
    }

    /// Commands issued and not yet completed, in issue order.
    pub fn pending_commands(&self) -> Vec<Command> {
        self.pending.iter().copied().collect()
    }

    /// Completes the oldest pending command. Returns false when none is left.
    pub fn complete_next_command(&mut self) -> bool {
        match self.pending.pop_front() {
            Some(command) => {
                self.apply(command);
                true
            }
            None => false,
        }
    }

    /// Completes the given pending command out of order.
    pub fn complete_command(&mut self, command: Command) -> bool {
        match self.pending.iter().position(|c| *c == command) {
            Some(pos) => {
                self.pending.remove(pos);
                self.apply(command);
                true
            }
            None => false,
        }
    }

    /// Completes every pending command in issue order.
    pub fn complete_all_commands(&mut self) {
        while self.complete_next_command() {}
    }

    /// Takes the next queued state-change notification.
    pub fn pop_event(&mut self) -> Option<ClusterEvent> {
        self.events.pop_front()
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Migrate { vm, target } => {
                let Some(entry) = self.vms.get_mut(&vm) else {
                    return;
                };
                let old_host = entry.host;
                entry.host = Some(target);
                entry.status = VmStatus::Running;
                if let Some(old_host) = old_host {
                    if let Some(pm) = self.pms.get_mut(&old_host) {
                        pm.vms.remove(&vm);
                    }
                }
                if let Some(pm) = self.pms.get_mut(&target) {
                    pm.vms.insert(vm);
                }
                self.events.push_back(ClusterEvent::VmStatusChanged {
                    vm,
                    old: VmStatus::Migrating,
                    new: VmStatus::Running,
                });
            }
            Command::PowerOn { pm } => {
                if let Some(entry) = self.pms.get_mut(&pm) {
                    entry.power = PowerState::On;
                }
                self.events.push_back(ClusterEvent::PmStateChanged {
                    pm,
                    old: PowerState::Off,
                    new: PowerState::On,
                });
            }
            Command::PowerOff { pm } => {
                if let Some(entry) = self.pms.get_mut(&pm) {
                    entry.power = PowerState::Off;
                }
                self.events.push_back(ClusterEvent::PmStateChanged {
                    pm,
                    old: PowerState::On,
                    new: PowerState::Off,
                });
            }
        }
    }
}

impl Cluster for SimulatedCluster {
    fn pm_ids(&self) -> Vec<u32> {
        self.pms.keys().copied().collect()
    }

    fn pm_capacity(&self, pm: u32) -> ResourceVector {
        self.pms[&pm].capacity
    }

    fn pm_free_capacity(&self, pm: u32) -> ResourceVector {
        let entry = &self.pms[&pm];
        let mut consumed = ResourceVector::zero();
        for vm in entry.vms.iter() {
            consumed = consumed.add(&self.vms[vm].allocated);
        }
        entry.capacity.subtract(&consumed)
    }

    fn pm_power_state(&self, pm: u32) -> PowerState {
        self.pms[&pm].power
    }

    fn pm_vms(&self, pm: u32) -> Vec<u32> {
        self.pms[&pm].vms.iter().copied().collect()
    }

    fn vm_allocation(&self, vm: u32) -> Option<ResourceVector> {
        self.vms.get(&vm).map(|entry| entry.allocated)
    }

    fn vm_status(&self, vm: u32) -> Option<VmStatus> {
        self.vms.get(&vm).map(|entry| entry.status)
    }

    fn vm_host(&self, vm: u32) -> Option<u32> {
        self.vms.get(&vm).and_then(|entry| entry.host)
    }

    fn migrate_vm(&mut self, vm: u32, target: u32) {
        if let Some(entry) = self.vms.get_mut(&vm) {
            let old = entry.status;
            entry.status = VmStatus::Migrating;
            self.events.push_back(ClusterEvent::VmStatusChanged {
                vm,
                old,
                new: VmStatus::Migrating,
            });
        }
        self.pending.push_back(Command::Migrate { vm, target });
    }

    fn power_on(&mut self, pm: u32) {
        self.pending.push_back(Command::PowerOn { pm });
    }

    fn power_off(&mut self, pm: u32) {
        self.pending.push_back(Command::PowerOff { pm });
    }
}

//! Event-driven execution of a compiled action graph.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::core::action_graph::{ActionGraph, ActionKind};
use crate::core::cluster::{Cluster, ClusterEvent, PowerState, VmStatus};

/// Drives a compiled action graph against the live cluster.
///
/// Nodes without predecessors execute immediately; each execution issues one
/// fire-and-forget command and watches the affected entity. When the cluster
/// confirms the state change, the node is removed from the graph and every
/// successor whose predecessor set drained executes in turn.
///
/// An action whose preconditions turned stale by execution time (capacity
/// consumed elsewhere, VM gone, PM already in the requested state) completes
/// as a logged no-op so the graph still drains. Nothing is retried and
/// nothing times out: a command that is never confirmed leaves its dependents
/// blocked.
pub struct PlanExecutor {
    graph: ActionGraph,
    watched_vms: HashMap<u32, usize>,
    watched_pms: HashMap<u32, usize>,
}

impl PlanExecutor {
    pub fn new(graph: ActionGraph) -> Self {
        Self {
            graph,
            watched_vms: HashMap::new(),
            watched_pms: HashMap::new(),
        }
    }

    /// Executes every initially unblocked action.
    pub fn start(&mut self, cluster: &mut dyn Cluster) {
        let ready = self.graph.ready_nodes();
        self.execute_all(ready, cluster);
    }

    /// Processes one state-change notification from the cluster. Unrelated
    /// events are ignored.
    pub fn on_event(&mut self, event: &ClusterEvent, cluster: &mut dyn Cluster) {
        let confirmed = match *event {
            ClusterEvent::VmStatusChanged {
                vm,
                new: VmStatus::Running,
                ..
            } => self.watched_vms.remove(&vm),
            ClusterEvent::PmStateChanged { pm, new, .. } => {
                let expected = match self.watched_pms.get(&pm).map(|&idx| self.graph.kind(idx)) {
                    Some(ActionKind::Start { .. }) => new == PowerState::On,
                    Some(ActionKind::Shutdown { .. }) => new == PowerState::Off,
                    _ => false,
                };
                if expected {
                    self.watched_pms.remove(&pm)
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(idx) = confirmed {
            info!("confirmed: {}", self.graph.kind(idx));
            let unblocked = self.graph.complete(idx);
            self.execute_all(unblocked, cluster);
        }
    }

    /// Whether every action has finished.
    pub fn is_drained(&self) -> bool {
        self.graph.is_drained()
    }

    pub fn graph(&self) -> &ActionGraph {
        &self.graph
    }

    fn execute_all(&mut self, ready: Vec<usize>, cluster: &mut dyn Cluster) {
        let mut queue = ready;
        while let Some(idx) = queue.pop() {
            let Some(node) = self.graph.node(idx) else {
                continue;
            };
            let kind = node.kind;
            self.graph.mark_executing(idx);
            debug!("executing: {}", kind);
            match kind {
                ActionKind::Migration { vm, source, target } => {
                    if self.migration_feasible(vm, source, target, cluster) {
                        cluster.migrate_vm(vm, target);
                        self.watched_vms.insert(vm, idx);
                    } else {
                        warn!("skipping migration of VM {} to PM {}: stale preconditions", vm, target);
                        queue.extend(self.graph.complete(idx));
                    }
                }
                ActionKind::Start { pm } => {
                    if cluster.pm_power_state(pm) == PowerState::On {
                        debug!("PM {} is already on", pm);
                        queue.extend(self.graph.complete(idx));
                    } else {
                        cluster.power_on(pm);
                        self.watched_pms.insert(pm, idx);
                    }
                }
                ActionKind::Shutdown { pm } => {
                    if cluster.pm_power_state(pm) == PowerState::Off {
                        debug!("PM {} is already off", pm);
                        queue.extend(self.graph.complete(idx));
                    } else if !cluster.pm_vms(pm).is_empty() {
                        warn!("skipping shutdown of PM {}: it still hosts VMs", pm);
                        queue.extend(self.graph.complete(idx));
                    } else {
                        cluster.power_off(pm);
                        self.watched_pms.insert(pm, idx);
                    }
                }
            }
        }
    }

    fn migration_feasible(&self, vm: u32, source: u32, target: u32, cluster: &dyn Cluster) -> bool {
        if cluster.vm_status(vm) != Some(VmStatus::Running) {
            return false;
        }
        if cluster.vm_host(vm) != Some(source) {
            return false;
        }
        if cluster.pm_power_state(target) != PowerState::On {
            return false;
        }
        // same acceptance test as the planner: total processing and memory
        // against the target's free capacity, core counts don't gate placement
        match cluster.vm_allocation(vm) {
            Some(allocated) => !allocated.exceeds_share(&cluster.pm_free_capacity(target), 1.),
            None => false,
        }
    }
}

//! Dependency-ordered graph of cluster operations.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

use indexmap::IndexSet;
use log::warn;
use serde::Serialize;

use crate::core::cluster::{Cluster, PowerState};
use crate::core::model::InfrastructureModel;

/// Cluster operation carried by a graph node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    Start { pm: u32 },
    Migration { vm: u32, source: u32, target: u32 },
    Shutdown { pm: u32 },
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ActionKind::Start { pm } => write!(f, "start PM {}", pm),
            ActionKind::Migration { vm, source, target } => {
                write!(f, "migrate VM {} from PM {} to PM {}", vm, source, target)
            }
            ActionKind::Shutdown { pm } => write!(f, "shutdown PM {}", pm),
        }
    }
}

/// Lifecycle of a node. Nodes are never re-executed; a finished node is
/// removed from the graph entirely instead of lingering as `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ActionState {
    Pending,
    Ready,
    Executing,
    Done,
}

/// A single action with its precedence edges, stored as index sets into the
/// graph arena so that removal is an O(1) set erase on the neighbors.
#[derive(Clone, Debug)]
pub struct ActionNode {
    pub kind: ActionKind,
    pub state: ActionState,
    pub preds: IndexSet<usize>,
    pub succs: IndexSet<usize>,
}

/// Inconsistency between the winning snapshot and the live cluster detected
/// at plan compilation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanError {
    UnknownVm(u32),
    UnknownPm(u32),
}

impl Display for PlanError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PlanError::UnknownVm(vm) => write!(f, "VM {} is not present in the live cluster", vm),
            PlanError::UnknownPm(pm) => write!(f, "PM {} is not present in the live cluster", pm),
        }
    }
}

impl std::error::Error for PlanError {}

/// Arena of action nodes addressed by stable integer index.
#[derive(Clone, Debug, Default)]
pub struct ActionGraph {
    nodes: Vec<Option<ActionNode>>,
    live: usize,
}

impl ActionGraph {
    /// Compiles the delta between the winning snapshot and the live cluster
    /// into an action graph.
    ///
    /// A MIGRATION is emitted for each VM whose assigned PM changed, a START
    /// for each powered-off PM that receives a migration, and a SHUTDOWN for
    /// each PM left without VMs that is currently on. Precedence edges order
    /// a START before the migrations into its PM, migrations out of a PM
    /// before migrations into it (no transient double-booking) and all
    /// migrations off a PM before its SHUTDOWN.
    pub fn compile(winner: &InfrastructureModel, cluster: &dyn Cluster) -> Result<Self, PlanError> {
        let known_pms: BTreeSet<u32> = cluster.pm_ids().into_iter().collect();
        let mut graph = ActionGraph::default();

        // migrations from the snapshot delta
        let mut migrations = Vec::new();
        for vm in winner.vms.iter() {
            let target = &winner.pms[vm.host];
            if !known_pms.contains(&target.id) {
                return Err(PlanError::UnknownPm(target.id));
            }
            let live_host = cluster.vm_host(vm.id).ok_or(PlanError::UnknownVm(vm.id))?;
            if live_host != target.id {
                let idx = graph.add_node(ActionKind::Migration {
                    vm: vm.id,
                    source: live_host,
                    target: target.id,
                });
                migrations.push(idx);
            }
        }

        // starts for powered-off migration targets
        let mut starts: HashMap<u32, usize> = HashMap::new();
        for &m in migrations.iter() {
            if let ActionKind::Migration { target, .. } = graph.kind(m) {
                if cluster.pm_power_state(target) == PowerState::Off && !starts.contains_key(&target) {
                    let idx = graph.add_node(ActionKind::Start { pm: target });
                    starts.insert(target, idx);
                }
            }
        }

        // shutdowns for emptied PMs
        let mut shutdowns: HashMap<u32, usize> = HashMap::new();
        for pm in winner.pms.iter() {
            if pm.vms.is_empty() && cluster.pm_power_state(pm.id) == PowerState::On {
                let idx = graph.add_node(ActionKind::Shutdown { pm: pm.id });
                shutdowns.insert(pm.id, idx);
            }
        }

        // precedence edges
        for &m in migrations.iter() {
            let ActionKind::Migration { source, target, .. } = graph.kind(m) else {
                continue;
            };
            if let Some(&start) = starts.get(&target) {
                graph.add_edge(start, m);
            }
            for &other in migrations.iter() {
                if other == m {
                    continue;
                }
                if let ActionKind::Migration { source: other_source, .. } = graph.kind(other) {
                    if other_source == target {
                        graph.add_edge(other, m);
                    }
                }
            }
            if let Some(&shutdown) = shutdowns.get(&source) {
                graph.add_edge(m, shutdown);
            }
        }

        graph.drop_cycles();
        for node in graph.nodes.iter_mut().flatten() {
            node.state = if node.preds.is_empty() {
                ActionState::Ready
            } else {
                ActionState::Pending
            };
        }
        Ok(graph)
    }

    fn add_node(&mut self, kind: ActionKind) -> usize {
        self.nodes.push(Some(ActionNode {
            kind,
            state: ActionState::Pending,
            preds: IndexSet::new(),
            succs: IndexSet::new(),
        }));
        self.live += 1;
        self.nodes.len() - 1
    }

    fn add_edge(&mut self, pred: usize, succ: usize) {
        if let Some(node) = self.nodes[pred].as_mut() {
            node.succs.insert(succ);
        }
        if let Some(node) = self.nodes[succ].as_mut() {
            node.preds.insert(pred);
        }
    }

    /// Kind of the specified node. Panics on a removed node.
    pub fn kind(&self, idx: usize) -> ActionKind {
        self.nodes[idx].as_ref().unwrap().kind
    }

    pub fn node(&self, idx: usize) -> Option<&ActionNode> {
        self.nodes.get(idx).and_then(|n| n.as_ref())
    }

    /// Marks the node as taken up for execution.
    pub fn mark_executing(&mut self, idx: usize) {
        if let Some(node) = self.nodes[idx].as_mut() {
            node.state = ActionState::Executing;
        }
    }

    /// Indices of all nodes currently ready to execute.
    pub fn ready_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| match node {
                Some(node) if node.state == ActionState::Ready => Some(idx),
                _ => None,
            })
            .collect()
    }

    /// Indices of all live nodes.
    pub fn live_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| node.as_ref().map(|_| idx))
            .collect()
    }

    pub fn is_drained(&self) -> bool {
        self.live == 0
    }

    /// Completes the node: removes it from the arena and from all neighbors'
    /// edge sets, returning the successors that became ready.
    pub fn complete(&mut self, idx: usize) -> Vec<usize> {
        let Some(node) = self.nodes[idx].take() else {
            return Vec::new();
        };
        self.live -= 1;
        for &pred in node.preds.iter() {
            if let Some(pred_node) = self.nodes[pred].as_mut() {
                pred_node.succs.swap_remove(&idx);
            }
        }
        let mut unblocked = Vec::new();
        for &succ in node.succs.iter() {
            if let Some(succ_node) = self.nodes[succ].as_mut() {
                succ_node.preds.swap_remove(&idx);
                if succ_node.preds.is_empty() && succ_node.state == ActionState::Pending {
                    succ_node.state = ActionState::Ready;
                    unblocked.push(succ);
                }
            }
        }
        unblocked
    }

    /// Detects precedence cycles (two PMs migrating VMs to each other) and
    /// drops the trapped nodes from the plan instead of deadlocking. Their
    /// dependents run later and self-resolve as no-ops where preconditions
    /// turn stale.
    fn drop_cycles(&mut self) {
        let forward = self.kahn_reachable(false);
        let reverse = self.kahn_reachable(true);
        let trapped: Vec<usize> = self
            .live_nodes()
            .into_iter()
            .filter(|idx| !forward.contains(idx) && !reverse.contains(idx))
            .collect();
        for idx in trapped {
            if let Some(node) = self.nodes[idx].as_ref() {
                warn!("dropping action trapped in a precedence cycle: {}", node.kind);
            }
            self.complete(idx);
        }
    }

    /// Nodes reachable by repeatedly peeling zero-in-degree (or, reversed,
    /// zero-out-degree) nodes; nodes on a cycle are never peeled either way.
    fn kahn_reachable(&self, reversed: bool) -> BTreeSet<usize> {
        let mut degree: HashMap<usize, usize> = HashMap::new();
        for idx in self.live_nodes() {
            let node = self.nodes[idx].as_ref().unwrap();
            let edges = if reversed { &node.succs } else { &node.preds };
            degree.insert(idx, edges.len());
        }
        let mut queue: Vec<usize> = degree
            .iter()
            .filter_map(|(&idx, &d)| if d == 0 { Some(idx) } else { None })
            .collect();
        let mut processed = BTreeSet::new();
        while let Some(idx) = queue.pop() {
            if !processed.insert(idx) {
                continue;
            }
            let node = self.nodes[idx].as_ref().unwrap();
            let edges = if reversed { &node.preds } else { &node.succs };
            for &next in edges.iter() {
                if let Some(d) = degree.get_mut(&next) {
                    *d = d.saturating_sub(1);
                    if *d == 0 {
                        queue.push(next);
                    }
                }
            }
        }
        processed
    }
}

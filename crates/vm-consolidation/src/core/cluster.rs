//! Interface to the live cluster and its state-change notifications.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::resources::ResourceVector;

/// Power state of a physical machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PowerState {
    On,
    Off,
}

impl Display for PowerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

/// Lifecycle status of a virtual machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    Initializing,
    Running,
    Migrating,
    Finished,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Initializing => write!(f, "initializing"),
            VmStatus::Running => write!(f, "running"),
            VmStatus::Migrating => write!(f, "migrating"),
            VmStatus::Finished => write!(f, "finished"),
        }
    }
}

/// State-change notification delivered by the cluster.
///
/// Completion of issued commands is reported through these events instead of
/// registered callbacks, so the plan executor can be driven by an explicit,
/// testable event stream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum ClusterEvent {
    VmStatusChanged {
        vm: u32,
        old: VmStatus,
        new: VmStatus,
    },
    PmStateChanged {
        pm: u32,
        old: PowerState,
        new: PowerState,
    },
}

/// Access to the live cluster.
///
/// Queries expose the current placement and capacity used to build snapshots
/// and to check action preconditions. Commands are fire-and-forget: they
/// return immediately and the actual state change is confirmed later by a
/// [`ClusterEvent`].
pub trait Cluster {
    /// IDs of all physical machines.
    fn pm_ids(&self) -> Vec<u32>;

    /// Total capacity of the specified PM.
    fn pm_capacity(&self, pm: u32) -> ResourceVector;

    /// Capacity of the specified PM not consumed by hosted VMs.
    fn pm_free_capacity(&self, pm: u32) -> ResourceVector;

    /// Current power state of the specified PM.
    fn pm_power_state(&self, pm: u32) -> PowerState;

    /// IDs of VMs currently hosted on the specified PM.
    fn pm_vms(&self, pm: u32) -> Vec<u32>;

    /// Current resource allocation of the specified VM.
    fn vm_allocation(&self, vm: u32) -> Option<ResourceVector>;

    /// Current lifecycle status of the specified VM.
    fn vm_status(&self, vm: u32) -> Option<VmStatus>;

    /// ID of the PM currently hosting the specified VM.
    fn vm_host(&self, vm: u32) -> Option<u32>;

    /// Starts migrating the specified VM to the target PM.
    fn migrate_vm(&mut self, vm: u32, target: u32);

    /// Starts powering on the specified PM.
    fn power_on(&mut self, pm: u32);

    /// Starts powering off the specified PM.
    fn power_off(&mut self, pm: u32);
}

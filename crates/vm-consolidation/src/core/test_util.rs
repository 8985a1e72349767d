//! Helpers shared by unit tests.

use std::collections::BTreeSet;

use crate::core::model::{InfrastructureModel, PmLoadClass, PmRecord, VmRecord};
use crate::core::resources::ResourceVector;

/// Builds a snapshot of identical powered-on PMs from a per-PM list of VM
/// allocations. PM ids start at 1, VM ids at 101.
pub fn model_from_layout(
    capacity: ResourceVector,
    lower_threshold: f64,
    upper_threshold: f64,
    layout: &[&[ResourceVector]],
) -> InfrastructureModel {
    let mut model = InfrastructureModel::default();
    for (pm_idx, hosted) in layout.iter().enumerate() {
        model.pms.push(PmRecord {
            id: pm_idx as u32 + 1,
            total: capacity,
            consumed: ResourceVector::zero(),
            lower_threshold,
            upper_threshold,
            vms: BTreeSet::new(),
            powered_on: true,
            load_class: PmLoadClass::EmptyRunning,
            failed_repairs: 0,
        });
        for allocated in hosted.iter() {
            let vm_idx = model.vms.len();
            model.vms.push(VmRecord {
                id: vm_idx as u32 + 101,
                allocated: *allocated,
                host: pm_idx,
                initial_host: pm_idx,
            });
            model.pms[pm_idx].vms.insert(vm_idx);
            model.pms[pm_idx].consumed = model.pms[pm_idx].consumed.add(allocated);
        }
        model.reclassify(pm_idx);
    }
    model
}

//! Best-fit-decreasing repair of a snapshot.

use crate::core::model::InfrastructureModel;

/// Repairs an infeasible or wasteful snapshot in place.
///
/// Every overallocated PM ejects its largest VMs until it is within the upper
/// threshold, every underallocated PM ejects all of its VMs (making it a
/// shutdown candidate). The evictees are then re-packed best-fit-decreasing:
/// sorted by descending processing demand, each is placed on the most loaded
/// PM that accepts it without becoming overallocated, falling back to the
/// VM's initial host so that repair never leaves a VM unplaced.
///
/// A PM that is still over- or underallocated after two consecutive passes is
/// marked unchangeable and skipped for the rest of the cycle, which bounds the
/// number of passes.
pub fn repair(model: &mut InfrastructureModel) {
    let max_passes = 2 * model.pms.len() + 1;
    for _ in 0..max_passes {
        let troubled: Vec<usize> = (0..model.pms.len())
            .filter(|&pm| {
                let class = model.pms[pm].load_class;
                class.is_changeable() && (class.is_overallocated() || class.is_underallocated())
            })
            .collect();
        if troubled.is_empty() {
            break;
        }

        let mut evictees = Vec::new();
        for &pm in troubled.iter() {
            if model.pms[pm].load_class.is_overallocated() {
                evictees.extend(evict_until_fits(model, pm));
            } else {
                evictees.extend(evict_all(model, pm));
            }
        }

        evictees.sort_by(|&a, &b| {
            model.vms[b]
                .allocated
                .total_processing()
                .partial_cmp(&model.vms[a].allocated.total_processing())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for vm in evictees {
            let mut candidates: Vec<usize> = (0..model.pms.len()).collect();
            candidates.sort_by(|&a, &b| {
                model.pms[b]
                    .load()
                    .partial_cmp(&model.pms[a].load())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let target = candidates
                .into_iter()
                .find(|&pm| model.is_migration_possible(pm, vm));
            match target {
                Some(pm) => model.add_vm(pm, vm),
                // no PM accepts the VM, return it to its initial host
                None => model.add_vm(model.vms[vm].initial_host, vm),
            }
        }

        for &pm in troubled.iter() {
            let class = model.pms[pm].load_class;
            if class.is_overallocated() || class.is_underallocated() {
                model.record_failed_repair(pm);
            } else {
                model.reset_failed_repairs(pm);
            }
        }
    }
    // emptied PMs are shutdown candidates
    for pm in 0..model.pms.len() {
        if model.pms[pm].powered_on && model.pms[pm].vms.is_empty() {
            model.pms[pm].powered_on = false;
            model.reclassify(pm);
        }
    }
}

/// Ejects the largest VMs first until the PM is no longer overallocated.
fn evict_until_fits(model: &mut InfrastructureModel, pm: usize) -> Vec<usize> {
    let mut evicted = Vec::new();
    while model.pms[pm].load_class.is_overallocated() && !model.pms[pm].vms.is_empty() {
        let largest = model.pms[pm]
            .vms
            .iter()
            .copied()
            .max_by(|&a, &b| {
                model.vms[a]
                    .allocated
                    .total_processing()
                    .partial_cmp(&model.vms[b].allocated.total_processing())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap();
        model.remove_vm(pm, largest);
        evicted.push(largest);
    }
    evicted
}

/// Ejects every VM of the PM, leaving it empty.
fn evict_all(model: &mut InfrastructureModel, pm: usize) -> Vec<usize> {
    let evicted: Vec<usize> = model.pms[pm].vms.iter().copied().collect();
    for &vm in evicted.iter() {
        model.remove_vm(pm, vm);
    }
    evicted
}

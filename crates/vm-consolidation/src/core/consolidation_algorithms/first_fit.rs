//! Deterministic first fit consolidation.

use rand_pcg::Pcg64;

use crate::core::consolidation_algorithm::ConsolidationAlgorithm;
use crate::core::model::InfrastructureModel;

/// Deterministic baseline: while any PM is over- or underallocated, moves one
/// VM at a time to the first PM (in fixed index order) that accepts it without
/// becoming overallocated.
///
/// An overallocated PM ejects its largest VM and may fall back to an empty
/// running PM or power on a fresh one. An underallocated PM only migrates to
/// non-empty running PMs, since handing its VMs to an empty PM cannot reduce
/// the active PM count. A PM whose VMs cannot be moved anywhere is marked
/// unchangeable, which bounds the loop. Empty PMs are powered off at the end.
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }

    /// Moves one VM off the overallocated PM. Targets are scanned in index
    /// order: non-empty running PMs first, then empty running, then off.
    fn relieve_overallocated(&self, model: &mut InfrastructureModel, pm: usize) -> bool {
        let mut hosted: Vec<usize> = model.pms[pm].vms.iter().copied().collect();
        hosted.sort_by(|&a, &b| {
            model.vms[b]
                .allocated
                .total_processing()
                .partial_cmp(&model.vms[a].allocated.total_processing())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for vm in hosted {
            if let Some(target) = self.select_target(model, pm, vm, true) {
                model.migrate_vm(vm, target);
                return true;
            }
        }
        false
    }

    /// Moves one VM off the underallocated PM to a non-empty running PM.
    fn relieve_underallocated(&self, model: &mut InfrastructureModel, pm: usize) -> bool {
        let hosted: Vec<usize> = model.pms[pm].vms.iter().copied().collect();
        for vm in hosted {
            if let Some(target) = self.select_target(model, pm, vm, false) {
                model.migrate_vm(vm, target);
                return true;
            }
        }
        false
    }

    fn select_target(
        &self,
        model: &InfrastructureModel,
        source: usize,
        vm: usize,
        allow_empty: bool,
    ) -> Option<usize> {
        let accepts = |pm: usize| pm != source && model.is_migration_possible(pm, vm);
        let non_empty_running =
            (0..model.pms.len()).find(|&pm| model.pms[pm].powered_on && !model.pms[pm].vms.is_empty() && accepts(pm));
        if non_empty_running.is_some() || !allow_empty {
            return non_empty_running;
        }
        (0..model.pms.len())
            .find(|&pm| model.pms[pm].powered_on && model.pms[pm].vms.is_empty() && accepts(pm))
            .or_else(|| (0..model.pms.len()).find(|&pm| !model.pms[pm].powered_on && accepts(pm)))
    }
}

impl Default for FirstFit {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolidationAlgorithm for FirstFit {
    fn optimize(&self, model: &InfrastructureModel, _rng: &mut Pcg64) -> InfrastructureModel {
        let mut model = model.clone();
        loop {
            let troubled = (0..model.pms.len()).find(|&pm| {
                let class = model.pms[pm].load_class;
                class.is_changeable() && (class.is_overallocated() || class.is_underallocated())
            });
            let Some(pm) = troubled else {
                break;
            };
            let moved = if model.pms[pm].load_class.is_overallocated() {
                self.relieve_overallocated(&mut model, pm)
            } else {
                self.relieve_underallocated(&mut model, pm)
            };
            if !moved {
                model.mark_unchangeable(pm);
            }
        }
        // empty PMs are shutdown candidates
        for pm in 0..model.pms.len() {
            if model.pms[pm].powered_on && model.pms[pm].vms.is_empty() {
                model.pms[pm].powered_on = false;
                model.reclassify(pm);
            }
        }
        model
    }
}

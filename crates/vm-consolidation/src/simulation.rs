//! Driver facade running whole consolidation cycles.

use log::{info, warn};
use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::core::action_graph::{ActionGraph, PlanError};
use crate::core::cluster::{Cluster, ClusterEvent};
use crate::core::config::ConsolidationConfig;
use crate::core::consolidation_algorithm::{consolidation_algorithm_resolver, ConsolidationAlgorithm};
use crate::core::executor::PlanExecutor;
use crate::core::model::InfrastructureModel;

/// Owns the configuration, the resolved algorithm, the seeded random
/// generator shared by the whole cycle and the in-flight plan executor.
///
/// One call to [`run_consolidation_cycle`](Self::run_consolidation_cycle)
/// builds a snapshot from the live cluster, runs the configured search,
/// compiles the winning placement into an action graph and starts executing
/// it. Cluster notifications are fed to
/// [`process_event`](Self::process_event) until the plan drains; calling the
/// cycle again before that is a logged no-op.
pub struct ConsolidationDriver {
    config: ConsolidationConfig,
    algorithm: Box<dyn ConsolidationAlgorithm>,
    rng: Pcg64,
    executor: Option<PlanExecutor>,
}

impl ConsolidationDriver {
    /// Creates a driver. Algorithm resolution and config validation happen
    /// here, so a misconfigured driver fails before touching the cluster.
    pub fn new(config: ConsolidationConfig) -> Self {
        config.validate();
        let algorithm = consolidation_algorithm_resolver(&config);
        let rng = Pcg64::seed_from_u64(config.seed);
        Self {
            config,
            algorithm,
            rng,
            executor: None,
        }
    }

    /// Runs one consolidation cycle against the cluster.
    pub fn run_consolidation_cycle(&mut self, cluster: &mut dyn Cluster) -> Result<(), PlanError> {
        if !self.is_idle() {
            warn!("previous consolidation plan has not drained yet, skipping cycle");
            return Ok(());
        }
        let model = InfrastructureModel::from_cluster(cluster, &self.config);
        let initial_fitness = model.evaluate();
        let winner = self.algorithm.optimize(&model, &mut self.rng);
        info!(
            "consolidation search finished: {} (started from: {})",
            winner.evaluate(),
            initial_fitness
        );

        let graph = ActionGraph::compile(&winner, cluster)?;
        for idx in graph.live_nodes() {
            info!("planned action: {}", graph.kind(idx));
        }
        let mut executor = PlanExecutor::new(graph);
        executor.start(cluster);
        if executor.is_drained() {
            info!("consolidation plan drained");
        } else {
            self.executor = Some(executor);
        }
        Ok(())
    }

    /// Forwards a cluster notification to the in-flight plan, if any.
    pub fn process_event(&mut self, event: &ClusterEvent, cluster: &mut dyn Cluster) {
        if let Some(executor) = self.executor.as_mut() {
            executor.on_event(event, cluster);
            if executor.is_drained() {
                info!("consolidation plan drained");
                self.executor = None;
            }
        }
    }

    /// Whether no plan is currently in flight.
    pub fn is_idle(&self) -> bool {
        self.executor.is_none()
    }

    /// The plan currently being executed.
    pub fn current_plan(&self) -> Option<&PlanExecutor> {
        self.executor.as_ref()
    }
}

pub mod action_graph;
pub mod cluster;
pub mod config;
pub mod consolidation_algorithm;
pub mod consolidation_algorithms;
pub mod executor;
pub mod fitness;
pub mod local_search;
pub mod model;
pub mod resources;

#[cfg(test)]
pub(crate) mod test_util;

pub mod simulated_cluster;

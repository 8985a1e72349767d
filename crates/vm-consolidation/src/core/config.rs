//! Consolidation configuration.

pub mod consolidation_config;
pub mod options;

pub use consolidation_config::ConsolidationConfig;
pub use options::{parse_config_value, parse_options};

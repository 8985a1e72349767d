//! Config utils.

use std::collections::HashMap;

/// Parses config value string, which consists of two parts - name and options.
/// Example: Genetic[mutation_probability=0.1] parts are name Genetic and
/// options string "mutation_probability=0.1".
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.to_string(), Some(r.to_string().replace(']', ""))),
        None => (config_str.to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.to_string(), value.to_string());
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_name_with_options() {
        let (name, options) = parse_config_value("ParticleSwarm[c1=1.5,c2=2.5]");
        assert_eq!(name, "ParticleSwarm");
        let options = parse_options(&options.unwrap());
        assert_eq!(options.get("c1").unwrap(), "1.5");
        assert_eq!(options.get("c2").unwrap(), "2.5");
        assert_eq!(options.get("c3"), None);
    }

    #[test]
    fn parse_bare_name() {
        let (name, options) = parse_config_value("FirstFit");
        assert_eq!(name, "FirstFit");
        assert!(options.is_none());
    }
}

use crate::config::{ConfigError, MrfConfig, TighteningParameters};

#[test]
fn defaults_are_used_for_missing_fields() {
    let config = MrfConfig::from_yaml_str("tightening_budget: 10\n").unwrap();
    assert_eq!(config.tightening, TighteningParameters::default());
    assert_eq!(config.tightening_budget, Some(10));

    let config = MrfConfig::from_yaml_str("tightening:\n  max_full_projection_labels: 3\n").unwrap();
    assert_eq!(config.tightening.max_full_projection_labels, 3);
    assert_eq!(config.tightening.tolerance, 1e-8);
}

#[test]
fn invalid_configs() {
    assert!(matches!(
        MrfConfig::from_yaml_str("tightening:\n  tolerance: -1.0\n"),
        Err(ConfigError::InvalidTolerance(_))
    ));
    assert!(matches!(
        MrfConfig::from_yaml_str("tightening: [1, 2]\n"),
        Err(ConfigError::Yaml(_))
    ));
    assert!(matches!(
        MrfConfig::from_yaml_file("/nonexistent/lpmrf.yaml"),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn config_round_trip() {
    let config = MrfConfig {
        tightening: TighteningParameters {
            tolerance: 0.5,
            max_full_projection_labels: 4,
        },
        tightening_budget: Some(3),
    };
    let text = serde_yaml::to_string(&config).unwrap();
    assert_eq!(MrfConfig::from_yaml_str(&text).unwrap(), config);
}

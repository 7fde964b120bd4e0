use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
/// Errors that could appear while loading a configuration
pub enum ConfigError {
    #[error("Unable to read a configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to parse a configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A tolerance must be finite and non-negative
    #[error("Tolerance {0} must be finite and non-negative")]
    InvalidTolerance(f64),
}

/// Configuration methods result type
pub type ConfigResult<T> = Result<T, ConfigError>;

// ------------------------------------------------------------------------------------------

/// Parameters of cycle searches run by tightening
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TighteningParameters {
    /// Minimal gap (or edge strength) for a candidate to be proposed
    pub tolerance: f64,

    /// Full projection enumerates all label bipartitions of variables with at most
    /// this many labels, larger variables fall back to singleton partitions
    pub max_full_projection_labels: usize,
}

impl Default for TighteningParameters {
    fn default() -> Self {
        TighteningParameters {
            tolerance: 1e-8,
            max_full_projection_labels: 6,
        }
    }
}

/// Configuration of a model run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MrfConfig {
    pub tightening: TighteningParameters,

    /// Number of triplets requested per tightening round
    pub tightening_budget: Option<usize>,
}

impl MrfConfig {
    /// Parses a configuration from a YAML string, absent fields take default values
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::config::MrfConfig;
    ///
    /// let config = MrfConfig::from_yaml_str("tightening:\n  tolerance: 0.01\n").unwrap();
    /// assert_eq!(config.tightening.tolerance, 0.01);
    /// assert_eq!(config.tightening_budget, None);
    /// ```
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: MrfConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    fn validate(&self) -> ConfigResult<()> {
        let tolerance = self.tightening.tolerance;
        if !tolerance.is_finite() || tolerance < 0f64 {
            return Err(ConfigError::InvalidTolerance(tolerance));
        }
        Ok(())
    }
}

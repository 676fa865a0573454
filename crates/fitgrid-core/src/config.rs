//! fitgrid.toml configuration parser and weights file persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_ENERGY_WATTS, Thresholds};
use crate::weights::WeightVector;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub weights: WeightVector,
    pub thresholds: Thresholds,
    pub advisor: Option<AdvisorConfig>,
    pub nodes: Vec<NodeSeed>,
}

/// Connection settings for the optional advisory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub enabled: bool,
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:11434/api/generate".to_string(),
            model: "llama2".to_string(),
            timeout_secs: 30,
        }
    }
}

/// A node registered at startup, before it ever reports telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSeed {
    pub id: String,
    #[serde(default = "default_energy_watts")]
    pub energy_watts: f64,
}

fn default_energy_watts() -> f64 {
    DEFAULT_ENERGY_WATTS
}

impl CoordinatorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: CoordinatorConfig = toml::from_str(content)?;
        config.thresholds.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Advisor settings, if present and enabled.
    pub fn active_advisor(&self) -> Option<&AdvisorConfig> {
        self.advisor.as_ref().filter(|a| a.enabled)
    }
}

/// Load a weights file. `.toml` files are parsed as TOML, anything else as JSON.
///
/// The mapping is validated on the way in; an invalid file is an error and
/// the caller keeps whatever weights it already had.
pub fn load_weights_file(path: &Path) -> anyhow::Result<WeightVector> {
    let content = std::fs::read_to_string(path)?;
    let weights = if is_toml(path) {
        toml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(weights)
}

/// Write weights to a file in the format implied by its extension.
pub fn save_weights_file(path: &Path, weights: &WeightVector) -> anyhow::Result<()> {
    let content = if is_toml(path) {
        toml::to_string_pretty(weights)?
    } else {
        serde_json::to_string_pretty(weights)?
    };
    std::fs::write(path, content)?;
    Ok(())
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = CoordinatorConfig::from_toml_str("").unwrap();
        assert_eq!(config.weights, WeightVector::default());
        assert_eq!(config.thresholds, Thresholds::default());
        assert!(config.advisor.is_none());
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn parses_full_config() {
        let toml_str = r#"
[weights]
cpu_availability = 0.35
ram_availability = 0.30
temperature = 0.15
energy_efficiency = 0.15
historical_performance = 0.05

[thresholds]
temp_max = 80

[advisor]
model = "mistral"
timeout_secs = 5

[[nodes]]
id = "node_1"
energy_watts = 120

[[nodes]]
id = "node_2"
"#;
        let config = CoordinatorConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.weights.cpu_availability, 0.35);
        assert_eq!(config.thresholds.temp_max, 80.0);
        assert_eq!(config.thresholds.ram_critical, 95.0);

        let advisor = config.active_advisor().unwrap();
        assert_eq!(advisor.model, "mistral");
        assert_eq!(advisor.timeout_secs, 5);
        assert_eq!(advisor.url, "http://localhost:11434/api/generate");

        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].energy_watts, 120.0);
        assert_eq!(config.nodes[1].energy_watts, 100.0);
    }

    #[test]
    fn rejects_invalid_weights_section() {
        let toml_str = r#"
[weights]
cpu_availability = 0.9
ram_availability = 0.9
temperature = 0.0
energy_efficiency = 0.0
historical_performance = 0.0
"#;
        assert!(CoordinatorConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let err = CoordinatorConfig::from_toml_str("[thresholds]\ntemp_max = -10\n").unwrap_err();
        assert!(err.to_string().contains("temp_max"));

        let err = CoordinatorConfig::from_toml_str("[thresholds]\nadmission = 1.2\n").unwrap_err();
        assert!(err.to_string().contains("admission"));

        let config = CoordinatorConfig::from_toml_str("[thresholds]\nadmission = 1.0\n").unwrap();
        assert_eq!(config.thresholds.admission, 1.0);
    }

    #[test]
    fn disabled_advisor_is_inactive() {
        let config = CoordinatorConfig::from_toml_str("[advisor]\nenabled = false\n").unwrap();
        assert!(config.advisor.is_some());
        assert!(config.active_advisor().is_none());
    }

    #[test]
    fn weights_file_round_trips_as_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();
        let weights = WeightVector::new(0.35, 0.30, 0.15, 0.15, 0.05).unwrap();

        let json_path = dir.path().join("weights_config.json");
        save_weights_file(&json_path, &weights).unwrap();
        let raw = std::fs::read_to_string(&json_path).unwrap();
        assert!(raw.contains("\"energy_efficiency\""));
        assert_eq!(load_weights_file(&json_path).unwrap(), weights);

        let toml_path = dir.path().join("weights.toml");
        save_weights_file(&toml_path, &weights).unwrap();
        assert_eq!(load_weights_file(&toml_path).unwrap(), weights);
    }

    #[test]
    fn invalid_weights_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights_config.json");
        std::fs::write(&path, r#"{"cpu_availability": 1.0, "ram_availability": 1.0,
            "temperature": 0, "energy_efficiency": 0, "historical_performance": 0}"#)
            .unwrap();
        assert!(load_weights_file(&path).is_err());
    }

    #[test]
    fn missing_weights_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_weights_file(&dir.path().join("nope.json")).is_err());
    }
}

//! Shared types used across fitgrid crates.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Identifier of a worker node (hostname, MAC, or peer address).
pub type NodeId = String;

/// Identifier of a queued task. Monotonic, starts at 1, never reused.
pub type TaskId = u64;

/// Energy rating assumed for nodes that were never explicitly registered.
pub const DEFAULT_ENERGY_WATTS: f64 = 100.0;

/// Latest hardware snapshot pushed by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// CPU utilisation, 0-100.
    pub cpu_percent: f64,
    /// RAM utilisation, 0-100.
    pub ram_percent: f64,
    /// CPU temperature in Celsius. `None` means the sensor is unavailable.
    #[serde(default)]
    pub cpu_temp: Option<f64>,
    #[serde(default)]
    pub cpu_cores: Option<u32>,
    #[serde(default, rename = "ram_total_GB")]
    pub ram_total_gb: Option<f64>,
}

impl Telemetry {
    /// Snapshot with only the fields scoring depends on.
    pub fn new(cpu_percent: f64, ram_percent: f64, cpu_temp: Option<f64>) -> Self {
        Self {
            cpu_percent,
            ram_percent,
            cpu_temp,
            cpu_cores: None,
            ram_total_gb: None,
        }
    }
}

/// Externally supplied hint that shifts scoring priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemLoad {
    /// Favour energy efficiency over raw headroom.
    Low,
    #[default]
    Normal,
    /// Favour CPU headroom and cool nodes.
    High,
}

impl SystemLoad {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemLoad::Low => "low",
            SystemLoad::Normal => "normal",
            SystemLoad::High => "high",
        }
    }
}

impl fmt::Display for SystemLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemLoad {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(SystemLoad::Low),
            "normal" => Ok(SystemLoad::Normal),
            "high" => Ok(SystemLoad::High),
            other => Err(CoreError::InvalidSystemLoad(other.to_string())),
        }
    }
}

/// Safety cutoffs and the admission bar applied to node scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Above this temperature a node scores 0.0.
    pub temp_max: f64,
    /// Above this temperature telemetry is logged as a warning.
    pub temp_warning: f64,
    /// Above this RAM utilisation a node scores 0.0.
    pub ram_critical: f64,
    /// Above this CPU utilisation a node scores 0.0.
    pub cpu_critical: f64,
    /// Nodes scoring below this may not claim work.
    pub admission: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temp_max: 85.0,
            temp_warning: 75.0,
            ram_critical: 95.0,
            cpu_critical: 95.0,
            admission: 0.3,
        }
    }
}

impl Thresholds {
    /// Reject cutoffs that would make scoring meaningless.
    ///
    /// Temperatures must be positive, utilisation cutoffs within (0, 100],
    /// and the admission bar within [0, 1].
    pub fn validate(&self) -> CoreResult<()> {
        let checks: [(&'static str, f64, bool, &'static str); 5] = [
            ("temp_max", self.temp_max, self.temp_max > 0.0, "positive"),
            ("temp_warning", self.temp_warning, self.temp_warning > 0.0, "positive"),
            (
                "ram_critical",
                self.ram_critical,
                self.ram_critical > 0.0 && self.ram_critical <= 100.0,
                "within (0, 100]",
            ),
            (
                "cpu_critical",
                self.cpu_critical,
                self.cpu_critical > 0.0 && self.cpu_critical <= 100.0,
                "within (0, 100]",
            ),
            (
                "admission",
                self.admission,
                (0.0..=1.0).contains(&self.admission),
                "within [0, 1]",
            ),
        ];

        // NaN fails every comparison above.
        for (name, value, ok, expected) in checks {
            if !(ok && value.is_finite()) {
                return Err(CoreError::InvalidThreshold { name, value, expected });
            }
        }
        Ok(())
    }
}

/// Current Unix epoch in whole seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current Unix epoch in fractional seconds.
pub fn epoch_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Round to three decimal places for presentation.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

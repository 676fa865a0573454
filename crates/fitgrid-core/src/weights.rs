//! Five-factor scoring weights.
//!
//! A [`WeightVector`] can only be built through [`WeightVector::new`] or the
//! key-value mapping conversions, all of which enforce the sum-to-one
//! invariant. Fields stay public: callers may tweak a vector in place, and
//! such edits are not re-validated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::SystemLoad;

/// Allowed deviation of the weight sum from 1.0.
pub const SUM_TOLERANCE: f64 = 0.01;

/// Names of the five coefficients in their external key-value form.
pub const WEIGHT_NAMES: [&str; 5] = [
    "cpu_availability",
    "ram_availability",
    "temperature",
    "energy_efficiency",
    "historical_performance",
];

/// Relative importance of each sub-score in the final node score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct WeightVector {
    pub cpu_availability: f64,
    pub ram_availability: f64,
    pub temperature: f64,
    pub energy_efficiency: f64,
    pub historical_performance: f64,
}

impl WeightVector {
    /// Build a vector, rejecting negative entries and sums outside 1.0 +/- 0.01.
    pub fn new(
        cpu_availability: f64,
        ram_availability: f64,
        temperature: f64,
        energy_efficiency: f64,
        historical_performance: f64,
    ) -> CoreResult<Self> {
        let weights = Self {
            cpu_availability,
            ram_availability,
            temperature,
            energy_efficiency,
            historical_performance,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check the construction invariants against the current field values.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, value) in WEIGHT_NAMES.into_iter().zip(self.as_array()) {
            if !(value >= 0.0) {
                return Err(CoreError::NegativeWeight { name, value });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(CoreError::WeightSum { sum });
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Coefficients in [`WEIGHT_NAMES`] order.
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.cpu_availability,
            self.ram_availability,
            self.temperature,
            self.energy_efficiency,
            self.historical_performance,
        ]
    }

    /// Effective weights for a given system load, renormalized to sum to 1.0.
    ///
    /// - `low`: energy efficiency x1.5, CPU availability x0.7
    /// - `high`: CPU availability and temperature x1.3, energy efficiency x0.5
    /// - `normal`: unchanged (still renormalized)
    pub fn for_load(&self, load: SystemLoad) -> WeightVector {
        let mut w = *self;
        match load {
            SystemLoad::Low => {
                w.energy_efficiency *= 1.5;
                w.cpu_availability *= 0.7;
            }
            SystemLoad::High => {
                w.cpu_availability *= 1.3;
                w.temperature *= 1.3;
                w.energy_efficiency *= 0.5;
            }
            SystemLoad::Normal => {}
        }

        let total = w.sum();
        if total > 0.0 {
            w.cpu_availability /= total;
            w.ram_availability /= total;
            w.temperature /= total;
            w.energy_efficiency /= total;
            w.historical_performance /= total;
        }
        w
    }

    /// Export as the external key-value mapping.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        WEIGHT_NAMES
            .iter()
            .zip(self.as_array())
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// Import from the external key-value mapping.
    ///
    /// All five names must be present, no others are allowed, and the
    /// resulting vector must pass [`WeightVector::validate`].
    pub fn from_map(map: &BTreeMap<String, f64>) -> CoreResult<Self> {
        if let Some(unknown) = map.keys().find(|k| !WEIGHT_NAMES.contains(&k.as_str())) {
            return Err(CoreError::UnknownWeight(unknown.clone()));
        }
        let get = |name: &'static str| map.get(name).copied().ok_or(CoreError::MissingWeight(name));

        Self::new(
            get("cpu_availability")?,
            get("ram_availability")?,
            get("temperature")?,
            get("energy_efficiency")?,
            get("historical_performance")?,
        )
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            cpu_availability: 0.30,
            ram_availability: 0.25,
            temperature: 0.15,
            energy_efficiency: 0.20,
            historical_performance: 0.10,
        }
    }
}

impl TryFrom<BTreeMap<String, f64>> for WeightVector {
    type Error = CoreError;

    fn try_from(map: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::from_map(&map)
    }
}

impl From<WeightVector> for BTreeMap<String, f64> {
    fn from(weights: WeightVector) -> Self {
        weights.to_map()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn default_weights_are_valid() {
        let w = WeightVector::default();
        assert!(w.validate().is_ok());
        assert!(approx(w.sum(), 1.0));
    }

    #[test]
    fn accepts_sums_within_tolerance() {
        assert!(WeightVector::new(0.30, 0.25, 0.15, 0.20, 0.105).is_ok());
        assert!(WeightVector::new(0.30, 0.25, 0.15, 0.20, 0.095).is_ok());
        assert!(WeightVector::new(0.35, 0.30, 0.15, 0.15, 0.05).is_ok());
        assert!(WeightVector::new(1.0, 0.0, 0.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn rejects_sums_outside_tolerance() {
        let result = WeightVector::new(0.30, 0.25, 0.15, 0.20, 0.12);
        assert!(matches!(result, Err(CoreError::WeightSum { .. })));

        let result = WeightVector::new(0.2, 0.2, 0.2, 0.2, 0.1);
        assert!(matches!(result, Err(CoreError::WeightSum { .. })));

        let result = WeightVector::new(0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(matches!(result, Err(CoreError::WeightSum { .. })));
    }

    #[test]
    fn rejects_negative_weight() {
        let result = WeightVector::new(0.6, 0.5, -0.1, 0.0, 0.0);
        assert!(matches!(
            result,
            Err(CoreError::NegativeWeight { name: "temperature", .. })
        ));
    }

    #[test]
    fn rejects_nan_weight() {
        let result = WeightVector::new(f64::NAN, 0.25, 0.15, 0.20, 0.10);
        assert!(result.is_err());
    }

    #[test]
    fn normal_load_keeps_default_proportions() {
        let w = WeightVector::default().for_load(SystemLoad::Normal);
        assert!(approx(w.cpu_availability, 0.30));
        assert!(approx(w.energy_efficiency, 0.20));
        assert!(approx(w.sum(), 1.0));
    }

    #[test]
    fn low_load_favours_energy() {
        let base = WeightVector::default();
        let w = base.for_load(SystemLoad::Low);
        // 0.21 + 0.25 + 0.15 + 0.30 + 0.10 = 1.01 before renormalization.
        assert!(approx(w.energy_efficiency, 0.30 / 1.01));
        assert!(approx(w.cpu_availability, 0.21 / 1.01));
        assert!(approx(w.sum(), 1.0));
        assert!(w.energy_efficiency > base.energy_efficiency);
    }

    #[test]
    fn high_load_favours_cpu_and_temperature() {
        let base = WeightVector::default();
        let w = base.for_load(SystemLoad::High);
        // 0.39 + 0.25 + 0.195 + 0.10 + 0.10 = 1.035 before renormalization.
        assert!(approx(w.cpu_availability, 0.39 / 1.035));
        assert!(approx(w.temperature, 0.195 / 1.035));
        assert!(approx(w.energy_efficiency, 0.10 / 1.035));
        assert!(approx(w.sum(), 1.0));
    }

    #[test]
    fn map_conversion_validates() {
        let map = WeightVector::default().to_map();
        assert_eq!(map.len(), 5);
        assert_eq!(WeightVector::from_map(&map).unwrap(), WeightVector::default());

        let mut missing = map.clone();
        missing.remove("temperature");
        assert!(matches!(
            WeightVector::from_map(&missing),
            Err(CoreError::MissingWeight("temperature"))
        ));

        let mut typo = map.clone();
        typo.insert("temprature".to_string(), 0.0);
        assert!(matches!(
            WeightVector::from_map(&typo),
            Err(CoreError::UnknownWeight(_))
        ));
    }

    #[test]
    fn serde_rejects_invalid_sum() {
        let json = r#"{"cpu_availability": 0.5, "ram_availability": 0.5,
            "temperature": 0.5, "energy_efficiency": 0.0, "historical_performance": 0.0}"#;
        assert!(serde_json::from_str::<WeightVector>(json).is_err());

        let json = r#"{"cpu_availability": 0.35, "ram_availability": 0.30,
            "temperature": 0.15, "energy_efficiency": 0.15, "historical_performance": 0.05}"#;
        let w: WeightVector = serde_json::from_str(json).unwrap();
        assert_eq!(w.historical_performance, 0.05);
    }
}

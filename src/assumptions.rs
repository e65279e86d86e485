use crate::error::Result;
use crate::line_item::PeriodValues;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A forecasting assumption: one value for every period, or a value per period label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Assumption {
    Scalar(f64),
    PerPeriod(PeriodValues),
}

impl From<f64> for Assumption {
    fn from(value: f64) -> Self {
        Assumption::Scalar(value)
    }
}

impl From<PeriodValues> for Assumption {
    fn from(values: PeriodValues) -> Self {
        Assumption::PerPeriod(values)
    }
}

impl Assumption {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Assumption::Scalar(value) => Some(*value),
            Assumption::PerPeriod(_) => None,
        }
    }

    pub fn for_period(&self, period: &str) -> Option<f64> {
        match self {
            Assumption::Scalar(value) => Some(*value),
            Assumption::PerPeriod(values) => values.get(period).copied(),
        }
    }
}

/// Named assumptions such as `"revenue_growth" -> 0.06`.
///
/// Serializes as a flat JSON object: scalars as numbers, per-period
/// assumptions as `{period: value}` objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AssumptionSet {
    assumptions: BTreeMap<String, Assumption>,
}

impl AssumptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or replaces an assumption.
    pub fn set_assumption(&mut self, key: &str, value: impl Into<Assumption>) {
        self.assumptions.insert(key.to_string(), value.into());
    }

    /// Builder form of [`AssumptionSet::set_assumption`].
    pub fn with(mut self, key: &str, value: impl Into<Assumption>) -> Self {
        self.set_assumption(key, value);
        self
    }

    pub fn get_assumption(&self, key: &str) -> Option<&Assumption> {
        self.assumptions.get(key)
    }

    /// The value that applies to `period`. A scalar applies to every period.
    pub fn get_growth_for_period(&self, key: &str, period: &str) -> Option<f64> {
        self.assumptions.get(key)?.for_period(period)
    }

    pub fn remove_assumption(&mut self, key: &str) -> Option<Assumption> {
        self.assumptions.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.assumptions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assumptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assumptions.is_empty()
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_applies_to_every_period() {
        let mut assumptions = AssumptionSet::new();
        assumptions.set_assumption("revenue_growth", 0.06);

        assert_eq!(
            assumptions.get_assumption("revenue_growth"),
            Some(&Assumption::Scalar(0.06))
        );
        assert_eq!(assumptions.get_growth_for_period("revenue_growth", "2030"), Some(0.06));
        assert_eq!(assumptions.get_growth_for_period("missing", "2030"), None);
    }

    #[test]
    fn test_per_period_lookup() {
        let schedule: PeriodValues = [("2024".to_string(), 0.1), ("2025".to_string(), 0.05)]
            .into_iter()
            .collect();
        let assumptions = AssumptionSet::new().with("revenue_growth", schedule);

        assert_eq!(assumptions.get_growth_for_period("revenue_growth", "2025"), Some(0.05));
        assert_eq!(assumptions.get_growth_for_period("revenue_growth", "2026"), None);
    }

    #[test]
    fn test_set_replaces() {
        let mut assumptions = AssumptionSet::new();
        assumptions.set_assumption("tax_rate", 0.2);
        assumptions.set_assumption("tax_rate", 0.25);
        assert_eq!(assumptions.len(), 1);
        assert_eq!(assumptions.get_growth_for_period("tax_rate", "2024"), Some(0.25));
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"revenue_growth": 0.06, "margin": {"2024": 0.1, "2025": 0.12}}"#;
        let assumptions = AssumptionSet::from_json_str(json).unwrap();

        assert_eq!(
            assumptions.get_assumption("revenue_growth"),
            Some(&Assumption::Scalar(0.06))
        );
        assert_eq!(assumptions.get_growth_for_period("margin", "2025"), Some(0.12));

        let reloaded = AssumptionSet::from_json_str(&assumptions.to_json_string().unwrap()).unwrap();
        assert_eq!(reloaded, assumptions);
    }
}

use crate::error::{ModelError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Frequency {
    #[default]
    Annual,
    Quarterly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ForecastConfig {
    #[serde(default = "default_periods")]
    #[schemars(description = "Number of future periods a forecast run covers")]
    pub periods: usize,

    #[serde(default)]
    #[schemars(description = "Stepping used by growth extrapolation. Only Annual is implemented.")]
    pub frequency: Frequency,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            periods: default_periods(),
            frequency: Frequency::Annual,
        }
    }
}

impl ForecastConfig {
    pub fn new(periods: usize, frequency: Frequency) -> Self {
        Self { periods, frequency }
    }

    pub fn validate(&self) -> Result<()> {
        if self.periods == 0 {
            return Err(ModelError::InvalidParameter(
                "forecast periods must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ValuationConfig {
    #[serde(default = "default_base_item")]
    #[schemars(description = "Line item the payout ratio is applied to, e.g. 'Net Income' or 'free_Cash_Flow'")]
    pub base_item: String,

    #[serde(default = "default_discount_rate")]
    #[schemars(description = "Required return (cost of equity) as a fraction")]
    pub discount_rate: f64,

    #[serde(default = "default_payout_ratio")]
    #[schemars(description = "Share of the base item paid out as dividends (0.0 to 1.0)")]
    pub payout_ratio: f64,

    #[serde(default = "default_terminal_growth_rate")]
    #[schemars(description = "Perpetual growth rate after the explicit horizon")]
    pub terminal_growth_rate: f64,

    #[serde(default = "default_periods")]
    #[schemars(description = "Explicit forecast horizon in periods")]
    pub periods: usize,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            base_item: default_base_item(),
            discount_rate: default_discount_rate(),
            payout_ratio: default_payout_ratio(),
            terminal_growth_rate: default_terminal_growth_rate(),
            periods: default_periods(),
        }
    }
}

impl ValuationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.periods == 0 {
            return Err(ModelError::InvalidParameter(
                "valuation periods must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.payout_ratio) {
            return Err(ModelError::InvalidParameter(format!(
                "payout ratio {} must be between 0.0 and 1.0",
                self.payout_ratio
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub valuation: ValuationConfig,
}

impl ScenarioConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.forecast.validate()?;
        self.valuation.validate()
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(ScenarioConfig))
    }
}

fn default_periods() -> usize {
    5
}

fn default_base_item() -> String {
    "Net Income".to_string()
}

fn default_discount_rate() -> f64 {
    0.08
}

fn default_payout_ratio() -> f64 {
    0.5
}

fn default_terminal_growth_rate() -> f64 {
    0.02
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScenarioConfig::default();
        assert_eq!(config.forecast.periods, 5);
        assert_eq!(config.forecast.frequency, Frequency::Annual);
        assert_eq!(config.valuation.base_item, "Net Income");
        assert_eq!(config.valuation.discount_rate, 0.08);
        assert_eq!(config.valuation.payout_ratio, 0.5);
        assert_eq!(config.valuation.terminal_growth_rate, 0.02);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            ScenarioConfig::from_json_str(r#"{"valuation": {"discount_rate": 0.1}}"#).unwrap();
        assert_eq!(config.valuation.discount_rate, 0.1);
        assert_eq!(config.valuation.payout_ratio, 0.5);
        assert_eq!(config.forecast.periods, 5);
    }

    #[test]
    fn test_validation() {
        assert!(ScenarioConfig::from_json_str(r#"{"forecast": {"periods": 0}}"#).is_err());
        assert!(
            ScenarioConfig::from_json_str(r#"{"valuation": {"payout_ratio": 1.5}}"#).is_err()
        );
        assert!(ScenarioConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_schema_mentions_fields() {
        let schema = ScenarioConfig::schema_as_json().unwrap();
        assert!(schema.contains("discount_rate"));
        assert!(schema.contains("frequency"));
    }
}

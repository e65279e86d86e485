use crate::engine::ForecastModel;
use crate::error::{ModelError, Result};
use crate::line_item::{LineItem, PeriodValues};
use crate::statistical::StatisticalMethod;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Tags accepted by [`ForecastMethod::from_tag`].
pub const METHOD_TAGS: [&str; 7] = [
    "growth_rate",
    "margin_of",
    "fixed",
    "link_to_item",
    "custom_function",
    "statistical",
    "kpi",
];

/// User-supplied forecasting logic.
///
/// The function receives the target line item and the running model and
/// returns the `period -> value` pairs to write into the target's forecast.
#[derive(Clone)]
pub struct CustomForecastFn(
    Arc<dyn Fn(&LineItem, &ForecastModel<'_>) -> Result<PeriodValues> + Send + Sync>,
);

impl CustomForecastFn {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&LineItem, &ForecastModel<'_>) -> Result<PeriodValues> + Send + Sync + 'static,
    {
        Self(Arc::new(function))
    }

    pub fn call(&self, item: &LineItem, model: &ForecastModel<'_>) -> Result<PeriodValues> {
        (self.0)(item, model)
    }
}

impl fmt::Debug for CustomForecastFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomForecastFn(<fn>)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Compound the last historical value forward.
    GrowthRate {
        #[serde(default)]
        #[schemars(description = "Flat growth per period, e.g. 0.05 for 5%")]
        rate: Option<f64>,
        #[serde(default)]
        #[schemars(description = "Per-period growth overrides keyed by period label")]
        schedule: Option<PeriodValues>,
        #[serde(default)]
        #[schemars(description = "Assumption key to read the rate or schedule from when neither is given")]
        assumption: Option<String>,
    },

    /// Target = base item's forecast * margin.
    MarginOf { base_item: String, margin: f64 },

    /// The same value in every applicable period.
    Fixed { value: f64 },

    /// Target = source item's forecast * rate.
    LinkToItem { source_item: String, rate: f64 },

    /// Caller-provided function. Not serializable; a rule loaded from JSON
    /// carries no function and fails when applied.
    CustomFunction {
        #[serde(skip)]
        function: Option<CustomForecastFn>,
    },

    Statistical(StatisticalMethod),

    /// Evaluate the KPI named by the rule and write it into `target_item`
    /// for the periods after that item's history.
    Kpi {
        target_item: String,
        #[serde(default = "default_adjustment_factor")]
        adjustment_factor: f64,
    },
}

fn default_adjustment_factor() -> f64 {
    1.0
}

impl ForecastMethod {
    pub fn growth_rate(rate: f64) -> Self {
        ForecastMethod::GrowthRate {
            rate: Some(rate),
            schedule: None,
            assumption: None,
        }
    }

    pub fn growth_schedule(schedule: PeriodValues) -> Self {
        ForecastMethod::GrowthRate {
            rate: None,
            schedule: Some(schedule),
            assumption: None,
        }
    }

    pub fn growth_from_assumption(key: &str) -> Self {
        ForecastMethod::GrowthRate {
            rate: None,
            schedule: None,
            assumption: Some(key.to_string()),
        }
    }

    pub fn custom<F>(function: F) -> Self
    where
        F: Fn(&LineItem, &ForecastModel<'_>) -> Result<PeriodValues> + Send + Sync + 'static,
    {
        ForecastMethod::CustomFunction {
            function: Some(CustomForecastFn::new(function)),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ForecastMethod::GrowthRate { .. } => "growth_rate",
            ForecastMethod::MarginOf { .. } => "margin_of",
            ForecastMethod::Fixed { .. } => "fixed",
            ForecastMethod::LinkToItem { .. } => "link_to_item",
            ForecastMethod::CustomFunction { .. } => "custom_function",
            ForecastMethod::Statistical(_) => "statistical",
            ForecastMethod::Kpi { .. } => "kpi",
        }
    }

    /// Builds a method from its string tag and a JSON parameter object.
    ///
    /// For `"statistical"` the model may be named either `"model"` or
    /// `"method"` inside the parameters.
    pub fn from_tag(tag: &str, params: serde_json::Value) -> Result<Self> {
        if !METHOD_TAGS.contains(&tag) {
            return Err(ModelError::UnknownMethod(tag.to_string()));
        }

        let mut object = match params {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(ModelError::InvalidParameter(format!(
                    "parameters for '{}' must be a JSON object, got {}",
                    tag, other
                )))
            }
        };

        if tag == "statistical" && !object.contains_key("model") {
            if let Some(model) = object.remove("method") {
                object.insert("model".to_string(), model);
            }
        }
        object.insert(
            "method".to_string(),
            serde_json::Value::String(tag.to_string()),
        );

        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }
}

/// Inclusive, 1-indexed step range counted from the last historical period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodRange {
    #[serde(default = "default_start")]
    pub start: usize,

    #[serde(default)]
    #[schemars(description = "Last step to apply; defaults to the model's period count")]
    pub end: Option<usize>,
}

fn default_start() -> usize {
    1
}

impl PeriodRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }
}

/// A forecasting instruction for one line item (or, for KPI rules, one KPI).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForecastRule {
    item_name: String,

    #[serde(flatten)]
    method: ForecastMethod,

    #[serde(default)]
    period_range: Option<PeriodRange>,
}

impl ForecastRule {
    pub fn new(item_name: &str, method: ForecastMethod) -> Self {
        Self {
            item_name: item_name.to_string(),
            method,
            period_range: None,
        }
    }

    pub fn with_period_range(mut self, start: usize, end: usize) -> Self {
        self.period_range = Some(PeriodRange::new(start, end));
        self
    }

    /// A KPI-driven rule: the KPI's values, scaled by `adjustment_factor`,
    /// become the forecast of `target_item`.
    pub fn kpi(kpi_name: &str, target_item: &str, adjustment_factor: f64) -> Self {
        Self::new(
            kpi_name,
            ForecastMethod::Kpi {
                target_item: target_item.to_string(),
                adjustment_factor,
            },
        )
    }

    pub fn from_tag(item_name: &str, tag: &str, params: serde_json::Value) -> Result<Self> {
        Ok(Self::new(item_name, ForecastMethod::from_tag(tag, params)?))
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn method(&self) -> &ForecastMethod {
        &self.method
    }

    pub fn period_range(&self) -> Option<PeriodRange> {
        self.period_range
    }

    pub fn uses_kpi(&self) -> bool {
        matches!(self.method, ForecastMethod::Kpi { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistical::{NormalMode, SarimaTrend, SmoothingComponent};
    use serde_json::json;

    #[test]
    fn test_from_tag_builds_typed_methods() {
        let method = ForecastMethod::from_tag("margin_of", json!({"base_item": "Revenue", "margin": 0.2}))
            .unwrap();
        assert!(matches!(
            method,
            ForecastMethod::MarginOf { ref base_item, margin } if base_item == "Revenue" && margin == 0.2
        ));

        let method = ForecastMethod::from_tag("growth_rate", json!({"rate": 0.05})).unwrap();
        assert!(matches!(method, ForecastMethod::GrowthRate { rate: Some(r), .. } if r == 0.05));

        let method = ForecastMethod::from_tag("custom_function", serde_json::Value::Null).unwrap();
        assert!(matches!(method, ForecastMethod::CustomFunction { function: None }));
    }

    #[test]
    fn test_from_tag_unknown_method() {
        let result = ForecastMethod::from_tag("unknown_method", json!({}));
        assert!(matches!(result, Err(ModelError::UnknownMethod(ref tag)) if tag == "unknown_method"));
    }

    #[test]
    fn test_from_tag_missing_parameter() {
        assert!(matches!(
            ForecastMethod::from_tag("fixed", json!({})),
            Err(ModelError::SerializationError(_))
        ));
    }

    #[test]
    fn test_statistical_accepts_method_key() {
        let method = ForecastMethod::from_tag(
            "statistical",
            json!({"method": "sarima", "periods": 4, "order": [1, 1, 1], "seasonal_order": [1, 1, 1, 4], "trend": "constant"}),
        )
        .unwrap();

        match method {
            ForecastMethod::Statistical(StatisticalMethod::Sarima(params)) => {
                assert_eq!(params.order, (1, 1, 1));
                assert_eq!(params.seasonal_order, (1, 1, 1, 4));
                assert_eq!(params.trend, SarimaTrend::Constant);
            }
            other => panic!("unexpected method {:?}", other),
        }
    }

    #[test]
    fn test_statistical_short_names() {
        let method = ForecastMethod::from_tag("statistical", json!({"method": "prophet", "periods": 8})).unwrap();
        assert!(matches!(
            method,
            ForecastMethod::Statistical(StatisticalMethod::Decomposition(ref params)) if params.periods == 8
        ));

        let method = ForecastMethod::from_tag(
            "statistical",
            json!({"model": "holt_winters", "periods": 4, "trend": "add", "seasonal": "mul", "seasonal_periods": 4}),
        )
        .unwrap();
        match method {
            ForecastMethod::Statistical(StatisticalMethod::HoltWinters(params)) => {
                assert_eq!(params.trend, SmoothingComponent::Additive);
                assert_eq!(params.seasonal, SmoothingComponent::Multiplicative);
            }
            other => panic!("unexpected method {:?}", other),
        }

        let method = ForecastMethod::from_tag(
            "statistical",
            json!({"method": "sarima", "periods": 4, "order": [1, 1, 1], "seasonal_order": [0, 0, 0, 0], "trend": "c"}),
        )
        .unwrap();
        assert!(matches!(
            method,
            ForecastMethod::Statistical(StatisticalMethod::Sarima(ref params)) if params.trend == SarimaTrend::Constant
        ));

        // Serialization keeps the long names.
        let json = serde_json::to_value(SmoothingComponent::Additive).unwrap();
        assert_eq!(json, json!("additive"));
    }

    #[test]
    fn test_rule_json_round_trip() {
        let rule = ForecastRule::new(
            "Revenue",
            ForecastMethod::Statistical(StatisticalMethod::Normal(
                crate::statistical::NormalParams::new(8, NormalMode::Mean),
            )),
        )
        .with_period_range(5, 12);

        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"method\":\"statistical\""));
        assert!(json.contains("\"model\":\"normal\""));

        let loaded: ForecastRule = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.item_name(), "Revenue");
        assert_eq!(loaded.period_range(), Some(PeriodRange::new(5, 12)));
        assert_eq!(loaded.method().tag(), "statistical");
    }

    #[test]
    fn test_custom_function_is_not_serialized() {
        let rule = ForecastRule::new(
            "Dividends",
            ForecastMethod::custom(|_, _| Ok(PeriodValues::new())),
        );
        let json = serde_json::to_string(&rule).unwrap();
        let loaded: ForecastRule = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            loaded.method(),
            ForecastMethod::CustomFunction { function: None }
        ));
    }

    #[test]
    fn test_kpi_rule_defaults() {
        let rule: ForecastRule =
            serde_json::from_str(r#"{"item_name": "Margin", "method": "kpi", "target_item": "EBIT"}"#)
                .unwrap();
        assert!(rule.uses_kpi());
        assert!(matches!(
            rule.method(),
            ForecastMethod::Kpi { adjustment_factor, .. } if *adjustment_factor == 1.0
        ));
    }
}

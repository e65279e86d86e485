use crate::assumptions::AssumptionSet;
use crate::company::Company;
use crate::config::ScenarioConfig;
use crate::engine::ForecastModel;
use crate::error::Result;
use crate::rules::ForecastRule;
use crate::valuation::{margin_of_safety, DividendDiscountModel};
use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioResult {
    pub label: String,
    pub intrinsic_value_total: f64,
    pub intrinsic_value_per_share: f64,
    pub margin_of_safety: Option<f64>,
}

/// Runs forecast + valuation on private copies of a company under different assumptions.
///
/// Forecast rules are not carried into scenario runs unless attached with
/// [`ScenarioRunner::with_rules`]; without them the valuation reads whatever
/// forecast the base company already holds.
pub struct ScenarioRunner<'a> {
    company: &'a Company,
    shares_outstanding: f64,
    market_price: Option<f64>,
    config: ScenarioConfig,
    rules: Vec<ForecastRule>,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(
        company: &'a Company,
        shares_outstanding: f64,
        market_price: Option<f64>,
        config: ScenarioConfig,
    ) -> Self {
        Self {
            company,
            shares_outstanding,
            market_price,
            config,
            rules: Vec::new(),
        }
    }

    /// Re-applies these rules on every scenario copy before valuing it.
    pub fn with_rules(mut self, rules: Vec<ForecastRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn run_scenario(&self, assumptions: &AssumptionSet, label: &str) -> Result<ScenarioResult> {
        self.config.validate()?;
        info!("Running scenario '{}' for {}", label, self.company.name);

        let mut company = self.company.clone();

        if self.rules.is_empty() {
            warn!(
                "Scenario '{}' has no forecast rules attached; valuing the existing forecast",
                label
            );
        } else {
            let mut model =
                ForecastModel::new(&mut company, assumptions.clone(), self.config.forecast.clone());
            model.add_forecast_rules(self.rules.iter().cloned());
            model.run_forecast()?;
        }

        let valuation = DividendDiscountModel::new(&company, self.config.valuation.clone());
        let intrinsic_value_total = valuation.calculate_value()?;
        let intrinsic_value_per_share = valuation.calculate_intrinsic_per_share(self.shares_outstanding)?;

        Ok(ScenarioResult {
            label: label.to_string(),
            intrinsic_value_total,
            intrinsic_value_per_share,
            margin_of_safety: margin_of_safety(intrinsic_value_per_share, self.market_price),
        })
    }

    /// Runs each labelled scenario in order.
    pub fn compare(&self, scenarios: &[(&str, AssumptionSet)]) -> Result<Vec<ScenarioResult>> {
        scenarios
            .iter()
            .map(|(label, assumptions)| self.run_scenario(assumptions, label))
            .collect()
    }
}

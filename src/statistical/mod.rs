//! Statistical time-series forecasting for line item histories.
//!
//! Every model consumes a `period -> value` series and returns exactly
//! `periods` new labels that continue the series' own periodicity (annual
//! labels stay annual, quarterly labels roll Q4 into Q1 of the next year).
//! Output values are rounded to two decimals.

pub mod decomposition;
pub mod holt_winters;
pub mod sarima;

pub use decomposition::DecompositionParams;
pub use holt_winters::{HoltWintersParams, SmoothingComponent};
pub use sarima::{SarimaParams, SarimaTrend};

use crate::error::{ModelError, Result};
use crate::line_item::PeriodValues;
use crate::period::{periods_after, Period};
use crate::utils::round_to;
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::str::FromStr;

/// Which statistical model a forecast rule runs, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum StatisticalMethod {
    Normal(NormalParams),
    HoltWinters(HoltWintersParams),
    Sarima(SarimaParams),
    #[serde(alias = "prophet")]
    Decomposition(DecompositionParams),
}

impl StatisticalMethod {
    pub fn name(&self) -> &'static str {
        match self {
            StatisticalMethod::Normal(_) => "normal",
            StatisticalMethod::HoltWinters(_) => "holt_winters",
            StatisticalMethod::Sarima(_) => "sarima",
            StatisticalMethod::Decomposition(_) => "decomposition",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NormalMode {
    /// Every period is the historical mean.
    #[default]
    Mean,
    /// Draws from Normal(mean, std).
    Random,
    /// `mean + std_multiplier * std`.
    Percentile { std_multiplier: f64 },
}

impl FromStr for NormalMode {
    type Err = ModelError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "mean" => Ok(NormalMode::Mean),
            "random" => Ok(NormalMode::Random),
            "percentile" => Ok(NormalMode::Percentile {
                std_multiplier: 1.0,
            }),
            other => Err(ModelError::UnsupportedMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalParams {
    pub periods: usize,

    #[serde(default)]
    pub mode: NormalMode,

    #[serde(default)]
    #[schemars(description = "Compound growth applied on top of the drawn value, per step")]
    pub trend: f64,

    #[serde(default)]
    #[schemars(description = "Fixed seed for reproducible Random mode output")]
    pub random_seed: Option<u64>,
}

impl NormalParams {
    pub fn new(periods: usize, mode: NormalMode) -> Self {
        Self {
            periods,
            mode,
            trend: 0.0,
            random_seed: None,
        }
    }
}

/// Forecaster over one historical series.
#[derive(Debug, Clone)]
pub struct StatisticalForecaster {
    history: PeriodValues,
    values: Vec<f64>,
    mean: f64,
    std_dev: f64,
}

impl StatisticalForecaster {
    pub fn new(history: PeriodValues) -> Self {
        let values: Vec<f64> = history.values().copied().collect();
        let (mean, std_dev) = if values.is_empty() {
            (0.0, 0.0)
        } else {
            (values.iter().mean(), values.iter().population_std_dev())
        };

        Self {
            history,
            values,
            mean,
            std_dev,
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation of the history.
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn period_keys(&self) -> impl Iterator<Item = &str> {
        self.history.keys().map(String::as_str)
    }

    pub fn forecast(&self, method: &StatisticalMethod) -> Result<PeriodValues> {
        debug!(
            "Running {} forecast over {} observations",
            method.name(),
            self.values.len()
        );
        match method {
            StatisticalMethod::Normal(params) => self.forecast_normal(params),
            StatisticalMethod::HoltWinters(params) => self.forecast_holt_winters(params),
            StatisticalMethod::Sarima(params) => self.forecast_sarima(params),
            StatisticalMethod::Decomposition(params) => self.forecast_decomposition(params),
        }
    }

    pub fn forecast_normal(&self, params: &NormalParams) -> Result<PeriodValues> {
        if self.values.is_empty() {
            return Ok(PeriodValues::new());
        }

        let mut rng = match params.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let distribution = Normal::new(self.mean, self.std_dev)
            .map_err(|e| ModelError::InvalidParameter(format!("normal distribution: {}", e)))?;

        let values = (1..=params.periods)
            .map(|step| {
                let base = match params.mode {
                    NormalMode::Mean => self.mean,
                    NormalMode::Random => distribution.sample(&mut rng),
                    NormalMode::Percentile { std_multiplier } => {
                        self.mean + std_multiplier * self.std_dev
                    }
                };
                base * (1.0 + params.trend).powi(step as i32)
            })
            .collect();

        self.label(values)
    }

    pub fn forecast_holt_winters(&self, params: &HoltWintersParams) -> Result<PeriodValues> {
        self.require_history("holt_winters")?;
        let season_hint = self.default_season_length()?;
        let values = holt_winters::fit_and_forecast(&self.values, params, season_hint)?;
        self.label(values)
    }

    pub fn forecast_sarima(&self, params: &SarimaParams) -> Result<PeriodValues> {
        self.require_history("sarima")?;
        let values = sarima::fit_and_forecast(&self.values, params)?;
        self.label(values)
    }

    pub fn forecast_decomposition(&self, params: &DecompositionParams) -> Result<PeriodValues> {
        self.require_history("decomposition")?;
        let observed = self
            .history
            .iter()
            .map(|(label, value)| Ok((Period::parse(label)?, *value)))
            .collect::<Result<Vec<_>>>()?;
        let future = self.future_periods(params.periods)?;
        let values = decomposition::fit_and_forecast(&observed, &future, params)?;
        self.label(values)
    }

    fn require_history(&self, model: &str) -> Result<()> {
        if self.values.is_empty() {
            return Err(ModelError::EmptyHistory(format!(
                "{} needs at least one observation",
                model
            )));
        }
        Ok(())
    }

    fn last_period(&self) -> Result<Period> {
        let last = self
            .history
            .keys()
            .next_back()
            .ok_or_else(|| ModelError::EmptyHistory("no periods to continue from".to_string()))?;
        Period::parse(last)
    }

    fn default_season_length(&self) -> Result<usize> {
        Ok(if self.last_period()?.is_quarterly() { 4 } else { 1 })
    }

    fn future_periods(&self, count: usize) -> Result<Vec<Period>> {
        let anchor = self.last_period()?;
        Ok((1..=count as i64).map(|step| anchor.offset(step)).collect())
    }

    fn label(&self, values: Vec<f64>) -> Result<PeriodValues> {
        let labels = periods_after(self.last_period()?, values.len());
        Ok(labels
            .into_iter()
            .zip(values)
            .map(|(label, value)| (label, round_to(value, 2)))
            .collect())
    }
}

/// Ordinary least squares `targets ~ rows`, solved through an SVD so that
/// rank-deficient designs still return the minimum-norm solution.
pub(crate) fn least_squares(model: &str, rows: &[Vec<f64>], targets: &[f64]) -> Result<Vec<f64>> {
    let fit_failed = |details: String| ModelError::FitFailed {
        model: model.to_string(),
        details,
    };

    let columns = rows.first().map(Vec::len).unwrap_or(0);
    if rows.is_empty() || columns == 0 {
        return Err(fit_failed("empty design matrix".to_string()));
    }
    if rows.len() != targets.len() {
        return Err(fit_failed(format!(
            "{} rows but {} targets",
            rows.len(),
            targets.len()
        )));
    }

    let design = DMatrix::from_fn(rows.len(), columns, |i, j| rows[i][j]);
    let response = DVector::from_column_slice(targets);

    let solution = design
        .svd(true, true)
        .solve(&response, 1e-10)
        .map_err(|e| fit_failed(e.to_string()))?;

    let coefficients: Vec<f64> = solution.iter().copied().collect();
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(fit_failed("non-finite coefficients".to_string()));
    }
    Ok(coefficients)
}

//! Additive trend + seasonality regression over fiscal period end dates.

use super::least_squares;
use crate::error::{ModelError, Result};
use crate::period::Period;
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DAYS_PER_YEAR: f64 = 365.25;
/// Changepoints are only placed in this leading share of the history.
const CHANGEPOINT_RANGE: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DecompositionParams {
    pub periods: usize,

    #[serde(default = "default_seasonality")]
    #[schemars(description = "Fit quarter-of-year effects (quarterly series only)")]
    pub seasonality: bool,

    #[serde(default = "default_changepoints")]
    #[schemars(description = "Number of potential trend changepoints")]
    pub changepoints: usize,
}

impl DecompositionParams {
    pub fn new(periods: usize) -> Self {
        Self {
            periods,
            seasonality: default_seasonality(),
            changepoints: default_changepoints(),
        }
    }
}

fn default_seasonality() -> bool {
    true
}

fn default_changepoints() -> usize {
    2
}

struct Design {
    origin: NaiveDate,
    changepoints: Vec<f64>,
    seasonal_quarters: Vec<u32>,
}

impl Design {
    fn years_since_origin(&self, period: &Period) -> Result<f64> {
        let days = (period.end_date()? - self.origin).num_days();
        Ok(days as f64 / DAYS_PER_YEAR)
    }

    fn row(&self, period: &Period) -> Result<Vec<f64>> {
        let t = self.years_since_origin(period)?;
        let mut row = vec![1.0, t];
        row.extend(self.changepoints.iter().map(|c| (t - c).max(0.0)));

        let quarter = match period {
            Period::Quarterly { quarter, .. } => Some(*quarter),
            Period::Annual(_) => None,
        };
        row.extend(
            self.seasonal_quarters
                .iter()
                .map(|q| if quarter == Some(*q) { 1.0 } else { 0.0 }),
        );
        Ok(row)
    }
}

pub(crate) fn fit_and_forecast(
    observed: &[(Period, f64)],
    future: &[Period],
    params: &DecompositionParams,
) -> Result<Vec<f64>> {
    let first = observed.first().ok_or_else(|| {
        ModelError::EmptyHistory("decomposition needs at least one observation".to_string())
    })?;

    let quarterly = first.0.is_quarterly();
    if observed.iter().any(|(p, _)| p.is_quarterly() != quarterly) {
        return Err(ModelError::InvalidPeriod(
            "decomposition needs all-annual or all-quarterly labels".to_string(),
        ));
    }

    if observed.len() == 1 {
        return Ok(vec![first.1; future.len()]);
    }

    let origin = first.0.end_date()?;
    let mut design = Design {
        origin,
        changepoints: Vec::new(),
        seasonal_quarters: Vec::new(),
    };

    if quarterly && params.seasonality {
        let quarters: BTreeSet<u32> = observed
            .iter()
            .filter_map(|(p, _)| match p {
                Period::Quarterly { quarter, .. } => Some(*quarter),
                Period::Annual(_) => None,
            })
            .collect();
        // The first quarter seen is the baseline absorbed by the intercept.
        design.seasonal_quarters = quarters.into_iter().skip(1).collect();
    }

    let span = design.years_since_origin(&observed[observed.len() - 1].0)?;
    let fixed_columns = 2 + design.seasonal_quarters.len();
    let changepoint_count = params
        .changepoints
        .min(observed.len().saturating_sub(fixed_columns + 1));
    design.changepoints = (1..=changepoint_count)
        .map(|j| CHANGEPOINT_RANGE * span * j as f64 / changepoint_count as f64)
        .collect();

    let rows = observed
        .iter()
        .map(|(period, _)| design.row(period))
        .collect::<Result<Vec<_>>>()?;
    let targets: Vec<f64> = observed.iter().map(|(_, value)| *value).collect();

    let coefficients = least_squares("decomposition", &rows, &targets)?;
    debug!(
        "Decomposition fit: {} changepoints, {} seasonal terms, coefficients {:?}",
        design.changepoints.len(),
        design.seasonal_quarters.len(),
        coefficients
    );

    future
        .iter()
        .map(|period| {
            let row = design.row(period)?;
            Ok(row.iter().zip(&coefficients).map(|(x, c)| x * c).sum())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periods(labels: &[&str]) -> Vec<Period> {
        labels.iter().map(|l| Period::parse(l).unwrap()).collect()
    }

    #[test]
    fn test_linear_annual_trend() {
        let labels = periods(&["2018", "2019", "2020", "2021", "2022", "2023"]);
        let observed: Vec<(Period, f64)> = labels
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, 100.0 + 10.0 * i as f64))
            .collect();
        let future = periods(&["2024", "2025"]);

        let mut params = DecompositionParams::new(2);
        params.changepoints = 0;
        let forecast = fit_and_forecast(&observed, &future, &params).unwrap();

        assert!((forecast[0] - 160.0).abs() < 0.5);
        assert!((forecast[1] - 170.0).abs() < 0.5);
    }

    #[test]
    fn test_quarterly_seasonality() {
        let pattern = [10.0, 20.0, 30.0, 40.0];
        let labels: Vec<Period> = (2021..=2023)
            .flat_map(|year| (1..=4).map(move |quarter| Period::Quarterly { year, quarter }))
            .collect();
        let observed: Vec<(Period, f64)> = labels
            .iter()
            .zip(pattern.iter().cycle())
            .map(|(p, v)| (*p, *v))
            .collect();
        let future = periods(&["2024Q1", "2024Q2", "2024Q3", "2024Q4"]);

        let forecast = fit_and_forecast(&observed, &future, &DecompositionParams::new(4)).unwrap();
        for (predicted, expected) in forecast.iter().zip(pattern.iter()) {
            assert!((predicted - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_single_observation_is_flat() {
        let observed = vec![(Period::Annual(2023), 42.0)];
        let future = periods(&["2024", "2025"]);
        let forecast = fit_and_forecast(&observed, &future, &DecompositionParams::new(2)).unwrap();
        assert_eq!(forecast, vec![42.0, 42.0]);
    }

    #[test]
    fn test_mixed_labels_rejected() {
        let observed = vec![
            (Period::Annual(2022), 1.0),
            (Period::Quarterly { year: 2023, quarter: 1 }, 2.0),
        ];
        assert!(matches!(
            fit_and_forecast(&observed, &[], &DecompositionParams::new(1)),
            Err(ModelError::InvalidPeriod(_))
        ));
    }
}

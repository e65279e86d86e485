//! Seasonal ARIMA estimated with the Hannan-Rissanen two-stage regression.
//!
//! The seasonal polynomials are fitted as additional lags (`s, 2s, ...`) in
//! the same regression rather than as a multiplicative product, which keeps
//! the estimation linear. Stationarity and invertibility are not enforced.

use super::least_squares;
use crate::error::{ModelError, Result};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const MODEL: &str = "sarima";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SarimaTrend {
    #[default]
    #[serde(alias = "n")]
    None,
    /// Intercept in the (differenced) regression.
    #[serde(alias = "c")]
    Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SarimaParams {
    pub periods: usize,

    #[schemars(description = "(p, d, q): AR order, differencing order, MA order")]
    pub order: (usize, usize, usize),

    #[serde(default)]
    #[schemars(description = "(P, D, Q, s): seasonal AR, differencing and MA orders plus season length")]
    pub seasonal_order: (usize, usize, usize, usize),

    #[serde(default)]
    pub trend: SarimaTrend,
}

impl SarimaParams {
    pub fn new(periods: usize, order: (usize, usize, usize)) -> Self {
        Self {
            periods,
            order,
            seasonal_order: (0, 0, 0, 0),
            trend: SarimaTrend::None,
        }
    }

    fn season_length(&self) -> usize {
        self.seasonal_order.3
    }

    fn ar_lags(&self) -> Vec<usize> {
        lags(self.order.0, self.seasonal_order.0, self.season_length())
    }

    fn ma_lags(&self) -> Vec<usize> {
        lags(self.order.2, self.seasonal_order.2, self.season_length())
    }
}

fn lags(regular: usize, seasonal: usize, season_length: usize) -> Vec<usize> {
    let mut lags: Vec<usize> = (1..=regular).collect();
    if season_length > 0 {
        for k in 1..=seasonal {
            let lag = k * season_length;
            if !lags.contains(&lag) {
                lags.push(lag);
            }
        }
    }
    lags.sort_unstable();
    lags
}

fn fit_failed(details: String) -> ModelError {
    ModelError::FitFailed {
        model: MODEL.to_string(),
        details,
    }
}

/// Differencing steps applied to the series, kept so forecasts can be
/// integrated back to levels.
struct Differencing {
    steps: Vec<(usize, Vec<f64>)>,
}

impl Differencing {
    fn apply(values: &[f64], params: &SarimaParams) -> Result<(Self, Vec<f64>)> {
        let (_, d, _) = params.order;
        let (_, seasonal_d, _, s) = params.seasonal_order;
        if seasonal_d > 0 && s < 2 {
            return Err(fit_failed(format!(
                "seasonal differencing needs a season length of at least 2, got {}",
                s
            )));
        }

        let mut lags_to_apply = vec![1; d];
        lags_to_apply.extend(std::iter::repeat(s).take(seasonal_d));

        let mut steps = Vec::with_capacity(lags_to_apply.len());
        let mut series = values.to_vec();
        for lag in lags_to_apply {
            if series.len() <= lag {
                return Err(fit_failed(format!(
                    "{} observations are too few to difference at lag {}",
                    series.len(),
                    lag
                )));
            }
            let differenced = series.windows(lag + 1).map(|w| w[lag] - w[0]).collect();
            steps.push((lag, std::mem::replace(&mut series, differenced)));
        }

        Ok((Self { steps }, series))
    }

    fn integrate(&self, mut forecasts: Vec<f64>) -> Vec<f64> {
        for (lag, original) in self.steps.iter().rev() {
            let mut extended = original.clone();
            for value in &forecasts {
                let anchor = extended[extended.len() - lag];
                extended.push(value + anchor);
            }
            forecasts = extended.split_off(original.len());
        }
        forecasts
    }
}

struct Fitted {
    constant: f64,
    ar: Vec<(usize, f64)>,
    ma: Vec<(usize, f64)>,
    residuals: Vec<f64>,
}

pub(crate) fn fit_and_forecast(values: &[f64], params: &SarimaParams) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(ModelError::EmptyHistory(
            "sarima needs at least one observation".to_string(),
        ));
    }

    let (differencing, series) = Differencing::apply(values, params)?;
    let fitted = estimate(&series, params)?;
    debug!(
        "SARIMA fit: constant={:.4} ar={:?} ma={:?}",
        fitted.constant, fitted.ar, fitted.ma
    );

    let forecasts = fitted.forecast(&series, params.periods);
    Ok(differencing.integrate(forecasts))
}

fn estimate(series: &[f64], params: &SarimaParams) -> Result<Fitted> {
    let ar_lags = params.ar_lags();
    let ma_lags = params.ma_lags();
    let with_constant = params.trend == SarimaTrend::Constant;
    let n = series.len();

    if ar_lags.is_empty() && ma_lags.is_empty() {
        let constant = if with_constant {
            series.iter().sum::<f64>() / n as f64
        } else {
            0.0
        };
        return Ok(Fitted {
            constant,
            ar: Vec::new(),
            ma: Vec::new(),
            residuals: series.iter().map(|v| v - constant).collect(),
        });
    }

    let max_ar = ar_lags.last().copied().unwrap_or(0);
    let max_ma = ma_lags.last().copied().unwrap_or(0);

    // Stage one: a long autoregression stands in for the unobserved shocks.
    let (innovations, innovation_start) = if ma_lags.is_empty() {
        (vec![0.0; n], 0)
    } else {
        let long_order = (max_ar.max(max_ma) + 1).max(2 * max_ma);
        let long_lags: Vec<usize> = (1..=long_order).collect();
        let coefficients = regress(series, &long_lags, &[], &[], long_order, with_constant)?;
        (
            residuals(series, &long_lags, &[], &[], long_order, with_constant, &coefficients),
            long_order,
        )
    };

    // Stage two: regress on own lags and lagged innovations.
    let start = max_ar.max(innovation_start + max_ma);
    let coefficients = regress(series, &ar_lags, &ma_lags, &innovations, start, with_constant)?;
    let final_residuals = residuals(
        series,
        &ar_lags,
        &ma_lags,
        &innovations,
        start,
        with_constant,
        &coefficients,
    );

    let offset = usize::from(with_constant);
    let constant = if with_constant { coefficients[0] } else { 0.0 };
    let ar = ar_lags
        .iter()
        .zip(&coefficients[offset..offset + ar_lags.len()])
        .map(|(lag, c)| (*lag, *c))
        .collect();
    let ma = ma_lags
        .iter()
        .zip(&coefficients[offset + ar_lags.len()..])
        .map(|(lag, c)| (*lag, *c))
        .collect();

    Ok(Fitted {
        constant,
        ar,
        ma,
        residuals: final_residuals,
    })
}

fn design_row(
    series: &[f64],
    ar_lags: &[usize],
    ma_lags: &[usize],
    innovations: &[f64],
    t: usize,
    with_constant: bool,
) -> Vec<f64> {
    let mut row = Vec::with_capacity(usize::from(with_constant) + ar_lags.len() + ma_lags.len());
    if with_constant {
        row.push(1.0);
    }
    row.extend(ar_lags.iter().map(|lag| series[t - lag]));
    row.extend(ma_lags.iter().map(|lag| innovations[t - lag]));
    row
}

fn regress(
    series: &[f64],
    ar_lags: &[usize],
    ma_lags: &[usize],
    innovations: &[f64],
    start: usize,
    with_constant: bool,
) -> Result<Vec<f64>> {
    let columns = usize::from(with_constant) + ar_lags.len() + ma_lags.len();
    let rows_available = series.len().saturating_sub(start);
    if rows_available <= columns {
        return Err(fit_failed(format!(
            "{} usable observations for {} coefficients",
            rows_available, columns
        )));
    }

    let rows: Vec<Vec<f64>> = (start..series.len())
        .map(|t| design_row(series, ar_lags, ma_lags, innovations, t, with_constant))
        .collect();
    least_squares(MODEL, &rows, &series[start..])
}

fn residuals(
    series: &[f64],
    ar_lags: &[usize],
    ma_lags: &[usize],
    innovations: &[f64],
    start: usize,
    with_constant: bool,
    coefficients: &[f64],
) -> Vec<f64> {
    (0..series.len())
        .map(|t| {
            if t < start {
                return 0.0;
            }
            let row = design_row(series, ar_lags, ma_lags, innovations, t, with_constant);
            let fitted: f64 = row.iter().zip(coefficients).map(|(x, c)| x * c).sum();
            series[t] - fitted
        })
        .collect()
}

impl Fitted {
    /// Recursive forecast on the differenced scale; future shocks are zero.
    fn forecast(&self, series: &[f64], periods: usize) -> Vec<f64> {
        let mut history = series.to_vec();
        let mut shocks = self.residuals.clone();

        for _ in 0..periods {
            let t = history.len();
            let mut value = self.constant;
            for (lag, coefficient) in &self.ar {
                if let Some(past) = t.checked_sub(*lag).and_then(|i| history.get(i)) {
                    value += coefficient * past;
                }
            }
            for (lag, coefficient) in &self.ma {
                if let Some(shock) = t.checked_sub(*lag).and_then(|i| shocks.get(i)) {
                    value += coefficient * shock;
                }
            }
            history.push(value);
            shocks.push(0.0);
        }

        history.split_off(series.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_walk_with_drift() {
        let values: Vec<f64> = (1..=10).map(|i| 10.0 * i as f64).collect();
        let mut params = SarimaParams::new(3, (0, 1, 0));
        params.trend = SarimaTrend::Constant;

        let forecast = fit_and_forecast(&values, &params).unwrap();
        assert!((forecast[0] - 110.0).abs() < 1e-9);
        assert!((forecast[2] - 130.0).abs() < 1e-9);
    }

    #[test]
    fn test_ar1_recovers_coefficient() {
        let values: Vec<f64> = (0..8).map(|i| 64.0 * 0.5f64.powi(i)).collect();
        let params = SarimaParams::new(2, (1, 0, 0));

        let forecast = fit_and_forecast(&values, &params).unwrap();
        assert!((forecast[0] - 0.25).abs() < 1e-9);
        assert!((forecast[1] - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_seasonal_differencing_repeats_season() {
        let pattern = [10.0, 20.0, 30.0, 40.0];
        let values: Vec<f64> = pattern.iter().cycle().take(12).copied().collect();
        let mut params = SarimaParams::new(4, (0, 0, 0));
        params.seasonal_order = (0, 1, 0, 4);

        let forecast = fit_and_forecast(&values, &params).unwrap();
        for (predicted, expected) in forecast.iter().zip(pattern.iter()) {
            assert!((predicted - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_arma_fit_produces_requested_horizon() {
        let values: Vec<f64> = (0..40)
            .map(|i| 100.0 + 5.0 * (i as f64 * 0.7).sin() + i as f64)
            .collect();
        let mut params = SarimaParams::new(6, (1, 1, 1));
        params.trend = SarimaTrend::Constant;

        let forecast = fit_and_forecast(&values, &params).unwrap();
        assert_eq!(forecast.len(), 6);
        assert!(forecast.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_too_few_observations() {
        let params = SarimaParams::new(2, (3, 0, 0));
        assert!(matches!(
            fit_and_forecast(&[1.0, 2.0, 3.0], &params),
            Err(ModelError::FitFailed { .. })
        ));
        assert!(matches!(
            fit_and_forecast(&[], &params),
            Err(ModelError::EmptyHistory(_))
        ));
    }
}

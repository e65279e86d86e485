//! Holt-Winters exponential smoothing with optional damped trend.

use crate::error::{ModelError, Result};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const SMOOTHING_GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
const DAMPING_GRID: [f64; 5] = [0.8, 0.85, 0.9, 0.95, 0.98];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingComponent {
    #[default]
    None,
    #[serde(alias = "add")]
    Additive,
    #[serde(alias = "mul")]
    Multiplicative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HoltWintersParams {
    pub periods: usize,

    #[serde(default)]
    pub trend: SmoothingComponent,

    #[serde(default)]
    pub seasonal: SmoothingComponent,

    #[serde(default)]
    #[schemars(description = "Season length; defaults to 4 for quarterly series")]
    pub seasonal_periods: Option<usize>,

    #[serde(default)]
    pub damped: bool,
}

impl HoltWintersParams {
    /// Simple exponential smoothing (no trend, no seasonality).
    pub fn new(periods: usize) -> Self {
        Self {
            periods,
            trend: SmoothingComponent::None,
            seasonal: SmoothingComponent::None,
            seasonal_periods: None,
            damped: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Smoothing {
    alpha: f64,
    beta: f64,
    gamma: f64,
    phi: f64,
}

/// Final state after running the recursions over the whole history.
struct FittedState {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    sse: f64,
}

struct Model<'a> {
    values: &'a [f64],
    trend: SmoothingComponent,
    seasonal: SmoothingComponent,
    season_length: usize,
    initial_level: f64,
    initial_trend: f64,
    initial_seasonals: Vec<f64>,
}

pub(crate) fn fit_and_forecast(
    values: &[f64],
    params: &HoltWintersParams,
    season_hint: usize,
) -> Result<Vec<f64>> {
    let model = Model::initialise(values, params, season_hint)?;

    let alphas = SMOOTHING_GRID.to_vec();
    let betas = if model.trend == SmoothingComponent::None {
        vec![0.0]
    } else {
        SMOOTHING_GRID.to_vec()
    };
    let gammas = if model.seasonal == SmoothingComponent::None {
        vec![0.0]
    } else {
        SMOOTHING_GRID.to_vec()
    };
    let phis = if params.damped && model.trend != SmoothingComponent::None {
        DAMPING_GRID.to_vec()
    } else {
        vec![1.0]
    };

    let mut best: Option<(Smoothing, FittedState)> = None;
    for &alpha in &alphas {
        for &beta in &betas {
            for &gamma in &gammas {
                for &phi in &phis {
                    let smoothing = Smoothing {
                        alpha,
                        beta,
                        gamma,
                        phi,
                    };
                    let Some(state) = model.run(smoothing) else {
                        continue;
                    };
                    if best.as_ref().map_or(true, |(_, b)| state.sse < b.sse) {
                        best = Some((smoothing, state));
                    }
                }
            }
        }
    }

    let (smoothing, state) = best.ok_or_else(|| ModelError::FitFailed {
        model: "holt_winters".to_string(),
        details: "no smoothing parameters produced a finite fit".to_string(),
    })?;

    debug!(
        "Holt-Winters fit: alpha={} beta={} gamma={} phi={} sse={:.4}",
        smoothing.alpha, smoothing.beta, smoothing.gamma, smoothing.phi, state.sse
    );

    Ok(model.forecast(&state, smoothing.phi, params.periods))
}

impl<'a> Model<'a> {
    fn initialise(
        values: &'a [f64],
        params: &HoltWintersParams,
        season_hint: usize,
    ) -> Result<Self> {
        let fit_failed = |details: String| ModelError::FitFailed {
            model: "holt_winters".to_string(),
            details,
        };

        if values.is_empty() {
            return Err(ModelError::EmptyHistory(
                "holt_winters needs at least one observation".to_string(),
            ));
        }

        let multiplicative = params.trend == SmoothingComponent::Multiplicative
            || params.seasonal == SmoothingComponent::Multiplicative;
        if multiplicative && values.iter().any(|v| *v <= 0.0) {
            return Err(fit_failed(
                "multiplicative components require strictly positive data".to_string(),
            ));
        }

        let season_length = if params.seasonal == SmoothingComponent::None {
            1
        } else {
            let m = params.seasonal_periods.unwrap_or(season_hint);
            if m < 2 {
                return Err(fit_failed(format!(
                    "seasonal component needs a season length of at least 2, got {}",
                    m
                )));
            }
            if values.len() < 2 * m {
                return Err(fit_failed(format!(
                    "seasonal component needs two full seasons ({} observations), got {}",
                    2 * m,
                    values.len()
                )));
            }
            m
        };

        if params.trend != SmoothingComponent::None && values.len() < 2 {
            return Err(fit_failed(
                "trend component needs at least two observations".to_string(),
            ));
        }

        let seasonal = params.seasonal != SmoothingComponent::None;
        let initial_level = if seasonal {
            season_mean(values, 0, season_length)
        } else {
            values[0]
        };

        let initial_trend = match params.trend {
            SmoothingComponent::None => 0.0,
            SmoothingComponent::Additive if seasonal => {
                (season_mean(values, 1, season_length) - initial_level) / season_length as f64
            }
            SmoothingComponent::Additive => values[1] - values[0],
            SmoothingComponent::Multiplicative if seasonal => {
                (season_mean(values, 1, season_length) / initial_level)
                    .powf(1.0 / season_length as f64)
            }
            SmoothingComponent::Multiplicative => values[1] / values[0],
        };

        let initial_seasonals = match params.seasonal {
            SmoothingComponent::None => vec![0.0],
            SmoothingComponent::Additive => values[..season_length]
                .iter()
                .map(|v| v - initial_level)
                .collect(),
            SmoothingComponent::Multiplicative => values[..season_length]
                .iter()
                .map(|v| v / initial_level)
                .collect(),
        };

        Ok(Self {
            values,
            trend: params.trend,
            seasonal: params.seasonal,
            season_length,
            initial_level,
            initial_trend,
            initial_seasonals,
        })
    }

    /// Level plus `steps` damped trend increments.
    fn trended(&self, level: f64, trend: f64, steps: f64) -> f64 {
        match self.trend {
            SmoothingComponent::None => level,
            SmoothingComponent::Additive => level + steps * trend,
            SmoothingComponent::Multiplicative => level * trend.powf(steps),
        }
    }

    fn seasonalised(&self, base: f64, seasonal: f64) -> f64 {
        match self.seasonal {
            SmoothingComponent::None => base,
            SmoothingComponent::Additive => base + seasonal,
            SmoothingComponent::Multiplicative => base * seasonal,
        }
    }

    fn run(&self, s: Smoothing) -> Option<FittedState> {
        let mut level = self.initial_level;
        let mut trend = self.initial_trend;
        let mut seasonals = self.initial_seasonals.clone();
        let mut sse = 0.0;

        // Without seasonality the first observation is the initial level.
        let start = if self.seasonal == SmoothingComponent::None { 1 } else { 0 };

        for (t, &y) in self.values.iter().enumerate().skip(start) {
            let slot = t % self.season_length;
            let season = seasonals[slot];
            let base = self.trended(level, trend, s.phi);

            let predicted = self.seasonalised(base, season);
            sse += (y - predicted).powi(2);

            let deseasonalised = match self.seasonal {
                SmoothingComponent::None => y,
                SmoothingComponent::Additive => y - season,
                SmoothingComponent::Multiplicative => y / season,
            };
            let new_level = s.alpha * deseasonalised + (1.0 - s.alpha) * base;

            trend = match self.trend {
                SmoothingComponent::None => trend,
                SmoothingComponent::Additive => {
                    s.beta * (new_level - level) + (1.0 - s.beta) * s.phi * trend
                }
                SmoothingComponent::Multiplicative => {
                    s.beta * (new_level / level) + (1.0 - s.beta) * trend.powf(s.phi)
                }
            };

            seasonals[slot] = match self.seasonal {
                SmoothingComponent::None => season,
                SmoothingComponent::Additive => s.gamma * (y - new_level) + (1.0 - s.gamma) * season,
                SmoothingComponent::Multiplicative => {
                    s.gamma * (y / new_level) + (1.0 - s.gamma) * season
                }
            };

            level = new_level;
        }

        let finite = sse.is_finite()
            && level.is_finite()
            && trend.is_finite()
            && seasonals.iter().all(|v| v.is_finite());
        finite.then_some(FittedState {
            level,
            trend,
            seasonals,
            sse,
        })
    }

    fn forecast(&self, state: &FittedState, phi: f64, periods: usize) -> Vec<f64> {
        let n = self.values.len();
        let mut damped_steps = 0.0;

        (1..=periods)
            .map(|h| {
                damped_steps += phi.powi(h as i32);
                let base = self.trended(state.level, state.trend, damped_steps);
                let season = state.seasonals[(n + h - 1) % self.season_length];
                self.seasonalised(base, season)
            })
            .collect()
    }
}

fn season_mean(values: &[f64], season: usize, length: usize) -> f64 {
    let slice = &values[season * length..(season + 1) * length];
    slice.iter().sum::<f64>() / length as f64
}

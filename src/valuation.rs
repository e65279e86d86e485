use crate::company::Company;
use crate::config::ValuationConfig;
use crate::error::{ModelError, Result};
use log::{info, warn};
use serde::Serialize;

/// One discounted dividend in a DDM valuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountedDividend {
    pub period: String,
    pub base_value: f64,
    pub dividend: f64,
    pub discount_factor: f64,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationBreakdown {
    pub dividends: Vec<DiscountedDividend>,
    pub present_value_of_dividends: f64,
    pub terminal_value: f64,
    pub terminal_present_value: f64,
    pub total_value: f64,
}

/// Dividend discount model over a company's forecasted base item.
///
/// Dividends are `forecast * payout_ratio` for the first `periods` forecasted
/// periods. The terminal value is a Gordon growth perpetuity on the final
/// dividend, discounted back `periods` years.
pub struct DividendDiscountModel<'a> {
    company: &'a Company,
    config: ValuationConfig,
}

impl<'a> DividendDiscountModel<'a> {
    pub fn new(company: &'a Company, config: ValuationConfig) -> Self {
        Self { company, config }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    pub fn breakdown(&self) -> Result<ValuationBreakdown> {
        self.config.validate()?;
        let ValuationConfig {
            base_item,
            discount_rate,
            payout_ratio,
            terminal_growth_rate,
            periods,
        } = &self.config;
        let (r, g) = (*discount_rate, *terminal_growth_rate);

        let item = self
            .company
            .find_item(base_item)
            .ok_or_else(|| ModelError::ItemNotFound(base_item.clone()))?;
        if item.forecasted.is_empty() {
            return Err(ModelError::NoForecastData(item.name.clone()));
        }

        if r == g {
            return Err(ModelError::DegenerateTerminalGrowth {
                discount_rate: r,
                terminal_growth_rate: g,
            });
        }
        if r < g {
            warn!(
                "Discount rate {} is below terminal growth {}; terminal value will be negative",
                r, g
            );
        }

        info!(
            "Valuing {} on '{}' over {} periods (r={}, g={}, payout={})",
            self.company.name, item.name, periods, r, g, payout_ratio
        );

        let dividends: Vec<DiscountedDividend> = item
            .forecasted
            .iter()
            .take(*periods)
            .enumerate()
            .map(|(i, (period, base_value))| {
                let dividend = base_value * payout_ratio;
                let discount_factor = (1.0 + r).powi(i as i32 + 1);
                DiscountedDividend {
                    period: period.clone(),
                    base_value: *base_value,
                    dividend,
                    discount_factor,
                    present_value: dividend / discount_factor,
                }
            })
            .collect();

        let present_value_of_dividends = dividends.iter().map(|d| d.present_value).sum();
        let final_dividend = dividends.last().map(|d| d.dividend).unwrap_or(0.0);
        let terminal_value = final_dividend * (1.0 + g) / (r - g);
        let terminal_present_value = terminal_value / (1.0 + r).powi(*periods as i32);

        Ok(ValuationBreakdown {
            total_value: present_value_of_dividends + terminal_present_value,
            dividends,
            present_value_of_dividends,
            terminal_value,
            terminal_present_value,
        })
    }

    /// Intrinsic total equity value.
    pub fn calculate_value(&self) -> Result<f64> {
        Ok(self.breakdown()?.total_value)
    }

    pub fn calculate_intrinsic_per_share(&self, shares_outstanding: f64) -> Result<f64> {
        if shares_outstanding <= 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "shares outstanding must be positive, got {}",
                shares_outstanding
            )));
        }
        Ok(self.calculate_value()? / shares_outstanding)
    }
}

/// `(intrinsic - price) / price`, or `None` without a usable market price.
pub fn margin_of_safety(intrinsic_per_share: f64, market_price: Option<f64>) -> Option<f64> {
    market_price
        .filter(|price| *price != 0.0)
        .map(|price| (intrinsic_per_share - price) / price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_item::LineItem;
    use crate::schema::LineItemKind;

    fn company_with_forecast(values: &[(&str, f64)]) -> Company {
        let mut company = Company::new("TestCo", "TCO", "USD");
        let mut item = LineItem::with_historical("Net Income", LineItemKind::Result, [("2023", 90.0)]);
        for (period, value) in values {
            item.add_forecasted(*period, *value);
        }
        company.add_item(item);
        company
    }

    fn config(periods: usize) -> ValuationConfig {
        ValuationConfig {
            discount_rate: 0.1,
            payout_ratio: 0.5,
            terminal_growth_rate: 0.02,
            periods,
            ..ValuationConfig::default()
        }
    }

    #[test]
    fn test_single_period_closed_form() {
        let company = company_with_forecast(&[("2024", 100.0)]);
        let model = DividendDiscountModel::new(&company, config(1));

        let expected = 50.0 / 1.1 + (50.0 * 1.02 / 0.08) / 1.1;
        let value = model.calculate_value().unwrap();
        assert!((value - expected).abs() < 1e-9);
        assert!((value - 625.0).abs() < 1e-9);

        let per_share = model.calculate_intrinsic_per_share(10.0).unwrap();
        assert!((per_share - 62.5).abs() < 1e-9);
    }

    #[test]
    fn test_only_first_n_periods_are_used() {
        let company = company_with_forecast(&[
            ("2024", 100.0),
            ("2025", 110.0),
            ("2026", 121.0),
        ]);
        let breakdown = DividendDiscountModel::new(&company, config(2))
            .breakdown()
            .unwrap();

        assert_eq!(breakdown.dividends.len(), 2);
        assert_eq!(breakdown.dividends[1].period, "2025");
        assert!((breakdown.terminal_value - 55.0 * 1.02 / 0.08).abs() < 1e-9);
        assert!(
            (breakdown.total_value
                - (breakdown.present_value_of_dividends + breakdown.terminal_present_value))
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn test_errors() {
        let company = company_with_forecast(&[]);
        let model = DividendDiscountModel::new(&company, config(3));
        assert!(matches!(model.calculate_value(), Err(ModelError::NoForecastData(_))));

        let missing = ValuationConfig {
            base_item: "free_Cash_Flow".to_string(),
            ..config(3)
        };
        assert!(matches!(
            DividendDiscountModel::new(&company, missing).calculate_value(),
            Err(ModelError::ItemNotFound(_))
        ));

        let company = company_with_forecast(&[("2024", 100.0)]);
        let degenerate = ValuationConfig {
            discount_rate: 0.05,
            terminal_growth_rate: 0.05,
            ..config(1)
        };
        assert!(matches!(
            DividendDiscountModel::new(&company, degenerate).calculate_value(),
            Err(ModelError::DegenerateTerminalGrowth { .. })
        ));

        assert!(DividendDiscountModel::new(&company, config(1))
            .calculate_intrinsic_per_share(0.0)
            .is_err());
    }

    #[test]
    fn test_margin_of_safety() {
        assert_eq!(margin_of_safety(120.0, Some(100.0)), Some(0.2));
        assert_eq!(margin_of_safety(120.0, None), None);
        assert_eq!(margin_of_safety(120.0, Some(0.0)), None);
    }
}

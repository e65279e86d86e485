//! Plain-text, markdown and CSV summaries of valuations and forecasts.

use crate::company::Company;
use crate::error::{ModelError, Result};
use crate::line_item::PeriodValues;
use crate::valuation::{margin_of_safety, DividendDiscountModel};
use serde::Serialize;
use std::collections::BTreeSet;

/// Two-column `| Key | Value |` table.
pub fn markdown_table<K, V>(rows: &[(K, V)]) -> String
where
    K: std::fmt::Display,
    V: std::fmt::Display,
{
    let mut output = String::from("| Key | Value |\n|:----|:------|\n");
    for (key, value) in rows {
        output.push_str(&format!("| {} | {} |\n", key, value));
    }
    output
}

/// One column per series, one row per period (newest first). Missing cells
/// are left blank and values print with two decimals.
pub fn markdown_series_table(series: &[&PeriodValues], columns: &[&str]) -> String {
    let periods: BTreeSet<&String> = series.iter().flat_map(|values| values.keys()).collect();

    let mut output = format!("| Year | {} |\n", columns.join(" | "));
    output.push_str(&format!(
        "|:----| {} |\n",
        vec![":----:"; columns.len()].join(" | ")
    ));

    for period in periods.into_iter().rev() {
        output.push_str(&format!("| {} ", period));
        for values in series {
            match values.get(period) {
                Some(value) => output.push_str(&format!("| {:.2} ", value)),
                None => output.push_str("|  "),
            }
        }
        output.push_str("|\n");
    }

    output
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationSummary {
    pub company: String,
    pub ticker: String,
    pub currency: String,
    pub periods: usize,
    pub payout_ratio: f64,
    pub discount_rate: f64,
    pub terminal_growth_rate: f64,
    pub intrinsic_value_total: f64,
    pub intrinsic_value_per_share: f64,
    pub market_price: Option<f64>,
    pub margin_of_safety: Option<f64>,
}

impl ValuationSummary {
    pub fn generate(
        company: &Company,
        model: &DividendDiscountModel<'_>,
        shares_outstanding: f64,
        market_price: Option<f64>,
    ) -> Result<Self> {
        let config = model.config();
        let intrinsic_value_total = model.calculate_value()?;
        let intrinsic_value_per_share = model.calculate_intrinsic_per_share(shares_outstanding)?;

        Ok(Self {
            company: company.name.clone(),
            ticker: company.ticker.clone(),
            currency: company.currency.clone(),
            periods: config.periods,
            payout_ratio: config.payout_ratio,
            discount_rate: config.discount_rate,
            terminal_growth_rate: config.terminal_growth_rate,
            intrinsic_value_total,
            intrinsic_value_per_share,
            market_price,
            margin_of_safety: margin_of_safety(intrinsic_value_per_share, market_price),
        })
    }

    pub fn to_text(&self) -> String {
        let rule = "=".repeat(50);
        let mut output = String::new();

        output.push_str(&format!("{}\n", rule));
        output.push_str(&format!("Valuation Summary for {} ({})\n", self.company, self.ticker));
        output.push_str(&format!("{}\n", rule));
        output.push_str(&format!("Currency: {}\n", self.currency));
        output.push_str(&format!("Forecast Periods: {}\n", self.periods));
        output.push_str(&format!("Payout Ratio: {}\n", percent(self.payout_ratio)));
        output.push_str(&format!("Discount Rate: {}\n", percent(self.discount_rate)));
        output.push_str(&format!(
            "Terminal Growth Rate: {}\n",
            percent(self.terminal_growth_rate)
        ));
        output.push_str(&format!("{}\n", "-".repeat(50)));
        output.push_str(&format!(
            "Intrinsic Value (Total Equity): {:.2} {}\n",
            self.intrinsic_value_total, self.currency
        ));
        output.push_str(&format!(
            "Intrinsic Value Per Share: {:.2} {}\n",
            self.intrinsic_value_per_share, self.currency
        ));
        if let (Some(price), Some(margin)) = (self.market_price, self.margin_of_safety) {
            output.push_str(&format!("Current Market Price: {:.2} {}\n", price, self.currency));
            output.push_str(&format!("Margin of Safety: {}\n", percent(margin)));
        }
        output.push_str(&format!("{}\n", rule));

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut rows = vec![
            ("Company".to_string(), self.company.clone()),
            ("Ticker".to_string(), self.ticker.clone()),
            ("Currency".to_string(), self.currency.clone()),
            (
                "Intrinsic Value Total".to_string(),
                format!("{:.2}", self.intrinsic_value_total),
            ),
            (
                "Intrinsic Value Per Share".to_string(),
                format!("{:.2}", self.intrinsic_value_per_share),
            ),
            ("Discount Rate".to_string(), percent(self.discount_rate)),
            ("Payout Ratio".to_string(), percent(self.payout_ratio)),
            (
                "Terminal Growth Rate".to_string(),
                percent(self.terminal_growth_rate),
            ),
        ];
        if let Some(price) = self.market_price {
            rows.push(("Market Price".to_string(), format!("{:.2}", price)));
        }
        if let Some(margin) = self.margin_of_safety {
            rows.push(("Margin of Safety".to_string(), percent(margin)));
        }

        format!(
            "# Valuation Summary - {}\n\n{}",
            self.company,
            markdown_table(&rows)
        )
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Items side by side over the union of their periods, using
/// forecast-over-history values.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    pub periods: Vec<String>,
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl ForecastTable {
    pub fn from_items(company: &Company, item_names: &[&str]) -> Result<Self> {
        let items = item_names
            .iter()
            .map(|name| {
                company
                    .find_item(name)
                    .ok_or_else(|| ModelError::ItemNotFound(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let periods: Vec<String> = items
            .iter()
            .flat_map(|item| item.historical.keys().chain(item.forecasted.keys()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let rows = items
            .iter()
            .map(|item| {
                let values = periods.iter().map(|period| item.get_value(period)).collect();
                (item.name.clone(), values)
            })
            .collect();

        Ok(Self { periods, rows })
    }

    /// `Item,<period>,<period>...` header, then one line per item. Empty cells
    /// mark periods the item has no value for.
    pub fn to_csv(&self) -> String {
        let mut output = format!("Item,{}\n", self.periods.join(","));
        for (name, values) in &self.rows {
            let cells: Vec<String> = values
                .iter()
                .map(|value| value.map(|v| v.to_string()).unwrap_or_default())
                .collect();
            output.push_str(&format!("{},{}\n", name, cells.join(",")));
        }
        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = format!("| Item | {} |\n", self.periods.join(" | "));
        output.push_str(&format!("|:----| {} |\n", vec!["----:"; self.periods.len()].join(" | ")));
        for (name, values) in &self.rows {
            let cells: Vec<String> = values
                .iter()
                .map(|value| value.map(|v| format!("{:.2}", v)).unwrap_or_default())
                .collect();
            output.push_str(&format!("| {} | {} |\n", name, cells.join(" | ")));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValuationConfig;
    use crate::line_item::LineItem;
    use crate::schema::LineItemKind;

    fn company() -> Company {
        let mut company = Company::new("TestCo", "TCO", "USD");
        let mut income = LineItem::with_historical("Net Income", LineItemKind::Result, [("2023", 90.0)]);
        income.add_forecasted("2024", 100.0);
        company.add_item(income);
        company.add_item(LineItem::with_historical(
            "Revenue",
            LineItemKind::Revenue,
            [("2022", 400.0), ("2023", 450.0)],
        ));
        company
    }

    #[test]
    fn test_markdown_tables() {
        let table = markdown_table(&[("Ticker", "TCO")]);
        assert_eq!(table, "| Key | Value |\n|:----|:------|\n| Ticker | TCO |\n");

        let a: PeriodValues = [("2022".to_string(), 1.0), ("2023".to_string(), 2.5)].into();
        let b: PeriodValues = [("2023".to_string(), 3.0)].into();
        let table = markdown_series_table(&[&a, &b], &["A", "B"]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "| Year | A | B |");
        assert_eq!(lines[2], "| 2023 | 2.50 | 3.00 |");
        assert_eq!(lines[3], "| 2022 | 1.00 |  |");
    }

    #[test]
    fn test_valuation_summary() {
        let company = company();
        let config = ValuationConfig {
            discount_rate: 0.1,
            periods: 1,
            ..ValuationConfig::default()
        };
        let model = DividendDiscountModel::new(&company, config);
        let summary = ValuationSummary::generate(&company, &model, 10.0, Some(50.0)).unwrap();

        assert!((summary.intrinsic_value_per_share - 62.5).abs() < 1e-9);
        assert!((summary.margin_of_safety.unwrap() - 0.25).abs() < 1e-9);

        let text = summary.to_text();
        assert!(text.contains("Valuation Summary for TestCo (TCO)"));
        assert!(text.contains("Intrinsic Value Per Share: 62.50 USD"));
        assert!(text.contains("Margin of Safety: 25.0%"));
        assert!(summary.to_markdown().contains("| Discount Rate | 10.0% |"));
    }

    #[test]
    fn test_forecast_table() {
        let company = company();
        let table = ForecastTable::from_items(&company, &["Revenue", "Net Income"]).unwrap();

        assert_eq!(table.periods, vec!["2022", "2023", "2024"]);
        assert_eq!(table.rows[1].1, vec![None, Some(90.0), Some(100.0)]);
        assert_eq!(
            table.to_csv(),
            "Item,2022,2023,2024\nRevenue,400,450,\nNet_Income,,90,100\n"
        );
        assert!(ForecastTable::from_items(&company, &["EBIT"]).is_err());
    }
}

use crate::config::Frequency;
use crate::error::{ModelError, Result};
use crate::period::Period;
use crate::schema::{LineItemDocument, LineItemKind};
use crate::utils::sanitize_item_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Period label -> value, ordered lexicographically by period.
pub type PeriodValues = BTreeMap<String, f64>;

/// A single financial line such as Revenue or Net Income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub kind: LineItemKind,
    pub historical: PeriodValues,
    pub forecasted: PeriodValues,
}

impl LineItem {
    pub fn new(name: &str, kind: LineItemKind) -> Self {
        Self {
            name: sanitize_item_name(name),
            kind,
            historical: BTreeMap::new(),
            forecasted: BTreeMap::new(),
        }
    }

    pub fn with_historical<I, P>(name: &str, kind: LineItemKind, historical: I) -> Self
    where
        I: IntoIterator<Item = (P, f64)>,
        P: Into<String>,
    {
        let mut item = Self::new(name, kind);
        for (period, value) in historical {
            item.add_historical(period, value);
        }
        item
    }

    /// Records a reported value. A later call for the same period replaces the earlier one.
    pub fn add_historical(&mut self, period: impl Into<String>, value: f64) {
        self.historical.insert(period.into(), value);
    }

    pub fn add_forecasted(&mut self, period: impl Into<String>, value: f64) {
        self.forecasted.insert(period.into(), value);
    }

    /// Forecasted value if present, otherwise the historical one.
    pub fn get_value(&self, period: &str) -> Option<f64> {
        self.forecasted
            .get(period)
            .or_else(|| self.historical.get(period))
            .copied()
    }

    pub fn get_sorted_historical(&self) -> &PeriodValues {
        &self.historical
    }

    pub fn get_sorted_forecasted(&self) -> &PeriodValues {
        &self.forecasted
    }

    /// Historical values overlaid with forecasted ones.
    pub fn get_all_data_sorted(&self) -> PeriodValues {
        let mut combined = self.historical.clone();
        combined.extend(self.forecasted.iter().map(|(p, v)| (p.clone(), *v)));
        combined
    }

    pub fn last_historical_period(&self) -> Option<&str> {
        self.historical.keys().next_back().map(String::as_str)
    }

    pub fn clear_forecast(&mut self) {
        self.forecasted.clear();
    }

    /// Extrapolates from the last historical value by compounding growth.
    ///
    /// For each step the schedule entry for that period wins over the flat
    /// rate. Growth compounds on the previous step's value, so a schedule is
    /// order-sensitive.
    pub fn forecast_growth(
        &mut self,
        growth_rate: Option<f64>,
        growth_schedule: Option<&PeriodValues>,
        periods: usize,
        frequency: Frequency,
    ) -> Result<()> {
        let (last_period, last_value) = self
            .historical
            .iter()
            .next_back()
            .map(|(p, v)| (p.clone(), *v))
            .ok_or_else(|| ModelError::NoHistoricalData(self.name.clone()))?;

        if frequency != Frequency::Annual {
            return Err(ModelError::UnsupportedFrequency(format!(
                "{:?} (only Annual growth extrapolation is supported)",
                frequency
            )));
        }

        let anchor = Period::Annual(Period::parse(&last_period)?.year());
        let mut current_value = last_value;

        for step in 1..=periods {
            let next_period = anchor.offset(step as i64).to_string();

            let growth = growth_schedule
                .and_then(|schedule| schedule.get(&next_period).copied())
                .or(growth_rate)
                .ok_or_else(|| ModelError::MissingGrowthSpecification(next_period.clone()))?;

            current_value *= 1.0 + growth;
            self.forecasted.insert(next_period, current_value);
        }

        Ok(())
    }

    pub fn to_document(&self) -> LineItemDocument {
        LineItemDocument {
            kind: self.kind,
            historical: self.historical.clone(),
            forecasted: self.forecasted.clone(),
        }
    }

    pub fn from_document(name: &str, document: LineItemDocument) -> Self {
        Self {
            name: sanitize_item_name(name),
            kind: document.kind,
            historical: document.historical,
            forecasted: document.forecasted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_sanitized() {
        let item = LineItem::new("Net Income", LineItemKind::Result);
        assert_eq!(item.name, "Net_Income");
    }

    #[test]
    fn test_get_value_prefers_forecast() {
        let mut item = LineItem::new("Revenue", LineItemKind::Revenue);
        item.add_forecasted("2023", 1200.0);
        item.add_historical("2023", 1000.0);
        item.add_historical("2022", 900.0);

        assert_eq!(item.get_value("2023"), Some(1200.0));
        assert_eq!(item.get_value("2022"), Some(900.0));
        assert_eq!(item.get_value("2030"), None);
    }

    #[test]
    fn test_zero_forecast_is_a_value() {
        let mut item = LineItem::new("Revenue", LineItemKind::Revenue);
        item.add_historical("2024", 50.0);
        item.add_forecasted("2024", 0.0);
        assert_eq!(item.get_value("2024"), Some(0.0));
    }

    #[test]
    fn test_add_historical_overwrites() {
        let mut item = LineItem::new("Revenue", LineItemKind::Revenue);
        item.add_historical("2023", 1000.0);
        item.add_historical("2023", 1100.0);
        assert_eq!(item.historical.len(), 1);
        assert_eq!(item.historical["2023"], 1100.0);
    }

    #[test]
    fn test_forecast_growth_flat_rate() {
        let mut item = LineItem::with_historical("Revenue", LineItemKind::Revenue, [("2023", 1000.0)]);
        item.forecast_growth(Some(0.1), None, 3, Frequency::Annual)
            .unwrap();

        assert!((item.forecasted["2024"] - 1100.0).abs() < 1e-9);
        assert!((item.forecasted["2025"] - 1210.0).abs() < 1e-9);
        assert!((item.forecasted["2026"] - 1000.0 * 1.1f64.powi(3)).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_growth_schedule_overrides_rate() {
        let mut item = LineItem::with_historical(
            "Revenue",
            LineItemKind::Revenue,
            [("2022", 800.0), ("2023", 1000.0)],
        );
        let schedule: PeriodValues = [("2025".to_string(), 0.5)].into_iter().collect();
        item.forecast_growth(Some(0.1), Some(&schedule), 3, Frequency::Annual)
            .unwrap();

        assert!((item.forecasted["2024"] - 1100.0).abs() < 1e-9);
        assert!((item.forecasted["2025"] - 1650.0).abs() < 1e-9);
        assert!((item.forecasted["2026"] - 1815.0).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_growth_errors() {
        let mut empty = LineItem::new("Revenue", LineItemKind::Revenue);
        assert!(matches!(
            empty.forecast_growth(Some(0.1), None, 2, Frequency::Annual),
            Err(ModelError::NoHistoricalData(_))
        ));

        let mut item = LineItem::with_historical("Revenue", LineItemKind::Revenue, [("2023", 1.0)]);
        assert!(matches!(
            item.forecast_growth(None, None, 2, Frequency::Annual),
            Err(ModelError::MissingGrowthSpecification(_))
        ));
        assert!(matches!(
            item.forecast_growth(Some(0.1), None, 2, Frequency::Quarterly),
            Err(ModelError::UnsupportedFrequency(_))
        ));
    }

    #[test]
    fn test_all_data_overlay() {
        let mut item = LineItem::with_historical(
            "Revenue",
            LineItemKind::Revenue,
            [("2022", 1.0), ("2023", 2.0)],
        );
        item.add_forecasted("2023", 5.0);
        item.add_forecasted("2024", 6.0);

        let all = item.get_all_data_sorted();
        let keys: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2022", "2023", "2024"]);
        assert_eq!(all["2023"], 5.0);
        assert_eq!(item.last_historical_period(), Some("2023"));
    }
}

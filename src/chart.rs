//! Series preparation for charting backends.
//!
//! The crate draws nothing itself. [`ChartGenerator`] turns line items and
//! KPIs into [`ChartRequest`]s and hands them to a caller-supplied
//! [`ChartRenderer`].

use crate::company::Company;
use crate::error::{ModelError, Result};
use crate::line_item::LineItem;
use log::info;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    GroupedBar,
    /// Historical and forecast lines plus a `±std_multiplier * σ` band
    /// around the forecast.
    ConfidenceBand { std_multiplier: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChartDestination {
    Display,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    /// `(period, value)` in period order.
    pub points: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRequest {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub kind: ChartKind,
    pub series: Vec<ChartSeries>,
    pub destination: ChartDestination,
}

impl ChartRequest {
    /// Union of every series' periods, sorted.
    pub fn periods(&self) -> Vec<&str> {
        self.series
            .iter()
            .flat_map(|s| s.points.iter().map(|(period, _)| period.as_str()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub trait ChartRenderer {
    fn render(&self, request: &ChartRequest) -> Result<()>;
}

pub struct ChartGenerator<'a> {
    company: &'a Company,
}

impl<'a> ChartGenerator<'a> {
    pub fn new(company: &'a Company) -> Self {
        Self { company }
    }

    /// Historical and forecasted values of one item as a single line.
    pub fn item_request(&self, item_name: &str, destination: ChartDestination) -> Result<ChartRequest> {
        let item = self.require_item(item_name)?;
        let periods = item_periods(&[item]);

        Ok(ChartRequest {
            title: format!("{} - Historical and Forecasted", item.name),
            x_label: "Period".to_string(),
            y_label: "Amount".to_string(),
            kind: ChartKind::Line,
            series: vec![series_for(item, &periods)],
            destination,
        })
    }

    /// Several items aligned on the union of their periods. A period an item
    /// lacks is plotted as 0.
    pub fn items_request(
        &self,
        item_names: &[&str],
        kind: ChartKind,
        destination: ChartDestination,
    ) -> Result<ChartRequest> {
        if item_names.is_empty() {
            return Err(ModelError::InvalidParameter(
                "at least one item is required for a chart".to_string(),
            ));
        }

        let items = item_names
            .iter()
            .map(|name| self.require_item(name))
            .collect::<Result<Vec<_>>>()?;
        let periods = item_periods(&items);

        let title = match kind {
            ChartKind::GroupedBar => "Financial Items Comparison",
            _ => "Financial Items Trends",
        };

        Ok(ChartRequest {
            title: title.to_string(),
            x_label: "Period".to_string(),
            y_label: "Amount".to_string(),
            kind,
            series: items.iter().map(|item| series_for(item, &periods)).collect(),
            destination,
        })
    }

    pub fn kpi_request(&self, kpi_name: &str, destination: ChartDestination) -> Result<ChartRequest> {
        let values = self.company.calculate_kpi(kpi_name)?;

        Ok(ChartRequest {
            title: format!("{} Over Time", kpi_name),
            x_label: "Period".to_string(),
            y_label: "KPI Value".to_string(),
            kind: ChartKind::Line,
            series: vec![ChartSeries {
                name: kpi_name.to_string(),
                points: values.into_iter().collect(),
            }],
            destination,
        })
    }

    /// Historical line, forecast line, and lower/upper band series at
    /// `forecast ± std_multiplier * σ(historical)`.
    pub fn confidence_request(
        &self,
        item_name: &str,
        std_multiplier: f64,
        destination: ChartDestination,
    ) -> Result<ChartRequest> {
        let item = self.require_item(item_name)?;
        if item.historical.is_empty() {
            return Err(ModelError::NoHistoricalData(item.name.clone()));
        }

        let std_dev = item.historical.values().population_std_dev();
        let forecast: Vec<(String, f64)> = item
            .forecasted
            .iter()
            .map(|(period, value)| (period.clone(), *value))
            .collect();
        let band = |sign: f64| -> Vec<(String, f64)> {
            forecast
                .iter()
                .map(|(period, value)| (period.clone(), value + sign * std_multiplier * std_dev))
                .collect()
        };

        Ok(ChartRequest {
            title: format!("{} Forecast with ±{}σ Band", item.name, std_multiplier),
            x_label: "Period".to_string(),
            y_label: "Value".to_string(),
            kind: ChartKind::ConfidenceBand { std_multiplier },
            series: vec![
                ChartSeries {
                    name: "Historical".to_string(),
                    points: item
                        .historical
                        .iter()
                        .map(|(period, value)| (period.clone(), *value))
                        .collect(),
                },
                ChartSeries {
                    name: "Lower".to_string(),
                    points: band(-1.0),
                },
                ChartSeries {
                    name: "Upper".to_string(),
                    points: band(1.0),
                },
                ChartSeries {
                    name: "Forecast".to_string(),
                    points: forecast,
                },
            ],
            destination,
        })
    }

    pub fn plot(&self, renderer: &dyn ChartRenderer, request: &ChartRequest) -> Result<()> {
        renderer.render(request)?;
        if let ChartDestination::File(path) = &request.destination {
            info!("Chart '{}' saved to {}", request.title, path.display());
        }
        Ok(())
    }

    fn require_item(&self, name: &str) -> Result<&'a LineItem> {
        self.company
            .find_item(name)
            .ok_or_else(|| ModelError::ItemNotFound(name.to_string()))
    }
}

fn item_periods(items: &[&LineItem]) -> BTreeSet<String> {
    items
        .iter()
        .flat_map(|item| item.historical.keys().chain(item.forecasted.keys()))
        .cloned()
        .collect()
}

fn series_for(item: &LineItem, periods: &BTreeSet<String>) -> ChartSeries {
    ChartSeries {
        name: item.name.clone(),
        points: periods
            .iter()
            .map(|period| (period.clone(), item.get_value(period).unwrap_or(0.0)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LineItemKind;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRenderer {
        titles: RefCell<Vec<String>>,
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&self, request: &ChartRequest) -> Result<()> {
            self.titles.borrow_mut().push(request.title.clone());
            Ok(())
        }
    }

    fn company() -> Company {
        let mut company = Company::new("TestCo", "TCO", "USD");
        let mut revenue =
            LineItem::with_historical("Revenue", LineItemKind::Revenue, [("2022", 100.0), ("2023", 120.0)]);
        revenue.add_forecasted("2024", 130.0);
        company.add_item(revenue);
        company.add_item(LineItem::with_historical(
            "Expenses",
            LineItemKind::Expense,
            [("2023", 80.0)],
        ));
        company
    }

    #[test]
    fn test_item_request_merges_history_and_forecast() {
        let company = company();
        let request = ChartGenerator::new(&company)
            .item_request("Revenue", ChartDestination::Display)
            .unwrap();

        assert_eq!(request.title, "Revenue - Historical and Forecasted");
        assert_eq!(
            request.series[0].points,
            vec![
                ("2022".to_string(), 100.0),
                ("2023".to_string(), 120.0),
                ("2024".to_string(), 130.0)
            ]
        );
    }

    #[test]
    fn test_items_request_fills_missing_with_zero() {
        let company = company();
        let request = ChartGenerator::new(&company)
            .items_request(&["Revenue", "Expenses"], ChartKind::GroupedBar, ChartDestination::Display)
            .unwrap();

        assert_eq!(request.periods(), vec!["2022", "2023", "2024"]);
        assert_eq!(request.series[1].points[0], ("2022".to_string(), 0.0));
        assert_eq!(request.title, "Financial Items Comparison");

        assert!(matches!(
            ChartGenerator::new(&company).items_request(&["Revenue", "Missing"], ChartKind::Line, ChartDestination::Display),
            Err(ModelError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_confidence_band() {
        let company = company();
        let request = ChartGenerator::new(&company)
            .confidence_request("Revenue", 2.0, ChartDestination::File(PathBuf::from("band.png")))
            .unwrap();

        // σ of [100, 120] is 10.
        assert_eq!(request.series[1].points, vec![("2024".to_string(), 110.0)]);
        assert_eq!(request.series[2].points, vec![("2024".to_string(), 150.0)]);
    }

    #[test]
    fn test_kpi_request_and_plot() {
        let mut company = company();
        company.add_kpi("Margin", "Expenses / Revenue * 100").unwrap();

        let generator = ChartGenerator::new(&company);
        let request = generator.kpi_request("Margin", ChartDestination::Display).unwrap();
        assert_eq!(request.series[0].points.len(), 3);

        let renderer = RecordingRenderer::default();
        generator.plot(&renderer, &request).unwrap();
        assert_eq!(renderer.titles.borrow().as_slice(), ["Margin Over Time"]);
    }
}

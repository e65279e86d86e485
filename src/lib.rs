//! # fin-modeler
//!
//! Company financial statements, rule-driven forecasting, dividend discount
//! valuation and scenario comparison.
//!
//! ## Core Concepts
//!
//! - **Line items** hold historical and forecasted values keyed by period
//!   labels (`"2024"` or `"2024Q3"`).
//! - **Companies** own five statements (income, balance, cash flow, KPI and
//!   other financials) plus a registry of KPI formulas.
//! - **Forecast rules** are applied in order by a [`ForecastModel`]: growth,
//!   margins, links, fixed values, custom functions, statistical models and
//!   KPI-driven targets.
//! - **Valuation** discounts forecasted dividends with a Gordon growth
//!   terminal value; [`ScenarioRunner`] repeats it under alternate
//!   assumptions on private copies of the company.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fin_modeler::*;
//!
//! let mut company = Company::new("ACME Corp", "ACME", "USD");
//! company.add_item(LineItem::with_historical(
//!     "Net Income",
//!     LineItemKind::Result,
//!     [("2022", 90.0), ("2023", 100.0)],
//! ));
//!
//! let assumptions = AssumptionSet::new().with("growth", 0.05);
//! let mut model = ForecastModel::new(&mut company, assumptions, ForecastConfig::default());
//! model.add_forecast_rule(ForecastRule::new(
//!     "Net Income",
//!     ForecastMethod::growth_from_assumption("growth"),
//! ));
//! model.run_forecast()?;
//!
//! let value = DividendDiscountModel::new(&company, ValuationConfig::default()).calculate_value()?;
//! ```

pub mod agent;
pub mod assumptions;
pub mod chart;
pub mod company;
pub mod config;
pub mod engine;
pub mod error;
pub mod expression;
pub mod ingestion;
pub mod kpi;
pub mod line_item;
pub mod period;
pub mod report;
pub mod rules;
pub mod scenario;
pub mod schema;
pub mod statement;
pub mod statistical;
pub mod utils;
pub mod valuation;

pub use agent::{AgenticForecast, AnalystAgent, AnalystContext, AnalystOutput};
pub use assumptions::{Assumption, AssumptionSet};
pub use chart::{ChartDestination, ChartGenerator, ChartKind, ChartRenderer, ChartRequest, ChartSeries};
pub use company::{Company, CompanySnapshot};
pub use config::{ForecastConfig, Frequency, ScenarioConfig, ValuationConfig};
pub use engine::ForecastModel;
pub use error::{ModelError, Result};
pub use expression::Expression;
pub use ingestion::{
    add_kpi_series, build_company, import_company, CompanyData, CompanyProfile, FieldMapping,
    FinancialDataSource, ReportRecord, ReportType,
};
pub use kpi::{KpiDefinition, KpiFn, KpiRegistry};
pub use line_item::{LineItem, PeriodValues};
pub use period::Period;
pub use report::{markdown_series_table, markdown_table, ForecastTable, ValuationSummary};
pub use rules::{CustomForecastFn, ForecastMethod, ForecastRule, PeriodRange};
pub use scenario::{ScenarioResult, ScenarioRunner};
pub use schema::*;
pub use statement::Statement;
pub use statistical::{
    DecompositionParams, HoltWintersParams, NormalMode, NormalParams, SarimaParams, SarimaTrend,
    SmoothingComponent, StatisticalForecaster, StatisticalMethod,
};
pub use utils::*;
pub use valuation::{
    margin_of_safety, DiscountedDividend, DividendDiscountModel, ValuationBreakdown,
};

//! Turning provider report records into a [`Company`].
//!
//! Fetching is left to a [`FinancialDataSource`] implementation; this module
//! only merges the records it returns into line items and routes them to
//! statements by kind.

use crate::company::Company;
use crate::error::Result;
use crate::line_item::{LineItem, PeriodValues};
use crate::schema::LineItemKind;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Report metadata fields that never become line items.
pub const META_FIELDS: [&str; 9] = [
    "year",
    "period",
    "report_Date",
    "report_Start_Date",
    "report_End_Date",
    "currency",
    "currency_Ratio",
    "broken_Fiscal_Year",
    "instrument",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    Year,
    /// Rolling twelve months, labelled by year like annual reports.
    R12,
    Quarter,
}

/// One reported period as delivered by a provider: a year, an optional
/// quarter, and named values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub year: i32,

    #[serde(default)]
    pub period: Option<u32>,

    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ReportRecord {
    pub fn period_label(&self, report_type: ReportType) -> String {
        match (report_type, self.period) {
            (ReportType::Quarter, Some(quarter)) if (1..=4).contains(&quarter) => {
                format!("{}Q{}", self.year, quarter)
            }
            _ => self.year.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub ticker: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub instrument_id: Option<i64>,
}

fn default_currency() -> String {
    "SEK".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyData {
    pub profile: CompanyProfile,
    #[serde(default)]
    pub report_type: ReportType,
    pub reports: Vec<ReportRecord>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A third-party financial data provider.
pub trait FinancialDataSource {
    /// First company whose name matches `query`, with up to `max_count` reports.
    fn fetch_company(
        &self,
        query: &str,
        report_type: ReportType,
        max_count: usize,
    ) -> Result<Option<CompanyData>>;

    /// Historical values of one provider KPI, keyed by period label.
    fn fetch_kpi_series(
        &self,
        instrument_id: i64,
        kpi_id: u32,
        report_type: ReportType,
    ) -> Result<PeriodValues>;
}

/// Provider field name -> line item kind. Unmapped fields become `Other`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    kinds: BTreeMap<String, LineItemKind>,
    skipped: BTreeSet<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        use LineItemKind as K;

        let table = [
            ("revenues", K::Revenue),
            ("net_Sales", K::Revenue),
            ("gross_Income", K::Revenue),
            ("operating_Income", K::Revenue),
            ("profit_Before_Tax", K::Result),
            ("profit_To_Equity_Holders", K::Result),
            ("earnings_Per_Share", K::Ratio),
            ("dividend", K::Dividend),
            ("cash_Flow_From_Operating_Activities", K::CashFlowOperating),
            ("cash_Flow_From_Investing_Activities", K::CashFlowInvesting),
            ("cash_Flow_From_Financing_Activities", K::CashFlowFinancing),
            ("cash_Flow_For_The_Year", K::CashFlowSummary),
            ("free_Cash_Flow", K::CashFlowOperating),
            ("intangible_Assets", K::Asset),
            ("tangible_Assets", K::Asset),
            ("financial_Assets", K::Asset),
            ("non_Current_Assets", K::Asset),
            ("current_Assets", K::Asset),
            ("total_Assets", K::Asset),
            ("cash_And_Equivalents", K::Asset),
            ("non_Current_Liabilities", K::Liability),
            ("current_Liabilities", K::Liability),
            ("net_Debt", K::Liability),
            ("total_Equity", K::Equity),
        ];

        Self {
            kinds: table
                .into_iter()
                .map(|(field, kind)| (field.to_string(), kind))
                .collect(),
            skipped: META_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl FieldMapping {
    /// A mapping with no field kinds; only the metadata fields are skipped.
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
            skipped: META_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn with(mut self, field: &str, kind: LineItemKind) -> Self {
        self.kinds.insert(field.to_string(), kind);
        self
    }

    pub fn skip(mut self, field: &str) -> Self {
        self.skipped.insert(field.to_string());
        self
    }

    pub fn kind_for(&self, field: &str) -> LineItemKind {
        self.kinds.get(field).copied().unwrap_or(LineItemKind::Other)
    }

    pub fn is_skipped(&self, field: &str) -> bool {
        self.skipped.contains(field)
    }
}

/// Builds a company with one line item per report field, merging the
/// field's value from every record.
pub fn build_company(data: &CompanyData, mapping: &FieldMapping) -> Company {
    let profile = &data.profile;
    let mut company = Company::new(&profile.name, &profile.ticker, &profile.currency);
    company.description = data.description.clone();

    let fields: BTreeSet<&str> = data
        .reports
        .iter()
        .flat_map(|record| record.fields.keys().map(String::as_str))
        .filter(|field| !mapping.is_skipped(field))
        .collect();

    for field in fields {
        let mut item = LineItem::new(field, mapping.kind_for(field));

        for record in &data.reports {
            match record.fields.get(field) {
                None | Some(serde_json::Value::Null) => {}
                Some(value) => match value.as_f64() {
                    Some(number) => item.add_historical(record.period_label(data.report_type), number),
                    None => warn!(
                        "Skipping non-numeric value for '{}' in {}: {}",
                        field,
                        record.period_label(data.report_type),
                        value
                    ),
                },
            }
        }

        debug!(
            "Imported '{}' as {} with {} periods",
            item.name,
            item.kind,
            item.historical.len()
        );
        company.add_item(item);
    }

    company
}

/// Stores an external KPI series on the company's KPI statement.
pub fn add_kpi_series(company: &mut Company, name: &str, series: &PeriodValues) {
    let item = LineItem::with_historical(
        name,
        LineItemKind::Ratio,
        series.iter().map(|(period, value)| (period.clone(), *value)),
    );
    company.kpi_statement_mut().add_item(item);
}

pub fn import_company(
    source: &dyn FinancialDataSource,
    query: &str,
    report_type: ReportType,
    max_count: usize,
    mapping: &FieldMapping,
) -> Result<Option<Company>> {
    info!("Importing company matching '{}'", query);

    let Some(data) = source.fetch_company(query, report_type, max_count)? else {
        warn!("No company found matching '{}'", query);
        return Ok(None);
    };

    if data.reports.is_empty() {
        warn!("No reports returned for {}", data.profile.name);
    }

    Ok(Some(build_company(&data, mapping)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use serde_json::json;

    struct StubSource {
        data: Vec<CompanyData>,
    }

    impl FinancialDataSource for StubSource {
        fn fetch_company(
            &self,
            query: &str,
            _report_type: ReportType,
            max_count: usize,
        ) -> Result<Option<CompanyData>> {
            let query = query.to_lowercase();
            Ok(self
                .data
                .iter()
                .find(|d| d.profile.name.to_lowercase().contains(&query))
                .map(|d| {
                    let mut data = d.clone();
                    data.reports.truncate(max_count);
                    data
                }))
        }

        fn fetch_kpi_series(
            &self,
            instrument_id: i64,
            _kpi_id: u32,
            _report_type: ReportType,
        ) -> Result<PeriodValues> {
            if instrument_id != 1605 {
                return Err(ModelError::Collaborator("unknown instrument".to_string()));
            }
            Ok([("2022".to_string(), 31.5), ("2023".to_string(), 29.0)]
                .into_iter()
                .collect())
        }
    }

    fn record(json: serde_json::Value) -> ReportRecord {
        serde_json::from_value(json).unwrap()
    }

    fn sample_data() -> CompanyData {
        CompanyData {
            profile: CompanyProfile {
                name: "Atlas Copco B".to_string(),
                ticker: "ATCO B".to_string(),
                currency: "SEK".to_string(),
                instrument_id: Some(1605),
            },
            report_type: ReportType::Year,
            reports: vec![
                record(json!({"year": 2023, "period": 5, "revenues": 1000.0, "total_Assets": 5000.0,
                              "dividend": 2.8, "report_End_Date": "2023-12-31", "currency": "SEK"})),
                record(json!({"year": 2022, "period": 5, "revenues": 900.0, "total_Assets": null,
                              "dividend": 2.3, "employees": 49000})),
            ],
            description: Some("Industrial equipment".to_string()),
        }
    }

    #[test]
    fn test_build_company_routes_by_kind() {
        let company = build_company(&sample_data(), &FieldMapping::default());

        let revenues = company.income_statement().get_item("revenues").unwrap();
        assert_eq!(revenues.historical.len(), 2);
        assert_eq!(revenues.historical["2022"], 900.0);

        let assets = company.balance_sheet().get_item("total_Assets").unwrap();
        assert_eq!(assets.historical.len(), 1);

        assert!(company.other_financials_statement().get_item("dividend").is_some());
        assert_eq!(
            company.other_financials_statement().get_item("employees").unwrap().kind,
            LineItemKind::Other
        );
        assert!(company.find_item("report_End_Date").is_none());
        assert!(company.find_item("currency").is_none());
    }

    #[test]
    fn test_quarter_labels() {
        let mut data = sample_data();
        data.report_type = ReportType::Quarter;
        data.reports = vec![
            record(json!({"year": 2023, "period": 4, "revenues": 250.0})),
            record(json!({"year": 2024, "period": 1, "revenues": 260.0})),
        ];

        let company = build_company(&data, &FieldMapping::default());
        let revenues = company.find_item("revenues").unwrap();
        let periods: Vec<&str> = revenues.historical.keys().map(String::as_str).collect();
        assert_eq!(periods, vec!["2023Q4", "2024Q1"]);
    }

    #[test]
    fn test_import_and_kpi_series() {
        let source = StubSource {
            data: vec![sample_data()],
        };

        let mut company = import_company(&source, "atlas", ReportType::Year, 1, &FieldMapping::default())
            .unwrap()
            .unwrap();
        assert_eq!(company.find_item("revenues").unwrap().historical.len(), 1);

        let series = source.fetch_kpi_series(1605, 33, ReportType::Year).unwrap();
        add_kpi_series(&mut company, "ROE", &series);
        assert_eq!(company.kpi_statement().get_item("ROE").unwrap().historical["2023"], 29.0);

        assert!(import_company(&source, "volvo", ReportType::Year, 5, &FieldMapping::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_custom_mapping() {
        let mapping = FieldMapping::empty()
            .with("employees", LineItemKind::Ratio)
            .skip("dividend");
        let company = build_company(&sample_data(), &mapping);

        assert!(company.find_item("dividend").is_none());
        assert_eq!(company.find_item("revenues").unwrap().kind, LineItemKind::Other);
        assert_eq!(company.find_item("employees").unwrap().kind, LineItemKind::Ratio);
    }
}

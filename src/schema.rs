use schemars::JsonSchema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum LineItemKind {
    #[schemars(description = "Resources owned by the company (Balance Sheet)")]
    Asset,

    #[schemars(description = "Obligations owed to creditors (Balance Sheet)")]
    Liability,

    #[schemars(description = "Owner's residual interest (Balance Sheet)")]
    Equity,

    #[schemars(description = "Sales and other top-line income (Income Statement)")]
    Revenue,

    #[schemars(description = "Costs and operating expenses (Income Statement)")]
    Expense,

    #[schemars(description = "Profit lines such as net income or profit before tax (Income Statement)")]
    Result,

    #[schemars(description = "Ratios and per-share metrics")]
    Ratio,

    #[serde(rename = "Operating Cash Flow Item")]
    CashFlowOperating,

    #[serde(rename = "Investing Cash Flow Item")]
    CashFlowInvesting,

    #[serde(rename = "Financing Cash Flow Item")]
    CashFlowFinancing,

    #[serde(rename = "Net Cash Flow (Summary)")]
    CashFlowSummary,

    #[serde(rename = "Dividends Paid")]
    Dividend,

    Other,
}

impl LineItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemKind::Asset => "Asset",
            LineItemKind::Liability => "Liability",
            LineItemKind::Equity => "Equity",
            LineItemKind::Revenue => "Revenue",
            LineItemKind::Expense => "Expense",
            LineItemKind::Result => "Result",
            LineItemKind::Ratio => "Ratio",
            LineItemKind::CashFlowOperating => "Operating Cash Flow Item",
            LineItemKind::CashFlowInvesting => "Investing Cash Flow Item",
            LineItemKind::CashFlowFinancing => "Financing Cash Flow Item",
            LineItemKind::CashFlowSummary => "Net Cash Flow (Summary)",
            LineItemKind::Dividend => "Dividends Paid",
            LineItemKind::Other => "Other",
        }
    }

    /// The statement an item of this kind belongs to by default.
    pub fn default_statement(&self) -> StatementKind {
        match self {
            LineItemKind::Revenue | LineItemKind::Expense | LineItemKind::Result => {
                StatementKind::Income
            }
            LineItemKind::Asset | LineItemKind::Liability | LineItemKind::Equity => {
                StatementKind::Balance
            }
            LineItemKind::CashFlowOperating
            | LineItemKind::CashFlowInvesting
            | LineItemKind::CashFlowFinancing
            | LineItemKind::CashFlowSummary => StatementKind::CashFlow,
            LineItemKind::Ratio | LineItemKind::Dividend | LineItemKind::Other => {
                StatementKind::OtherFinancials
            }
        }
    }
}

impl fmt::Display for LineItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Income,
    Balance,
    CashFlow,
    Kpi,
    OtherFinancials,
}

impl StatementKind {
    /// Item lookup order used by forecasting, KPI formulas and valuation.
    pub const SEARCH_ORDER: [StatementKind; 5] = [
        StatementKind::Income,
        StatementKind::Balance,
        StatementKind::CashFlow,
        StatementKind::Kpi,
        StatementKind::OtherFinancials,
    ];

    pub const BASE_STATEMENTS: [StatementKind; 3] = [
        StatementKind::Income,
        StatementKind::Balance,
        StatementKind::CashFlow,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            StatementKind::Income => "Income Statement",
            StatementKind::Balance => "Balance Sheet",
            StatementKind::CashFlow => "Cash Flow Statement",
            StatementKind::Kpi => "KPI Statement",
            StatementKind::OtherFinancials => "Other Financials Statement",
        }
    }

    pub fn json_key(&self) -> &'static str {
        match self {
            StatementKind::Income => "income_statement",
            StatementKind::Balance => "balance_sheet",
            StatementKind::CashFlow => "cash_flow_statement",
            StatementKind::Kpi => "kpi_statement",
            StatementKind::OtherFinancials => "other_financials_statement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItemDocument {
    #[serde(rename = "type")]
    #[schemars(description = "The line item kind, e.g. 'Revenue' or 'Operating Cash Flow Item'")]
    pub kind: LineItemKind,

    #[serde(default)]
    #[schemars(description = "Reported values keyed by period label ('YYYY' or 'YYYYQn')")]
    pub historical: BTreeMap<String, f64>,

    #[serde(default)]
    #[schemars(description = "Projected values keyed by period label ('YYYY' or 'YYYYQn')")]
    pub forecasted: BTreeMap<String, f64>,
}

/// Line items of one statement, kept in insertion order.
///
/// Serialized as a JSON object so the on-disk layout stays `name -> item`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementDocument(pub Vec<(String, LineItemDocument)>);

impl Serialize for StatementDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, item) in &self.0 {
            map.serialize_entry(name, item)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StatementDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct StatementVisitor;

        impl<'de> Visitor<'de> for StatementVisitor {
            type Value = StatementDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of line item name to line item")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut items = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, item)) = access.next_entry::<String, LineItemDocument>()? {
                    items.push((name, item));
                }
                Ok(StatementDocument(items))
            }
        }

        deserializer.deserialize_map(StatementVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialsDocument {
    #[serde(default)]
    #[schemars(with = "BTreeMap<String, LineItemDocument>")]
    pub income_statement: StatementDocument,

    #[serde(default)]
    #[schemars(with = "BTreeMap<String, LineItemDocument>")]
    pub balance_sheet: StatementDocument,

    #[serde(default)]
    #[schemars(with = "BTreeMap<String, LineItemDocument>")]
    pub cash_flow_statement: StatementDocument,

    #[serde(default)]
    #[schemars(with = "BTreeMap<String, LineItemDocument>")]
    pub kpi_statement: StatementDocument,

    #[serde(default)]
    #[schemars(with = "BTreeMap<String, LineItemDocument>")]
    pub other_financials_statement: StatementDocument,
}

impl FinancialsDocument {
    pub fn statement(&self, kind: StatementKind) -> &StatementDocument {
        match kind {
            StatementKind::Income => &self.income_statement,
            StatementKind::Balance => &self.balance_sheet,
            StatementKind::CashFlow => &self.cash_flow_statement,
            StatementKind::Kpi => &self.kpi_statement,
            StatementKind::OtherFinancials => &self.other_financials_statement,
        }
    }

    pub fn statement_mut(&mut self, kind: StatementKind) -> &mut StatementDocument {
        match kind {
            StatementKind::Income => &mut self.income_statement,
            StatementKind::Balance => &mut self.balance_sheet,
            StatementKind::CashFlow => &mut self.cash_flow_statement,
            StatementKind::Kpi => &mut self.kpi_statement,
            StatementKind::OtherFinancials => &mut self.other_financials_statement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompanyDocument {
    #[schemars(description = "The legal name of the company")]
    pub name: String,

    #[schemars(description = "Exchange ticker symbol")]
    pub ticker: String,

    #[schemars(description = "Reporting currency, e.g. 'USD' or 'SEK'")]
    pub currency: String,

    #[serde(default)]
    #[schemars(description = "Optional free-text business description")]
    pub description: Option<String>,

    #[schemars(description = "One object per statement, each mapping line item name to its data")]
    pub financials: FinancialsDocument,
}

impl CompanyDocument {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CompanyDocument)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = CompanyDocument::schema_as_json().unwrap();
        assert!(schema_json.contains("ticker"));
        assert!(schema_json.contains("financials"));
        assert!(schema_json.contains("income_statement"));
    }

    #[test]
    fn test_kind_strings() {
        let json = serde_json::to_string(&LineItemKind::CashFlowOperating).unwrap();
        assert_eq!(json, "\"Operating Cash Flow Item\"");
        let kind: LineItemKind = serde_json::from_str("\"Dividends Paid\"").unwrap();
        assert_eq!(kind, LineItemKind::Dividend);
        assert_eq!(LineItemKind::CashFlowSummary.as_str(), "Net Cash Flow (Summary)");
    }

    #[test]
    fn test_statement_document_keeps_insertion_order() {
        let json = r#"{
            "Revenue": {"type": "Revenue", "historical": {"2023": 1000.0}},
            "COGS": {"type": "Expense", "historical": {"2023": 600.0}, "forecasted": {}},
            "Assets": {"type": "Asset"}
        }"#;

        let statement: StatementDocument = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = statement.0.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Revenue", "COGS", "Assets"]);
        assert!(statement.0[2].1.historical.is_empty());

        let out = serde_json::to_string(&statement).unwrap();
        let revenue_pos = out.find("Revenue").unwrap();
        let cogs_pos = out.find("COGS").unwrap();
        assert!(revenue_pos < cogs_pos);
    }
}

use crate::error::Result;
use crate::kpi::KpiRegistry;
use crate::line_item::{LineItem, PeriodValues};
use crate::schema::{CompanyDocument, FinancialsDocument, StatementKind};
use crate::statement::Statement;
use log::{debug, info};
use std::path::Path;

/// A company and its five financial statements.
///
/// Owns every statement exclusively; `clone()` produces an independent deep
/// copy, which is what scenario runs mutate.
#[derive(Debug, Clone)]
pub struct Company {
    pub name: String,
    pub ticker: String,
    pub currency: String,
    pub description: Option<String>,
    income_statement: Statement,
    balance_sheet: Statement,
    cash_flow_statement: Statement,
    kpi_statement: Statement,
    other_financials_statement: Statement,
    kpis: KpiRegistry,
}

/// The statement data of a company at one point in time.
///
/// KPI definitions are not part of a snapshot; restoring keeps the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanySnapshot {
    statements: Vec<Statement>,
}

impl Company {
    pub fn new(name: &str, ticker: &str, currency: &str) -> Self {
        Self {
            name: name.to_string(),
            ticker: ticker.to_string(),
            currency: currency.to_string(),
            description: None,
            income_statement: Statement::new(StatementKind::Income),
            balance_sheet: Statement::new(StatementKind::Balance),
            cash_flow_statement: Statement::new(StatementKind::CashFlow),
            kpi_statement: Statement::new(StatementKind::Kpi),
            other_financials_statement: Statement::new(StatementKind::OtherFinancials),
            kpis: KpiRegistry::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn statement(&self, kind: StatementKind) -> &Statement {
        match kind {
            StatementKind::Income => &self.income_statement,
            StatementKind::Balance => &self.balance_sheet,
            StatementKind::CashFlow => &self.cash_flow_statement,
            StatementKind::Kpi => &self.kpi_statement,
            StatementKind::OtherFinancials => &self.other_financials_statement,
        }
    }

    pub fn statement_mut(&mut self, kind: StatementKind) -> &mut Statement {
        match kind {
            StatementKind::Income => &mut self.income_statement,
            StatementKind::Balance => &mut self.balance_sheet,
            StatementKind::CashFlow => &mut self.cash_flow_statement,
            StatementKind::Kpi => &mut self.kpi_statement,
            StatementKind::OtherFinancials => &mut self.other_financials_statement,
        }
    }

    pub fn income_statement(&self) -> &Statement {
        &self.income_statement
    }

    pub fn income_statement_mut(&mut self) -> &mut Statement {
        &mut self.income_statement
    }

    pub fn balance_sheet(&self) -> &Statement {
        &self.balance_sheet
    }

    pub fn balance_sheet_mut(&mut self) -> &mut Statement {
        &mut self.balance_sheet
    }

    pub fn cash_flow_statement(&self) -> &Statement {
        &self.cash_flow_statement
    }

    pub fn cash_flow_statement_mut(&mut self) -> &mut Statement {
        &mut self.cash_flow_statement
    }

    pub fn kpi_statement(&self) -> &Statement {
        &self.kpi_statement
    }

    pub fn kpi_statement_mut(&mut self) -> &mut Statement {
        &mut self.kpi_statement
    }

    pub fn other_financials_statement(&self) -> &Statement {
        &self.other_financials_statement
    }

    pub fn other_financials_statement_mut(&mut self) -> &mut Statement {
        &mut self.other_financials_statement
    }

    /// Places an item on the statement its kind belongs to.
    pub fn add_item(&mut self, item: LineItem) {
        let kind = item.kind.default_statement();
        self.statement_mut(kind).add_item(item);
    }

    /// First item with this (sanitized) name, searching income statement,
    /// balance sheet, cash flow, KPI and other financials in that order.
    pub fn find_item(&self, name: &str) -> Option<&LineItem> {
        StatementKind::SEARCH_ORDER
            .iter()
            .find_map(|kind| self.statement(*kind).get_item(name))
    }

    pub fn find_item_mut(&mut self, name: &str) -> Option<&mut LineItem> {
        let kind = StatementKind::SEARCH_ORDER
            .into_iter()
            .find(|kind| self.statement(*kind).get_item(name).is_some())?;
        self.statement_mut(kind).get_item_mut(name)
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        StatementKind::SEARCH_ORDER
            .into_iter()
            .map(move |kind| self.statement(kind))
    }

    pub fn clear_forecasts(&mut self) {
        for kind in StatementKind::SEARCH_ORDER {
            let statement = self.statement_mut(kind);
            let names: Vec<String> = statement.items().map(|item| item.name.clone()).collect();
            for name in names {
                if let Some(item) = statement.get_item_mut(&name) {
                    item.clear_forecast();
                }
            }
        }
    }

    pub fn snapshot(&self) -> CompanySnapshot {
        CompanySnapshot {
            statements: self.statements().cloned().collect(),
        }
    }

    pub fn restore(&mut self, snapshot: CompanySnapshot) {
        for statement in snapshot.statements {
            let kind = statement.kind();
            *self.statement_mut(kind) = statement;
        }
    }

    pub fn kpis(&self) -> &KpiRegistry {
        &self.kpis
    }

    pub fn kpis_mut(&mut self) -> &mut KpiRegistry {
        &mut self.kpis
    }

    pub fn add_kpi(&mut self, name: &str, formula: &str) -> Result<()> {
        self.kpis.add_kpi(name, formula)
    }

    pub fn add_percentage_change_kpi(
        &mut self,
        name: &str,
        base_item: &str,
        lookback: usize,
    ) -> Result<()> {
        self.kpis.add_percentage_change_kpi(name, base_item, lookback)
    }

    pub fn calculate_kpi(&self, name: &str) -> Result<PeriodValues> {
        self.kpis.calculate(name, self)
    }

    /// Problems found across all statements; empty when consistent.
    pub fn validate(&self) -> Vec<String> {
        self.statements()
            .flat_map(|statement| statement.validate())
            .collect()
    }

    pub fn to_document(&self) -> CompanyDocument {
        let mut financials = FinancialsDocument::default();
        for statement in self.statements() {
            *financials.statement_mut(statement.kind()) = statement.to_document();
        }

        CompanyDocument {
            name: self.name.clone(),
            ticker: self.ticker.clone(),
            currency: self.currency.clone(),
            description: self.description.clone(),
            financials,
        }
    }

    pub fn from_document(document: CompanyDocument) -> Self {
        let mut company = Self::new(&document.name, &document.ticker, &document.currency);
        company.description = document.description;

        let mut financials = document.financials;
        for kind in StatementKind::SEARCH_ORDER {
            let statement = std::mem::take(financials.statement_mut(kind));
            *company.statement_mut(kind) = Statement::from_document(kind, statement);
        }

        company
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: CompanyDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document))
    }

    pub fn save_to_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        info!("Saving {} ({}) to {}", self.name, self.ticker, path.display());
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn load_from_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading company from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let company = Self::from_json_str(&contents)?;
        debug!(
            "Loaded {} with {} line items",
            company.name,
            company.statements().map(Statement::len).sum::<usize>()
        );
        Ok(company)
    }
}

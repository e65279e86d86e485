use crate::company::Company;
use crate::error::{ModelError, Result};
use crate::expression::Expression;
use crate::line_item::PeriodValues;
use crate::period::Period;
use crate::schema::StatementKind;
use crate::utils::round_to;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Per-period KPI callable. An `Err` for a period drops that period from the result.
pub type KpiFn = Arc<dyn Fn(&Company, &str) -> Result<f64> + Send + Sync>;

#[derive(Clone)]
pub enum KpiDefinition {
    /// Arithmetic over line item names, e.g. `"NetProfit / Revenue * 100"`.
    Formula(Expression),
    /// `(current - previous) / previous * 100`, with `previous` taken `lookback` periods back.
    PercentageChange { base_item: String, lookback: usize },
    Custom(KpiFn),
}

impl fmt::Debug for KpiDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpiDefinition::Formula(expression) => {
                f.debug_tuple("Formula").field(&expression.source()).finish()
            }
            KpiDefinition::PercentageChange {
                base_item,
                lookback,
            } => f
                .debug_struct("PercentageChange")
                .field("base_item", base_item)
                .field("lookback", lookback)
                .finish(),
            KpiDefinition::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

/// KPI definitions scoped to one company.
#[derive(Debug, Clone, Default)]
pub struct KpiRegistry {
    kpis: BTreeMap<String, KpiDefinition>,
}

impl KpiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_kpi(&mut self, name: &str, formula: &str) -> Result<()> {
        self.ensure_new(name)?;
        let expression = Expression::parse(formula)?;
        self.kpis
            .insert(name.to_string(), KpiDefinition::Formula(expression));
        Ok(())
    }

    pub fn add_percentage_change_kpi(
        &mut self,
        name: &str,
        base_item: &str,
        lookback: usize,
    ) -> Result<()> {
        self.ensure_new(name)?;
        if lookback == 0 {
            return Err(ModelError::InvalidParameter(
                "percentage change lookback must be at least 1".to_string(),
            ));
        }
        self.kpis.insert(
            name.to_string(),
            KpiDefinition::PercentageChange {
                base_item: base_item.to_string(),
                lookback,
            },
        );
        Ok(())
    }

    pub fn add_custom_kpi<F>(&mut self, name: &str, function: F) -> Result<()>
    where
        F: Fn(&Company, &str) -> Result<f64> + Send + Sync + 'static,
    {
        self.ensure_new(name)?;
        self.kpis
            .insert(name.to_string(), KpiDefinition::Custom(Arc::new(function)));
        Ok(())
    }

    pub fn remove_kpi(&mut self, name: &str) -> Option<KpiDefinition> {
        self.kpis.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kpis.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&KpiDefinition> {
        self.kpis.get(name)
    }

    pub fn kpi_names(&self) -> impl Iterator<Item = &str> {
        self.kpis.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.kpis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kpis.is_empty()
    }

    /// Evaluates a KPI for every period in its period universe.
    ///
    /// Periods whose evaluation fails (division by zero, missing inputs,
    /// callable errors) are left out of the result rather than aborting.
    pub fn calculate(&self, name: &str, company: &Company) -> Result<PeriodValues> {
        let definition = self
            .kpis
            .get(name)
            .ok_or_else(|| ModelError::UndefinedKpi(name.to_string()))?;

        let results = match definition {
            KpiDefinition::Formula(expression) => evaluate_formula(name, expression, company),
            KpiDefinition::PercentageChange {
                base_item,
                lookback,
            } => base_statement_periods(company)
                .into_iter()
                .filter_map(|period| {
                    percentage_change(company, base_item, *lookback, &period)
                        .map(|value| (period, value))
                })
                .collect(),
            KpiDefinition::Custom(function) => base_statement_periods(company)
                .into_iter()
                .filter_map(|period| match function(company, &period) {
                    Ok(value) => Some((period, value)),
                    Err(e) => {
                        debug!("KPI '{}' skipped period {}: {}", name, period, e);
                        None
                    }
                })
                .collect(),
        };

        Ok(results)
    }

    pub fn calculate_all(&self, company: &Company) -> Result<BTreeMap<String, PeriodValues>> {
        self.kpis
            .keys()
            .map(|name| Ok((name.clone(), self.calculate(name, company)?)))
            .collect()
    }

    fn ensure_new(&self, name: &str) -> Result<()> {
        if self.kpis.contains_key(name) {
            return Err(ModelError::DuplicateKpi(name.to_string()));
        }
        Ok(())
    }
}

fn evaluate_formula(name: &str, expression: &Expression, company: &Company) -> PeriodValues {
    let variables = expression.variables();

    let mut periods = BTreeSet::new();
    for variable in variables {
        if let Some(item) = company.find_item(variable) {
            periods.extend(item.historical.keys().cloned());
            periods.extend(item.forecasted.keys().cloned());
        }
    }

    let mut results = BTreeMap::new();
    for period in periods {
        let outcome = expression.evaluate(|variable| match company.find_item(variable) {
            Some(item) => item.get_value(&period).unwrap_or(0.0),
            None => variable.parse::<f64>().unwrap_or(0.0),
        });

        match outcome {
            Ok(value) => {
                results.insert(period, round_to(value, 3));
            }
            Err(e) => debug!("KPI '{}' has no value for {}: {}", name, period, e),
        }
    }

    results
}

/// Every period present in the income statement, balance sheet or cash flow statement.
fn base_statement_periods(company: &Company) -> BTreeSet<String> {
    StatementKind::BASE_STATEMENTS
        .iter()
        .flat_map(|kind| company.statement(*kind).items())
        .flat_map(|item| item.historical.keys().chain(item.forecasted.keys()))
        .cloned()
        .collect()
}

fn percentage_change(
    company: &Company,
    base_item: &str,
    lookback: usize,
    period: &str,
) -> Option<f64> {
    let item = company.find_item(base_item)?;
    let previous_period = Period::parse(period).ok()?.offset(-(lookback as i64));

    let current = item.get_value(period)?;
    let previous = item.get_value(&previous_period.to_string())?;
    if previous == 0.0 {
        return None;
    }

    Some(round_to((current - previous) / previous * 100.0, 3))
}

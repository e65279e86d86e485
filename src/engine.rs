use crate::assumptions::{Assumption, AssumptionSet};
use crate::company::Company;
use crate::config::ForecastConfig;
use crate::error::{ModelError, Result};
use crate::line_item::{LineItem, PeriodValues};
use crate::period::Period;
use crate::rules::{ForecastMethod, ForecastRule, PeriodRange};
use crate::statistical::StatisticalForecaster;
use log::{debug, info};
use std::collections::BTreeSet;

/// Applies forecast rules, in the order they were added, to a company's line items.
///
/// The model borrows the company mutably for its whole lifetime; forecasted
/// values are written straight onto the company's line items.
pub struct ForecastModel<'a> {
    company: &'a mut Company,
    assumptions: AssumptionSet,
    config: ForecastConfig,
    rules: Vec<ForecastRule>,
}

impl<'a> ForecastModel<'a> {
    pub fn new(company: &'a mut Company, assumptions: AssumptionSet, config: ForecastConfig) -> Self {
        Self {
            company,
            assumptions,
            config,
            rules: Vec::new(),
        }
    }

    pub fn add_forecast_rule(&mut self, rule: ForecastRule) {
        self.rules.push(rule);
    }

    pub fn add_forecast_rules(&mut self, rules: impl IntoIterator<Item = ForecastRule>) {
        self.rules.extend(rules);
    }

    /// Registers a formula KPI on the company, e.g.
    /// `add_kpi("NetProfitMargin", "(NetProfit / Revenue) * 100")`.
    pub fn add_kpi(&mut self, name: &str, formula: &str) -> Result<()> {
        self.company.add_kpi(name, formula)
    }

    pub fn rules(&self) -> &[ForecastRule] {
        &self.rules
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.assumptions
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn company(&self) -> &Company {
        &*self.company
    }

    pub fn company_mut(&mut self) -> &mut Company {
        &mut *self.company
    }

    pub fn find_item(&self, name: &str) -> Option<&LineItem> {
        self.company.find_item(name)
    }

    /// Applies every rule in order. The first failing rule aborts the run;
    /// values written by earlier rules are kept.
    pub fn run_forecast(&mut self) -> Result<()> {
        self.config.validate()?;
        info!(
            "Running forecast for {} with {} rules over {} periods",
            self.company.name,
            self.rules.len(),
            self.config.periods
        );

        let rules = self.rules.clone();
        for rule in &rules {
            self.apply_rule(rule)?;
        }
        Ok(())
    }

    pub fn apply_rule(&mut self, rule: &ForecastRule) -> Result<()> {
        debug!(
            "Applying {} rule to '{}'",
            rule.method().tag(),
            rule.item_name()
        );

        let writes: PeriodValues = match rule.method() {
            ForecastMethod::GrowthRate {
                rate,
                schedule,
                assumption,
            } => {
                let (rate, schedule) =
                    self.resolve_growth(*rate, schedule.as_ref(), assumption.as_deref());
                let (periods, frequency) = (self.config.periods, self.config.frequency);
                let target = self.require_item_mut(rule.item_name())?;
                return target.forecast_growth(rate, schedule.as_ref(), periods, frequency);
            }

            ForecastMethod::MarginOf { base_item, margin } => {
                let applicable = self.applicable_periods(rule)?;
                scaled_forecast(self.require_item(base_item)?, &applicable, *margin)
            }

            ForecastMethod::Fixed { value } => self
                .applicable_periods(rule)?
                .into_iter()
                .map(|period| (period, *value))
                .collect(),

            ForecastMethod::LinkToItem { source_item, rate } => {
                let applicable = self.applicable_periods(rule)?;
                scaled_forecast(self.require_item(source_item)?, &applicable, *rate)
            }

            ForecastMethod::CustomFunction { function } => {
                let function = function.as_ref().ok_or_else(|| {
                    ModelError::MissingCustomFunction(rule.item_name().to_string())
                })?;
                let item = self.require_item(rule.item_name())?;
                function.call(item, self)?
            }

            ForecastMethod::Statistical(method) => {
                let applicable = self.applicable_periods(rule)?;
                let item = self.require_item(rule.item_name())?;
                StatisticalForecaster::new(item.get_all_data_sorted())
                    .forecast(method)?
                    .into_iter()
                    .filter(|(period, _)| applicable.contains(period))
                    .collect()
            }

            ForecastMethod::Kpi {
                target_item,
                adjustment_factor,
            } => {
                let applicable = self.periods_after_history(target_item, rule.period_range())?;
                let writes = self
                    .company
                    .calculate_kpi(rule.item_name())?
                    .into_iter()
                    .filter(|(period, _)| applicable.contains(period))
                    .map(|(period, value)| (period, value * adjustment_factor))
                    .collect();
                return self.write_forecast(target_item, writes);
            }
        };

        self.write_forecast(rule.item_name(), writes)
    }

    /// Period labels a range-based rule may write, stepping forward from the
    /// item's last historical period.
    pub fn applicable_periods(&self, rule: &ForecastRule) -> Result<BTreeSet<String>> {
        self.periods_after_history(rule.item_name(), rule.period_range())
    }

    /// KPI rules anchor on their target item rather than the KPI name.
    fn periods_after_history(
        &self,
        item_name: &str,
        range: Option<PeriodRange>,
    ) -> Result<BTreeSet<String>> {
        let item = self.require_item(item_name)?;
        let last = item
            .last_historical_period()
            .ok_or_else(|| ModelError::NoHistoricalData(item.name.clone()))?;
        let anchor = Period::parse(last)?;

        let (start, end) = match range {
            Some(range) => (range.start.max(1), range.end.unwrap_or(self.config.periods)),
            None => (1, self.config.periods),
        };

        Ok((start..=end)
            .map(|step| anchor.offset(step as i64).to_string())
            .collect())
    }

    fn resolve_growth(
        &self,
        rate: Option<f64>,
        schedule: Option<&PeriodValues>,
        assumption: Option<&str>,
    ) -> (Option<f64>, Option<PeriodValues>) {
        let mut rate = rate;
        let mut schedule = schedule.cloned();

        if rate.is_none() && schedule.is_none() {
            match assumption.and_then(|key| self.assumptions.get_assumption(key)) {
                Some(Assumption::Scalar(value)) => rate = Some(*value),
                Some(Assumption::PerPeriod(values)) => schedule = Some(values.clone()),
                None => {}
            }
        }

        (rate, schedule)
    }

    fn require_item(&self, name: &str) -> Result<&LineItem> {
        self.company
            .find_item(name)
            .ok_or_else(|| ModelError::ItemNotFound(name.to_string()))
    }

    fn require_item_mut(&mut self, name: &str) -> Result<&mut LineItem> {
        self.company
            .find_item_mut(name)
            .ok_or_else(|| ModelError::ItemNotFound(name.to_string()))
    }

    fn write_forecast(&mut self, name: &str, values: PeriodValues) -> Result<()> {
        let target = self.require_item_mut(name)?;
        debug!("Writing {} forecast periods to '{}'", values.len(), target.name);
        for (period, value) in values {
            target.add_forecasted(period, value);
        }
        Ok(())
    }
}

/// Forecasted values of `source` restricted to `applicable`, multiplied by `factor`.
fn scaled_forecast(source: &LineItem, applicable: &BTreeSet<String>, factor: f64) -> PeriodValues {
    source
        .forecasted
        .iter()
        .filter(|(period, _)| applicable.contains(*period))
        .map(|(period, value)| (period.clone(), value * factor))
        .collect()
}

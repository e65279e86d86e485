//! Fiscal period labels.
//!
//! Periods are stored as plain strings throughout the crate (`"2023"` or
//! `"2023Q4"`) so that maps keyed by them sort lexicographically, years first.
//! [`Period`] is the parsed form used whenever we need to step forward or
//! backward in time.

use crate::error::{ModelError, Result};
use crate::utils::last_day_of_month;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

/// Years a label may carry. Four digits keep string keys sorting chronologically.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    Annual(i32),
    Quarterly { year: i32, quarter: u32 },
}

impl Period {
    pub fn parse(label: &str) -> Result<Self> {
        label.parse()
    }

    pub fn year(&self) -> i32 {
        match self {
            Period::Annual(year) => *year,
            Period::Quarterly { year, .. } => *year,
        }
    }

    pub fn is_quarterly(&self) -> bool {
        matches!(self, Period::Quarterly { .. })
    }

    /// The period directly after this one: next year for annual labels,
    /// next quarter (rolling Q4 into Q1 of the following year) otherwise.
    pub fn next(&self) -> Self {
        self.offset(1)
    }

    /// Shifts the period by `steps` of its own frequency; negative steps go back.
    /// Years saturate at the bounds of `i32`.
    pub fn offset(&self, steps: i64) -> Self {
        match *self {
            Period::Annual(year) => Period::Annual(clamp_year(year as i64 + steps)),
            Period::Quarterly { year, quarter } => {
                let index = (year as i64 * 4 + (quarter as i64 - 1)).saturating_add(steps);
                Period::Quarterly {
                    year: clamp_year(index.div_euclid(4)),
                    quarter: index.rem_euclid(4) as u32 + 1,
                }
            }
        }
    }

    /// The calendar date the period closes on (Dec 31 for years, quarter end otherwise).
    pub fn end_date(&self) -> Result<NaiveDate> {
        let (year, month) = match *self {
            Period::Annual(year) => (year, 12),
            Period::Quarterly { year, quarter } => (year, quarter * 3),
        };
        last_day_of_month(year, month).ok_or_else(|| ModelError::InvalidPeriod(self.to_string()))
    }
}

fn clamp_year(year: i64) -> i32 {
    year.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Annual(year) => write!(f, "{}", year),
            Period::Quarterly { year, quarter } => write!(f, "{}Q{}", year, quarter),
        }
    }
}

impl FromStr for Period {
    type Err = ModelError;

    fn from_str(label: &str) -> Result<Self> {
        let invalid = || ModelError::InvalidPeriod(label.to_string());
        let trimmed = label.trim();

        let period = match trimmed.split_once('Q') {
            Some((year, quarter)) => {
                let year: i32 = year.parse().map_err(|_| invalid())?;
                let quarter: u32 = quarter.parse().map_err(|_| invalid())?;
                if !(1..=4).contains(&quarter) {
                    return Err(invalid());
                }
                Period::Quarterly { year, quarter }
            }
            None => Period::Annual(trimmed.parse().map_err(|_| invalid())?),
        };

        if !YEAR_RANGE.contains(&period.year()) {
            return Err(invalid());
        }
        Ok(period)
    }
}

/// Labels for the `count` periods following `anchor`.
pub fn periods_after(anchor: Period, count: usize) -> Vec<String> {
    (1..=count as i64)
        .map(|step| anchor.offset(step).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annual_and_quarterly() {
        assert_eq!(Period::parse("2023").unwrap(), Period::Annual(2023));
        assert_eq!(
            Period::parse("2024Q3").unwrap(),
            Period::Quarterly {
                year: 2024,
                quarter: 3
            }
        );
        assert!(Period::parse("2024Q5").is_err());
        assert!(Period::parse("FY24").is_err());
        assert!(Period::parse("").is_err());
    }

    #[test]
    fn test_out_of_range_years() {
        assert!(matches!(
            Period::parse("2147483647"),
            Err(ModelError::InvalidPeriod(ref label)) if label == "2147483647"
        ));
        assert!(Period::parse("10000Q1").is_err());
        assert!(Period::parse("-5").is_err());
        assert_eq!(Period::parse("9999").unwrap(), Period::Annual(9999));

        assert_eq!(Period::Annual(i32::MAX).offset(1), Period::Annual(i32::MAX));
        assert_eq!(Period::Annual(i32::MIN).offset(-3), Period::Annual(i32::MIN));
        assert_eq!(Period::Annual(9999).offset(2), Period::Annual(10001));
    }

    #[test]
    fn test_quarter_rollover() {
        let q4 = Period::parse("2023Q4").unwrap();
        assert_eq!(q4.next().to_string(), "2024Q1");
        assert_eq!(q4.offset(-4).to_string(), "2022Q4");
        assert_eq!(
            Period::parse("2024Q1").unwrap().offset(-1).to_string(),
            "2023Q4"
        );
        assert_eq!(Period::Annual(2023).offset(-2).to_string(), "2021");
    }

    #[test]
    fn test_periods_after() {
        assert_eq!(
            periods_after(Period::parse("2023Q3").unwrap(), 3),
            vec!["2023Q4", "2024Q1", "2024Q2"]
        );
        assert_eq!(
            periods_after(Period::Annual(2023), 2),
            vec!["2024", "2025"]
        );
    }

    #[test]
    fn test_end_date() {
        assert_eq!(
            Period::parse("2023Q1").unwrap().end_date().unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 31).unwrap()
        );
        assert_eq!(
            Period::Annual(2022).end_date().unwrap(),
            NaiveDate::from_ymd_opt(2022, 12, 31).unwrap()
        );
    }
}

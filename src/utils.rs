use chrono::{Days, NaiveDate};

/// Converts a line item name into a safe identifier:
/// - spaces and hyphens become underscores
/// - any character outside `[A-Za-z0-9_]` is dropped
/// - a leading digit is prefixed with an underscore
///
/// # Examples
/// - `"Net Income"` -> `"Net_Income"`
/// - `"EBIT-Margin (%)"` -> `"EBIT_Margin_"`
/// - `"2023 Sales"` -> `"_2023_Sales"`
pub fn sanitize_item_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    if sanitized
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
    {
        sanitized.insert(0, '_');
    }

    sanitized
}

/// Rounds half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Line item '{0}' not found in any statement")]
    ItemNotFound(String),

    #[error("No historical data for {0}")]
    NoHistoricalData(String),

    #[error("No forecasted data for {0}")]
    NoForecastData(String),

    #[error("Empty historical series: {0}")]
    EmptyHistory(String),

    #[error("Unsupported frequency: {0}")]
    UnsupportedFrequency(String),

    #[error("No growth rate or schedule entry for period {0}")]
    MissingGrowthSpecification(String),

    #[error("Custom function missing for rule on '{0}'")]
    MissingCustomFunction(String),

    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("Invalid period label '{0}': expected YYYY or YYYYQn")]
    InvalidPeriod(String),

    #[error("Invalid formula '{formula}': {details}")]
    InvalidFormula { formula: String, details: String },

    #[error("KPI '{0}' already exists.")]
    DuplicateKpi(String),

    #[error("KPI '{0}' is not defined.")]
    UndefinedKpi(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Discount rate ({discount_rate}) equals terminal growth rate ({terminal_growth_rate}); terminal value is undefined")]
    DegenerateTerminalGrowth {
        discount_rate: f64,
        terminal_growth_rate: f64,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Model fit failed ({model}): {details}")]
    FitFailed { model: String, details: String },

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

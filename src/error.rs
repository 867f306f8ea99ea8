use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum DashError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown company: {0}")]
    UnknownCompany(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Market data provider error: {0}")]
    Provider(String),

    #[error("No data available for ticker: {0}")]
    EmptyData(String),

    #[error("Insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Forecast error: {0}")]
    Forecast(String),

    #[error("Chart rendering error: {0}")]
    Chart(String),

    #[error("No API key configured (set {0})")]
    MissingApiKey(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DashError>;

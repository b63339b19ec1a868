use thiserror::Error;

/// Hard failures only. Missing or thin data is reported through the outcome
/// enums of each aggregator, never through this type.
#[derive(Debug, Error)]
pub enum InsightsError {
    #[error("report is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed report: {0}")]
    MalformedReport(String),

    #[error("unknown timezone {0:?}")]
    InvalidTimezone(String),
}

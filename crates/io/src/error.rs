use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed input: {0}")]
    Malformed(String),
}

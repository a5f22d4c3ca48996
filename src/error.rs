use thiserror::Error;

#[derive(Error, Debug)]
pub enum InvoiceAnalyticsError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Delimited parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Customer profile lookup failed: {0}")]
    ProfileLookup(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InvoiceAnalyticsError>;

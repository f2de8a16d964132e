use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The subject has no activity rows; nothing is rendered.
    #[error("no activity records for subject {0:?}")]
    NoRecordsForSubject(String),
    #[error("render backend failure: {0}")]
    RenderBackend(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("font error: {0}")]
    Font(String),
    #[error("pdf serialization error: {0}")]
    Pdf(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for ReportError {
    fn from(value: lopdf::Error) -> Self {
        ReportError::Pdf(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

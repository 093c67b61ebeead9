use thiserror::Error;

/// Every fatal composition condition surfaces as one of these.
#[derive(Debug, Error)]
pub enum FolioError {
    #[error("markup conversion failed: {0}")]
    Markup(String),
    #[error("resource '{reference}' could not be loaded: {reason}")]
    Resource { reference: String, reason: String },
    #[error("block cannot fit on any page: {0}")]
    Layout(String),
    #[error("pdf stamping failed: {0}")]
    Stamp(#[from] lopdf::Error),
    #[error("not a finished pdf document: {0}")]
    InvalidDocument(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid request: {0}")]
    Request(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FolioError>;

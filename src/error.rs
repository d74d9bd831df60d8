use crate::model::{RecordId, Series};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Operator or telemetry input rejected before anything is written.
    #[error("{0}")]
    Validation(String),
    #[error("malformed datetime: {0:?}")]
    Datetime(String),
    #[error("record {1} not found in series {0}")]
    NotFound(Series, RecordId),
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("form submission already in flight")]
    AlreadySubmitting,
    #[error("API error: {0}")]
    ApiError(String),
    #[error("invalid response ({1}): {0}")]
    InvalidResponse(String, String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("format error")]
    FormatError,
    #[error("internal error")]
    InternalError,
}

impl Error {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

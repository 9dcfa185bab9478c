use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("unsupported Prometheus result type: {0:?}")]
    UnsupportedResultType(String),

    #[error("template variable {variable:?} has a value that is neither a string nor a list of strings")]
    AmbiguousValueShape { variable: String },

    #[error("the server returned an empty response")]
    EmptyResponse,

    #[error("Prometheus query failed ({error_type}): {message}")]
    QueryFailed { error_type: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start the runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("the server returned an error ({status}): {message}")]
    Status { status: StatusCode, message: String },

    #[error("connection error: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedPayload,
    UnsupportedResultType,
    AmbiguousValueShape,
    EmptyResponse,
    QueryFailed,
    Transport,
    InvalidUrl,
    InvalidConfig,
    Runtime,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedPayload(_) => ErrorKind::MalformedPayload,
            Error::UnsupportedResultType(_) => ErrorKind::UnsupportedResultType,
            Error::AmbiguousValueShape { .. } => ErrorKind::AmbiguousValueShape,
            Error::EmptyResponse => ErrorKind::EmptyResponse,
            Error::QueryFailed { .. } => ErrorKind::QueryFailed,
            Error::Transport(_) => ErrorKind::Transport,
            Error::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Error::Runtime(_) => ErrorKind::Runtime,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::Transport(TransportError::Request(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn malformed(err: serde_json::Error) -> Error {
    Error::MalformedPayload(err.to_string())
}

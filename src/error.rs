use crate::provider::ProviderError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{debug, error};
use serde_json::json;
use sled::transaction::TransactionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A required request field is missing or malformed
    #[error("{0}")]
    Validation(String),

    /// A review points at a user or movie that does not exist
    #[error("{0}")]
    InvalidReference(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Movie provider failure: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Store(#[from] sled::Error),

    #[error("Encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password error: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(id) => Error::NotFound(format!("Movie {} not found", id)),
            other => Error::Upstream(other.to_string()),
        }
    }
}

impl From<TransactionError<Error>> for Error {
    fn from(err: TransactionError<Error>) -> Self {
        match err {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => Error::Store(err),
        }
    }
}

impl Error {
    /// Message sent to the client. Internal failures only name their kind.
    fn detail(&self) -> String {
        match self {
            Error::Store(_) => "Database error".to_owned(),
            Error::Codec(_) => "Database error".to_owned(),
            Error::Token(_) => "Token error".to_owned(),
            Error::Password(_) => "Verification error".to_owned(),
            Error::Config(_) => "Configuration error".to_owned(),
            Error::Blocking(_) => "Internal error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::InvalidReference(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Store(_)
            | Error::Codec(_)
            | Error::Token(_)
            | Error::Password(_)
            | Error::Config(_)
            | Error::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{:?}", self);
        } else {
            debug!("{}: {}", status, self);
        }
        HttpResponse::build(status).json(json!({ "detail": self.detail() }))
    }
}

use thiserror;

use manifold_core::{DocumentKey, DomainError, ErrorCode};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("sqlx error")]
    SQLXError(#[from] sqlx::Error),
    #[error("sqlx migration error")]
    SQLXMigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("sea-query error")]
    SeaQueryError(#[from] sea_query::error::Error),

    #[error("error serializing to value")]
    SerdeJsonToValueError(#[from] serde_json::Error),

    #[error("document not found: {0}")]
    NotFound(DocumentKey),
    #[error("document already exists: {0}")]
    AlreadyExists(DocumentKey),
    #[error("etag mismatch for document: {0}")]
    PreconditionFailed(DocumentKey),
}

impl From<Error> for manifold_core::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(key) => manifold_core::Error::NotFound(key.id().to_string()),
            Error::AlreadyExists(key) => DomainError::with_message(
                ErrorCode::PackageAlreadyExists,
                format!("package already exists: {}", key.id()),
            )
            .into(),
            Error::PreconditionFailed(key) => {
                manifold_core::Error::PreconditionFailed(key.id().to_string())
            }
            _ => manifold_core::Error::BackendError(format!("{e:?}")),
        }
    }
}

use std::fmt;

use serde::Serialize;
use thiserror;

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of [`ErrorCode`]s. Determines which [`Error`] variant a [`DomainError`]
/// is surfaced through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or self-contradictory request data. Always detected before the store is touched.
    InvalidInput,
    /// The package/version/installer graph does not satisfy a precondition of the operation.
    InvalidState,
    /// The operation would violate a uniqueness invariant.
    Conflict,
}

/// Stable identifiers for every domain error. The numeric value of each variant is part of the
/// wire contract and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    ValidationFailed = 1,
    InstallerDoesNotMatch = 2,
    VersionDoesNotMatch = 3,
    InvalidPackageIdentifier = 4,
    InvalidPackageVersion = 5,
    InvalidInstallerIdentifier = 6,
    MalformedBody = 7,

    VersionsIsNull = 100,
    VersionDoesNotExist = 101,
    InstallerIsNull = 102,
    InstallerDoesNotExist = 103,

    PackageAlreadyExists = 200,
    VersionAlreadyExists = 201,
    InstallerAlreadyExists = 202,
    ConcurrentModification = 203,
}

impl ErrorCode {
    #[inline]
    pub fn number(&self) -> u32 {
        *self as u32
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::InstallerDoesNotMatch
            | ErrorCode::VersionDoesNotMatch
            | ErrorCode::InvalidPackageIdentifier
            | ErrorCode::InvalidPackageVersion
            | ErrorCode::InvalidInstallerIdentifier
            | ErrorCode::MalformedBody => ErrorKind::InvalidInput,
            ErrorCode::VersionsIsNull
            | ErrorCode::VersionDoesNotExist
            | ErrorCode::InstallerIsNull
            | ErrorCode::InstallerDoesNotExist => ErrorKind::InvalidState,
            ErrorCode::PackageAlreadyExists
            | ErrorCode::VersionAlreadyExists
            | ErrorCode::InstallerAlreadyExists
            | ErrorCode::ConcurrentModification => ErrorKind::Conflict,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "record failed schema validation",
            ErrorCode::InstallerDoesNotMatch => {
                "installer identifier in body does not match the request path"
            }
            ErrorCode::VersionDoesNotMatch => {
                "package version in body does not match the request path"
            }
            ErrorCode::InvalidPackageIdentifier => "invalid package identifier",
            ErrorCode::InvalidPackageVersion => "invalid package version",
            ErrorCode::InvalidInstallerIdentifier => "invalid installer identifier",
            ErrorCode::MalformedBody => "request body could not be deserialized",
            ErrorCode::VersionsIsNull => "package has no versions",
            ErrorCode::VersionDoesNotExist => "package version does not exist",
            ErrorCode::InstallerIsNull => "package version has no installers",
            ErrorCode::InstallerDoesNotExist => "installer does not exist",
            ErrorCode::PackageAlreadyExists => "package already exists",
            ErrorCode::VersionAlreadyExists => "package version already exists",
            ErrorCode::InstallerAlreadyExists => "installer already exists",
            ErrorCode::ConcurrentModification => {
                "package was modified concurrently, retry the request"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A stable code and human readable message pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
}

impl DomainError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Error returned by [`crate::validator::ManifestValidator`] implementations.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(DomainError),

    #[error("invalid state: {0}")]
    InvalidState(DomainError),

    #[error("conflict: {0}")]
    Conflict(DomainError),

    /// The manifest document does not exist in the store.
    #[error("document not found: {0}")]
    NotFound(String),

    /// A conditional write lost against a concurrent writer.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("backend error: {0}")]
    BackendError(String),
}

impl Error {
    /// The stable [`ErrorCode`] of domain errors; `None` for store and backend failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::InvalidInput(e) | Error::InvalidState(e) | Error::Conflict(e) => Some(e.code),
            _ => None,
        }
    }
}

impl From<ErrorCode> for Error {
    fn from(code: ErrorCode) -> Error {
        DomainError::new(code).into()
    }
}

impl From<DomainError> for Error {
    fn from(e: DomainError) -> Error {
        match e.code.kind() {
            ErrorKind::InvalidInput => Error::InvalidInput(e),
            ErrorKind::InvalidState => Error::InvalidState(e),
            ErrorKind::Conflict => Error::Conflict(e),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Error {
        DomainError::with_message(e.code, e.message).into()
    }
}

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::Serialize;
use thiserror;

use manifold_core::Error as CoreError;
use manifold_core::{DomainError, ErrorCode, ErrorKind};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http invalid header name")]
    HTTPInvalidHeaderName(#[from] http::header::InvalidHeaderName),
    #[error("http invalid header value")]
    HTTPInvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("missing path parameter: {0}")]
    MissingPathParameter(&'static str),

    #[error("manifold error: {0}")]
    ManifoldCoreError(#[from] CoreError),

    #[error("internal server error")]
    InternalServerError(String),
}

impl From<DomainError> for Error {
    fn from(e: DomainError) -> Error {
        Error::ManifoldCoreError(e.into())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::ManifoldCoreError(e) => core_error_to_response(e),
            Error::MissingPathParameter(_) => {
                into_error_response(StatusCode::BAD_REQUEST, format!("{}", self))
            }
            Error::HTTPInvalidHeaderName(_) | Error::HTTPInvalidHeaderValue(_) => {
                internal_server_error(format!("{self:?}"))
            }
            Error::InternalServerError(s) => internal_server_error(s),
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    error_code: u32,
    error_message: String,
}

#[inline]
fn into_domain_error_response(e: DomainError) -> Response {
    let response = ErrorResponse {
        error_code: e.code.number(),
        error_message: e.message,
    };
    (status_code(&e.code), axum::Json(response)).into_response()
}

/// Error response for failures without an [`ErrorCode`]; the status number doubles as the code.
#[inline]
fn into_error_response(status: StatusCode, msg: String) -> Response {
    let response = ErrorResponse {
        error_code: status.as_u16().into(),
        error_message: msg,
    };
    (status, axum::Json(response)).into_response()
}

#[inline]
fn internal_server_error(detail: String) -> Response {
    tracing::warn!("{:?}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        String::from("internal server error"),
    )
        .into_response()
}

#[inline]
fn core_error_to_response(e: CoreError) -> Response {
    match e {
        CoreError::InvalidInput(d) | CoreError::InvalidState(d) | CoreError::Conflict(d) => {
            into_domain_error_response(d)
        }
        CoreError::NotFound(id) => {
            into_error_response(StatusCode::NOT_FOUND, format!("package {id} not found"))
        }
        CoreError::PreconditionFailed(id) => into_error_response(
            StatusCode::PRECONDITION_FAILED,
            format!("package {id} was modified concurrently"),
        ),
        CoreError::BackendError(s) => internal_server_error(s),
    }
}

#[inline]
pub(crate) fn status_code(c: &ErrorCode) -> StatusCode {
    match c.kind() {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidState => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::validation(ErrorCode::ValidationFailed, StatusCode::BAD_REQUEST)]
    #[case::mismatch(ErrorCode::InstallerDoesNotMatch, StatusCode::BAD_REQUEST)]
    #[case::bad_body(ErrorCode::MalformedBody, StatusCode::BAD_REQUEST)]
    #[case::versions_null(ErrorCode::VersionsIsNull, StatusCode::NOT_FOUND)]
    #[case::version_missing(ErrorCode::VersionDoesNotExist, StatusCode::NOT_FOUND)]
    #[case::installers_null(ErrorCode::InstallerIsNull, StatusCode::NOT_FOUND)]
    #[case::installer_missing(ErrorCode::InstallerDoesNotExist, StatusCode::NOT_FOUND)]
    #[case::duplicate(ErrorCode::InstallerAlreadyExists, StatusCode::CONFLICT)]
    #[case::package_exists(ErrorCode::PackageAlreadyExists, StatusCode::CONFLICT)]
    #[case::race(ErrorCode::ConcurrentModification, StatusCode::CONFLICT)]
    fn error_code_status(#[case] code: ErrorCode, #[case] expected: StatusCode) {
        assert_eq!(status_code(&code), expected);
        let response = Error::from(CoreError::from(code)).into_response();
        assert_eq!(response.status(), expected);
    }

    #[rstest]
    #[case::not_found(CoreError::NotFound("Contoso.App".to_string()), StatusCode::NOT_FOUND)]
    #[case::stale(CoreError::PreconditionFailed("Contoso.App".to_string()), StatusCode::PRECONDITION_FAILED)]
    #[case::backend(CoreError::BackendError("connection reset".to_string()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn store_error_status(#[case] e: CoreError, #[case] expected: StatusCode) {
        assert_eq!(Error::from(e).into_response().status(), expected);
    }
}

//! # Manifold HTTP
//!
//! `manifold_http` exposes the package, version and installer operations of
//! [`manifold_core::ManifestService`] as a JSON API. The router is generic over
//! [`manifold_core::ManifestStore`] and therefore works with any storage backend.
//!
//! ## Example `main.rs`
//!
//! ```rust,ignore
//! use anyhow::Result;
//!
//! use manifold_core::{ManifestService, MemoryManifestStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let service = ManifestService::new(MemoryManifestStore::new());
//!     let router = manifold_http::router(service)?;
//!
//!     axum::Server::bind(&"0.0.0.0:13030".parse()?)
//!         .serve(router.into_make_service())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
use std::collections::HashMap;
use std::str::FromStr;

use axum::body::Bytes;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, TypedHeader};
use headers::ContentType;
use http::Response as HttpResponse;
use http_body::Body;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{self, TraceLayer};

mod errors;
pub(crate) use errors::Error;
pub(crate) use errors::Result;

mod installers;
mod packages;
mod versions;

use manifold_core::{
    DomainError, ErrorCode, InstallerIdentifier, ManifestService, ManifestStore,
    PackageIdentifier, PackageVersion,
};

/// Success envelope wrapping every non-empty response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ApiData<T> {
    data: T,
}

pub(crate) fn data_response<T: Serialize>(
    status: StatusCode,
    headers: HeaderMap,
    data: T,
) -> Response {
    (status, headers, Json(ApiData { data })).into_response()
}

/// 200 with the listed records, or 204 when there are none.
pub(crate) fn list_response<T: Serialize>(items: Vec<T>) -> Response {
    if items.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    data_response(StatusCode::OK, HeaderMap::new(), items)
}

pub(crate) fn path_param<'a>(
    path_params: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str> {
    path_params
        .get(name)
        .map(String::as_str)
        .ok_or(Error::MissingPathParameter(name))
}

/// Parse an optional path parameter into one of the identifier types.
pub(crate) fn parse_param<T>(path_params: &HashMap<String, String>, name: &str) -> Result<Option<T>>
where
    T: FromStr<Err = manifold_core::Error>,
{
    match path_params.get(name) {
        None => Ok(None),
        Some(s) => Ok(Some(T::from_str(s)?)),
    }
}

/// Deserialize a JSON request body. A body sent with a content type other than
/// `application/json` is rejected.
pub(crate) fn parse_body<T: DeserializeOwned>(
    content_type: Option<TypedHeader<ContentType>>,
    bytes: &Bytes,
) -> Result<T> {
    match content_type {
        None => tracing::debug!("client neglected to include content type in header"),
        Some(TypedHeader(ct)) => {
            let ct = ct.to_string();
            let essence = ct.split(';').next().unwrap_or_default().trim();
            if !essence.eq_ignore_ascii_case("application/json") {
                return Err(DomainError::with_message(
                    ErrorCode::MalformedBody,
                    format!("unsupported content type: {ct}"),
                )
                .into());
            }
        }
    }

    let value: Value = serde_json::from_slice(bytes).map_err(malformed_body)?;
    check_identifiers(&value)?;
    serde_json::from_value(value).map_err(malformed_body)
}

fn malformed_body(e: serde_json::Error) -> Error {
    tracing::warn!("error deserializing request body: {e:?}");
    DomainError::with_message(ErrorCode::MalformedBody, format!("{e}")).into()
}

/// Validate identifier fields ahead of deserialization so that a bad identifier is reported
/// with its own error code rather than as a malformed body.
fn check_identifiers(value: &Value) -> Result<()> {
    let Value::Object(fields) = value else {
        return Ok(());
    };
    if let Some(Value::String(s)) = fields.get("PackageIdentifier") {
        PackageIdentifier::from_str(s)?;
    }
    if let Some(Value::String(s)) = fields.get("PackageVersion") {
        PackageVersion::from_str(s)?;
    }
    if let Some(Value::String(s)) = fields.get("InstallerIdentifier") {
        InstallerIdentifier::from_str(s)?;
    }
    for nested in ["Versions", "Installers"] {
        if let Some(Value::Array(items)) = fields.get(nested) {
            items.iter().try_for_each(check_identifiers)?;
        }
    }
    Ok(())
}

pub(crate) fn location_header(location: String) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, HeaderValue::from_str(&location)?);
    Ok(headers)
}

fn maybe_get_content_length(response: &HttpResponse<impl Body>) -> Option<HeaderValue> {
    response
        .body()
        .size_hint()
        .exact()
        .and_then(|size| HeaderValue::from_str(&size.to_string()).ok())
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceInfo {
    service_name: &'static str,
    version: &'static str,
    api_versions: Vec<&'static str>,
}

async fn info() -> Result<Response> {
    let info = ServiceInfo {
        service_name: "manifold",
        version: env!("CARGO_PKG_VERSION"),
        api_versions: vec!["1.0"],
    };
    Ok(data_response(StatusCode::OK, HeaderMap::new(), info))
}

/// Return an [`axum::Router`] serving the manifest API on top of `service`.
pub fn router<S: ManifestStore>(service: ManifestService<S>) -> Result<Router> {
    let app = Router::new()
        .route("/api/", get(info))
        .merge(packages::router::<S>())
        .merge(versions::router::<S>())
        .merge(installers::router::<S>())
        .with_state(service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().include_headers(true))
                .on_response(trace::DefaultOnResponse::new())
                .on_request(trace::DefaultOnRequest::new()),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_str("content-type")?,
            HeaderValue::from_str("application/json")?,
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_LENGTH,
            maybe_get_content_length,
        ));

    Ok(app)
}

use std::collections::HashMap;
use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Router, TypedHeader};
use headers::ContentType;
use http::StatusCode;

use manifold_core::{ManifestService, ManifestStore, PackageIdentifier, PackageManifest};

use super::errors::Result;
use super::{data_response, location_header, parse_body, path_param};

pub fn router<S: ManifestStore>() -> Router<ManifestService<S>> {
    Router::new()
        .route("/api/packages", post(create_package::<S>))
        .route(
            "/api/packages/:package_id",
            get(get_package::<S>).delete(delete_package::<S>),
        )
}

async fn create_package<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    content_type: Option<TypedHeader<ContentType>>,
    bytes: Bytes,
) -> Result<Response> {
    let manifest: PackageManifest = parse_body(content_type, &bytes)?;
    let stored = service.create_package(manifest).await?;

    let mut headers = location_header(format!(
        "/api/packages/{}",
        stored.manifest.package_identifier
    ))?;
    headers.insert(
        header::ETAG,
        HeaderValue::from_str(&format!("\"{}\"", stored.etag))?,
    );
    Ok(data_response(StatusCode::CREATED, headers, stored.manifest))
}

async fn get_package<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
) -> Result<Response> {
    let package = PackageIdentifier::from_str(path_param(&path_params, "package_id")?)?;
    let stored = service.get_package(&package).await?;

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        header::ETAG,
        HeaderValue::from_str(&format!("\"{}\"", stored.etag))?,
    );
    Ok(data_response(StatusCode::OK, headers, stored.manifest))
}

async fn delete_package<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
) -> Result<Response> {
    let package = PackageIdentifier::from_str(path_param(&path_params, "package_id")?)?;
    service.delete_package(&package).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

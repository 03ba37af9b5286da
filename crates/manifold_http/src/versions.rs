use std::collections::HashMap;
use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Router, TypedHeader};
use headers::ContentType;
use http::StatusCode;

use manifold_core::{ManifestService, ManifestStore, PackageIdentifier, PackageVersion, Version};

use super::errors::Result;
use super::{data_response, list_response, location_header, parse_body, parse_param, path_param};

pub fn router<S: ManifestStore>() -> Router<ManifestService<S>> {
    Router::new()
        .route(
            "/api/packages/:package_id/versions",
            get(get_versions::<S>).post(create_version::<S>),
        )
        .route(
            "/api/packages/:package_id/versions/:version",
            get(get_versions::<S>)
                .put(replace_version::<S>)
                .delete(delete_version::<S>),
        )
}

fn package(path_params: &HashMap<String, String>) -> Result<PackageIdentifier> {
    Ok(PackageIdentifier::from_str(path_param(
        path_params,
        "package_id",
    )?)?)
}

fn version(path_params: &HashMap<String, String>) -> Result<PackageVersion> {
    Ok(PackageVersion::from_str(path_param(path_params, "version")?)?)
}

async fn create_version<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
    content_type: Option<TypedHeader<ContentType>>,
    bytes: Bytes,
) -> Result<Response> {
    let package = package(&path_params)?;
    let body: Version = parse_body(content_type, &bytes)?;
    let created = service.create_version(&package, body).await?;

    let headers = location_header(format!(
        "/api/packages/{package}/versions/{}",
        created.package_version
    ))?;
    Ok(data_response(StatusCode::CREATED, headers, created))
}

async fn get_versions<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
) -> Result<Response> {
    let package = package(&path_params)?;
    let target: Option<PackageVersion> = parse_param(&path_params, "version")?;
    let versions = service.get_versions(&package, target.as_ref()).await?;
    Ok(list_response(versions))
}

async fn replace_version<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
    content_type: Option<TypedHeader<ContentType>>,
    bytes: Bytes,
) -> Result<Response> {
    let package = package(&path_params)?;
    let target = version(&path_params)?;
    let body: Version = parse_body(content_type, &bytes)?;
    let replaced = service.replace_version(&package, &target, body).await?;
    Ok(data_response(StatusCode::OK, HeaderMap::new(), replaced))
}

async fn delete_version<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
) -> Result<Response> {
    let package = package(&path_params)?;
    let target = version(&path_params)?;
    service.delete_version(&package, &target).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

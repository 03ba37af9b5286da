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

use manifold_core::{
    Installer, InstallerIdentifier, ManifestService, ManifestStore, PackageIdentifier,
    PackageVersion,
};

use super::errors::Result;
use super::{data_response, list_response, location_header, parse_body, parse_param, path_param};

pub fn router<S: ManifestStore>() -> Router<ManifestService<S>> {
    Router::new()
        .route(
            "/api/packages/:package_id/versions/:version/installers",
            get(get_installers::<S>).post(create_installer::<S>),
        )
        .route(
            "/api/packages/:package_id/versions/:version/installers/:installer_id",
            get(get_installers::<S>)
                .put(replace_installer::<S>)
                .delete(delete_installer::<S>),
        )
}

/// Package and version named by the request path.
fn locate(path_params: &HashMap<String, String>) -> Result<(PackageIdentifier, PackageVersion)> {
    let package = PackageIdentifier::from_str(path_param(path_params, "package_id")?)?;
    let version = PackageVersion::from_str(path_param(path_params, "version")?)?;
    Ok((package, version))
}

fn installer_id(path_params: &HashMap<String, String>) -> Result<InstallerIdentifier> {
    Ok(InstallerIdentifier::from_str(path_param(
        path_params,
        "installer_id",
    )?)?)
}

async fn create_installer<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
    content_type: Option<TypedHeader<ContentType>>,
    bytes: Bytes,
) -> Result<Response> {
    let (package, version) = locate(&path_params)?;
    let body: Installer = parse_body(content_type, &bytes)?;
    let created = service.create_installer(&package, &version, body).await?;

    let headers = location_header(format!(
        "/api/packages/{package}/versions/{version}/installers/{}",
        created.installer_identifier
    ))?;
    Ok(data_response(StatusCode::CREATED, headers, created))
}

async fn get_installers<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
) -> Result<Response> {
    let (package, version) = locate(&path_params)?;
    let target: Option<InstallerIdentifier> = parse_param(&path_params, "installer_id")?;
    let installers = service
        .get_installers(&package, &version, target.as_ref())
        .await?;
    Ok(list_response(installers))
}

async fn replace_installer<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
    content_type: Option<TypedHeader<ContentType>>,
    bytes: Bytes,
) -> Result<Response> {
    let (package, version) = locate(&path_params)?;
    let target = installer_id(&path_params)?;
    let body: Installer = parse_body(content_type, &bytes)?;
    let replaced = service
        .replace_installer(&package, &version, &target, body)
        .await?;
    Ok(data_response(StatusCode::OK, HeaderMap::new(), replaced))
}

async fn delete_installer<S: ManifestStore>(
    State(service): State<ManifestService<S>>,
    Path(path_params): Path<HashMap<String, String>>,
) -> Result<Response> {
    let (package, version) = locate(&path_params)?;
    let target = installer_id(&path_params)?;
    service.delete_installer(&package, &version, &target).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

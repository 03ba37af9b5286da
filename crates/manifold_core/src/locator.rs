//! Locating versions inside an already fetched manifest.
use crate::errors::{DomainError, ErrorCode, Result};
use crate::identifiers::{PackageIdentifier, PackageVersion};
use crate::keyed_set::KeyedSet;
use crate::types::{PackageManifest, Version};

pub fn versions(manifest: &PackageManifest) -> Result<&KeyedSet<Version>> {
    manifest
        .versions
        .as_ref()
        .ok_or_else(|| versions_is_null(&manifest.package_identifier))
}

pub fn versions_mut(manifest: &mut PackageManifest) -> Result<&mut KeyedSet<Version>> {
    let PackageManifest {
        package_identifier,
        versions,
        ..
    } = manifest;
    versions
        .as_mut()
        .ok_or_else(|| versions_is_null(package_identifier))
}

pub fn version<'m>(manifest: &'m PackageManifest, version: &PackageVersion) -> Result<&'m Version> {
    versions(manifest)?
        .get(version)
        .ok_or_else(|| version_does_not_exist(&manifest.package_identifier, version))
}

/// Mutable access to a located version. The version string of the returned record must not be
/// modified.
pub fn version_mut<'m>(
    manifest: &'m mut PackageManifest,
    version: &PackageVersion,
) -> Result<&'m mut Version> {
    let PackageManifest {
        package_identifier,
        versions,
        ..
    } = manifest;
    versions
        .as_mut()
        .ok_or_else(|| versions_is_null(package_identifier))?
        .get_mut(version)
        .ok_or_else(|| version_does_not_exist(package_identifier, version))
}

fn versions_is_null(package: &PackageIdentifier) -> crate::Error {
    DomainError::with_message(
        ErrorCode::VersionsIsNull,
        format!("package {package} has no versions"),
    )
    .into()
}

fn version_does_not_exist(package: &PackageIdentifier, version: &PackageVersion) -> crate::Error {
    DomainError::with_message(
        ErrorCode::VersionDoesNotExist,
        format!("version {version} does not exist for package {package}"),
    )
    .into()
}

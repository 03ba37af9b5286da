//! In-memory edits of version and installer sets.
//!
//! Every function here operates on a document already fetched by the caller. Nothing is written
//! back if an edit fails, so a rejected edit never leaves a partially modified document behind.
use crate::errors::{DomainError, ErrorCode, Result};
use crate::identifiers::{InstallerIdentifier, PackageVersion};
use crate::keyed_set::KeyedSet;
use crate::locator;
use crate::types::{Installer, PackageManifest, Version};

/// Add an installer to a version, allocating the installer set if it is null.
pub fn insert_installer(version: &mut Version, installer: Installer) -> Result<()> {
    let installers = version.installers.get_or_insert_with(KeyedSet::new);
    installers.insert(installer).map_err(|rejected| {
        DomainError::with_message(
            ErrorCode::InstallerAlreadyExists,
            format!(
                "installer {} already exists for version {}",
                rejected.installer_identifier, version.package_version
            ),
        )
        .into()
    })
}

/// Swap in `installer` for the installer identified by `target`.
pub fn replace_installer(
    version: &mut Version,
    target: &InstallerIdentifier,
    installer: Installer,
) -> Result<()> {
    ensure_installer_matches(target, &installer)?;
    let installers = installers_mut(version)?;
    installers
        .replace(installer)
        .map(|_| ())
        .map_err(|_| installer_does_not_exist(target))
}

pub fn remove_installer(version: &mut Version, target: &InstallerIdentifier) -> Result<Installer> {
    installers_mut(version)?
        .remove(target)
        .ok_or_else(|| installer_does_not_exist(target))
}

/// All installers of a version, or only the one identified by `target`.
pub fn query_installers(
    version: &Version,
    target: Option<&InstallerIdentifier>,
) -> Result<Vec<Installer>> {
    match target {
        None => version
            .installers
            .as_ref()
            .map(|installers| installers.iter().cloned().collect())
            .ok_or_else(|| installer_is_null(&version.package_version)),
        // a null set simply has no match
        Some(target) => version
            .installers
            .as_ref()
            .and_then(|installers| installers.get(target))
            .cloned()
            .map(|i| vec![i])
            .ok_or_else(|| installer_does_not_exist(target)),
    }
}

/// Reject an installer body whose identifier differs from the identifier in the request path.
pub fn ensure_installer_matches(target: &InstallerIdentifier, installer: &Installer) -> Result<()> {
    if &installer.installer_identifier != target {
        return Err(DomainError::with_message(
            ErrorCode::InstallerDoesNotMatch,
            format!(
                "installer identifier {} does not match {}",
                installer.installer_identifier, target
            ),
        )
        .into());
    }
    Ok(())
}

/// Add a version to a manifest, allocating the version set if it is null.
pub fn insert_version(manifest: &mut PackageManifest, version: Version) -> Result<()> {
    let package = manifest.package_identifier.clone();
    let versions = manifest.versions.get_or_insert_with(KeyedSet::new);
    versions.insert(version).map_err(|rejected| {
        DomainError::with_message(
            ErrorCode::VersionAlreadyExists,
            format!(
                "version {} already exists for package {package}",
                rejected.package_version
            ),
        )
        .into()
    })
}

pub fn replace_version(
    manifest: &mut PackageManifest,
    target: &PackageVersion,
    version: Version,
) -> Result<()> {
    ensure_version_matches(target, &version)?;
    // resolve through the locator so both failure modes carry their usual codes
    locator::version(manifest, target)?;
    locator::versions_mut(manifest)?
        .replace(version)
        .map(|_| ())
        .map_err(|_| ErrorCode::VersionDoesNotExist.into())
}

pub fn remove_version(manifest: &mut PackageManifest, target: &PackageVersion) -> Result<Version> {
    locator::version(manifest, target)?;
    locator::versions_mut(manifest)?
        .remove(target)
        .ok_or_else(|| ErrorCode::VersionDoesNotExist.into())
}

pub fn query_versions(
    manifest: &PackageManifest,
    target: Option<&PackageVersion>,
) -> Result<Vec<Version>> {
    match target {
        None => Ok(locator::versions(manifest)?.iter().cloned().collect()),
        Some(target) => Ok(vec![locator::version(manifest, target)?.clone()]),
    }
}

pub fn ensure_version_matches(target: &PackageVersion, version: &Version) -> Result<()> {
    if &version.package_version != target {
        return Err(DomainError::with_message(
            ErrorCode::VersionDoesNotMatch,
            format!(
                "package version {} does not match {}",
                version.package_version, target
            ),
        )
        .into());
    }
    Ok(())
}

fn installers_mut(version: &mut Version) -> Result<&mut KeyedSet<Installer>> {
    let Version {
        package_version,
        installers,
        ..
    } = version;
    installers
        .as_mut()
        .ok_or_else(|| installer_is_null(package_version))
}

fn installer_is_null(version: &PackageVersion) -> crate::Error {
    DomainError::with_message(
        ErrorCode::InstallerIsNull,
        format!("version {version} has no installers"),
    )
    .into()
}

fn installer_does_not_exist(target: &InstallerIdentifier) -> crate::Error {
    DomainError::with_message(
        ErrorCode::InstallerDoesNotExist,
        format!("installer {target} does not exist"),
    )
    .into()
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::ValidationError;
use crate::identifiers::is_sha256_hex;
use crate::types::{Installer, PackageManifest, Version};

/// Schema validation of request bodies. Runs before any store access.
pub trait ManifestValidator: Send + Sync + 'static {
    fn validate_installer(&self, installer: &Installer) -> Result<(), ValidationError>;

    fn validate_version(&self, version: &Version) -> Result<(), ValidationError> {
        if let Some(installers) = &version.installers {
            for installer in installers.iter() {
                self.validate_installer(installer)?;
            }
        }
        Ok(())
    }

    fn validate_manifest(&self, manifest: &PackageManifest) -> Result<(), ValidationError> {
        if let Some(versions) = &manifest.versions {
            for version in versions.iter() {
                self.validate_version(version)?;
            }
        }
        Ok(())
    }
}

const ARCHITECTURES: &[&str] = &["x86", "x64", "arm", "arm64", "neutral"];
const INSTALLER_TYPES: &[&str] = &[
    "msix", "msi", "appx", "exe", "zip", "inno", "nullsoft", "wix", "burn", "pwa", "portable",
];
const SCOPES: &[&str] = &["user", "machine"];
const MAX_URL_LENGTH: usize = 2048;

static INSTALLER_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://[^\s]+$").unwrap());

/// Default [`ManifestValidator`] enforcing the installer schema of the package manifest format.
#[derive(Clone, Debug, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    fn required_str<'a>(installer: &'a Installer, field: &str) -> Result<&'a str, ValidationError> {
        match installer.fields.get(field) {
            None | Some(Value::Null) => Err(ValidationError::new(format!("{field} is required"))),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(ValidationError::new(format!("{field} must be a string"))),
        }
    }

    fn optional_str<'a>(
        installer: &'a Installer,
        field: &str,
    ) -> Result<Option<&'a str>, ValidationError> {
        match installer.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ValidationError::new(format!("{field} must be a string"))),
        }
    }

    fn one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), ValidationError> {
        if allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
            Ok(())
        } else {
            Err(ValidationError::new(format!(
                "{field} must be one of {}, got {value:?}",
                allowed.join(", ")
            )))
        }
    }
}

impl ManifestValidator for SchemaValidator {
    fn validate_installer(&self, installer: &Installer) -> Result<(), ValidationError> {
        let sha256 = Self::required_str(installer, "InstallerSha256")?;
        if !is_sha256_hex(sha256) {
            return Err(ValidationError::new(
                "InstallerSha256 must be a hex encoded sha256 digest",
            ));
        }

        let url = Self::required_str(installer, "InstallerUrl")?;
        if url.len() > MAX_URL_LENGTH {
            return Err(ValidationError::new(format!(
                "InstallerUrl must be at most {MAX_URL_LENGTH} characters"
            )));
        }
        if !INSTALLER_URL_RE.is_match(url) {
            return Err(ValidationError::new("InstallerUrl must be an http(s) url"));
        }

        let architecture = Self::required_str(installer, "Architecture")?;
        Self::one_of("Architecture", architecture, ARCHITECTURES)?;

        if let Some(installer_type) = Self::optional_str(installer, "InstallerType")? {
            Self::one_of("InstallerType", installer_type, INSTALLER_TYPES)?;
        }
        if let Some(scope) = Self::optional_str(installer, "Scope")? {
            Self::one_of("Scope", scope, SCOPES)?;
        }

        Ok(())
    }
}

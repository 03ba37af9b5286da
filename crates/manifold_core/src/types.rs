use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::{InstallerIdentifier, PackageIdentifier, PackageVersion};
use crate::keyed_set::{Keyed, KeyedSet};

/// The document stored for a single package.
///
/// `versions` is `None` when the document carries no (or a `null`) `Versions` field, which is a
/// distinct state from an empty version set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageManifest {
    pub package_identifier: PackageIdentifier,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<KeyedSet<Version>>,

    /// Remaining top-level fields (`id`, `Moniker`, ...), kept verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl PackageManifest {
    pub fn new(package_identifier: PackageIdentifier) -> Self {
        Self {
            package_identifier,
            versions: None,
            fields: Map::new(),
        }
    }
}

/// A named release of a package.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Version {
    pub package_version: PackageVersion,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installers: Option<KeyedSet<Installer>>,

    /// Remaining version fields (`DefaultLocale`, `Locales`, ...), kept verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Version {
    pub fn new(package_version: PackageVersion) -> Self {
        Self {
            package_version,
            installers: None,
            fields: Map::new(),
        }
    }
}

impl Keyed for Version {
    type Key = PackageVersion;

    fn key(&self) -> &PackageVersion {
        &self.package_version
    }
}

/// A content addressed description of one installable artifact of a version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Installer {
    pub installer_identifier: InstallerIdentifier,

    /// Descriptive installer fields (`InstallerUrl`, `Architecture`, ...), checked by a
    /// [`crate::validator::ManifestValidator`] and otherwise kept verbatim.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Installer {
    /// String value of a descriptive field, if present and a string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

impl Keyed for Installer {
    type Key = InstallerIdentifier;

    fn key(&self) -> &InstallerIdentifier {
        &self.installer_identifier
    }
}

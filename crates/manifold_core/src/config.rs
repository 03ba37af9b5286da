use serde::Deserialize;

/// Configuration struct defining a package (and optionally some of its versions) initialized at
/// program startup if it doesn't already exist.
#[derive(Clone, Debug, Deserialize)]
pub struct PackageDefinition {
    /// Identifier of the package to initialize.
    pub identifier: String,

    /// Versions to add to the package, without installers.
    #[serde(default)]
    pub versions: Vec<String>,
}

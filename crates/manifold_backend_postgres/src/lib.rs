//! Postgres implementation of [`manifold_core::ManifestStore`].
mod config;
mod errors;
mod manifests;
mod types;

pub use config::PgManifestStoreConfig;
pub use errors::Error;
pub use manifests::PgManifestStore;

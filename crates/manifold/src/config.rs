use std::net::SocketAddr;

use serde::Deserialize;

use manifold_backend_postgres::PgManifestStoreConfig;
use manifold_core::{PackageDefinition, DEFAULT_MAX_WRITE_ATTEMPTS};

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 13030))
}

fn default_max_write_attempts() -> usize {
    DEFAULT_MAX_WRITE_ATTEMPTS
}

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: usize,
    pub backend: ManifestBackend,
    pub static_packages: Option<Vec<PackageDefinition>>,
}

#[derive(Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ManifestBackend {
    Postgres(PgManifestStoreConfig),
    Memory,
}

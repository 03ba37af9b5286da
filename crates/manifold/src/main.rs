use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use manifold_core::{ManifestService, ManifestStore, MemoryManifestStore, PackageDefinition};

mod config;
use crate::config::{Config, ManifestBackend};

#[derive(Parser)]
struct Cli {
    #[arg(short, long)]
    config_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(true)
        .compact()
        .init();

    // load configuration
    let mut dev_config = File::open(cli.config_file.unwrap_or("./dev-config.yml".into()))?;
    let mut s = String::new();
    dev_config.read_to_string(&mut s)?;
    let config: Config = serde_yaml::from_str(&s)?;

    let static_packages = config.static_packages.unwrap_or_default();

    // initialize persistence layer
    match config.backend {
        ManifestBackend::Postgres(cfg) => {
            let store = cfg.new_store().await?;
            serve(
                store,
                config.max_write_attempts,
                static_packages,
                config.listen_address,
            )
            .await
        }
        ManifestBackend::Memory => {
            tracing::warn!("using in-memory backend, manifests will not outlive the process");
            serve(
                MemoryManifestStore::new(),
                config.max_write_attempts,
                static_packages,
                config.listen_address,
            )
            .await
        }
    }
}

async fn serve<S: ManifestStore>(
    store: S,
    max_write_attempts: usize,
    static_packages: Vec<PackageDefinition>,
    listen_address: SocketAddr,
) -> Result<()> {
    let service = ManifestService::new(store).with_max_write_attempts(max_write_attempts);

    service.initialize_static_packages(static_packages).await?;

    let router = match manifold_http::router(service) {
        Err(e) => return Err(e.into()),
        Ok(r) => r,
    };

    // run HTTP server
    tracing::info!("listening on {listen_address}");
    axum::Server::bind(&listen_address)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;

use super::errors::Result;
use super::manifests::PgManifestStore;

fn default_run_migrations() -> bool {
    true
}

#[derive(Clone, Deserialize)]
pub struct PgManifestStoreConfig {
    connection_string: String,

    #[serde(default = "default_run_migrations")]
    run_migrations: bool,

    #[serde(default)]
    max_connections: Option<u32>,
}

impl PgManifestStoreConfig {
    pub async fn new_store(&self) -> Result<PgManifestStore> {
        let mut options = PgPoolOptions::new();
        if let Some(max) = self.max_connections {
            options = options.max_connections(max);
        }
        let pool = options.connect(&self.connection_string).await?;

        if self.run_migrations {
            tracing::info!("running database migrations");
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        Ok(PgManifestStore::new(pool))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config: PgManifestStoreConfig =
            serde_json::from_str(r#"{"connection_string": "postgres://localhost/manifold"}"#)
                .unwrap();
        assert!(config.run_migrations);
        assert_eq!(config.max_connections, None);
    }
}

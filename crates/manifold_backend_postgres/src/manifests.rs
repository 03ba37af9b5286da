use async_trait::async_trait;
use sea_query::{Alias, Expr, PostgresQueryBuilder, Query, Value};
use sea_query_binder::{SqlxBinder, SqlxValues};
use sqlx::pool::PoolConnection;
use sqlx::postgres::Postgres;
use sqlx::{PgConnection, Pool, Row};

use manifold_core::{DocumentKey, ETag, ManifestStore, PackageManifest, StoredManifest};

use super::errors::{Error, Result};
use super::types::{ManifestRow, PackageManifests};

/// [`ManifestStore`] keeping each manifest document in a JSONB column of the `package_manifests`
/// table.
#[derive(Clone)]
pub struct PgManifestStore {
    pool: Pool<Postgres>,
}

impl PgManifestStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<PoolConnection<Postgres>> {
        Ok(self.pool.acquire().await?)
    }
}

#[async_trait]
impl ManifestStore for PgManifestStore {
    type Error = Error;

    async fn get(&self, key: &DocumentKey) -> Result<StoredManifest> {
        let mut conn = self.get_conn().await?;
        match Queries::get_manifest(&mut conn, key).await? {
            Some(row) => Ok(row.into()),
            None => Err(Error::NotFound(key.clone())),
        }
    }

    async fn create(&self, manifest: &PackageManifest) -> Result<StoredManifest> {
        let key = DocumentKey::from(&manifest.package_identifier);
        let etag = ETag::generate();
        let mut conn = self.get_conn().await?;
        Queries::insert_manifest(&mut conn, &key, &etag, manifest).await?;
        Ok(StoredManifest {
            manifest: manifest.clone(),
            etag,
        })
    }

    async fn replace(&self, manifest: &PackageManifest, if_match: &ETag) -> Result<StoredManifest> {
        let key = DocumentKey::from(&manifest.package_identifier);
        let etag = ETag::generate();
        let mut conn = self.get_conn().await?;
        if Queries::replace_manifest(&mut conn, &key, if_match, &etag, manifest).await? {
            return Ok(StoredManifest {
                manifest: manifest.clone(),
                etag,
            });
        }
        // nothing updated: either the document is gone or its etag moved on
        if Queries::manifest_exists(&mut conn, &key).await? {
            tracing::debug!("etag {if_match} is stale for document {key}");
            Err(Error::PreconditionFailed(key))
        } else {
            Err(Error::NotFound(key))
        }
    }

    async fn delete(&self, key: &DocumentKey) -> Result<()> {
        let mut conn = self.get_conn().await?;
        if Queries::delete_manifest(&mut conn, key).await? {
            Ok(())
        } else {
            Err(Error::NotFound(key.clone()))
        }
    }
}

// A collection of queries that only require a `&mut PgConnection` and don't care whether it came
// from a transaction or a pool connection.
struct Queries {}

impl Queries {
    fn select_statement(key: &DocumentKey) -> (String, SqlxValues) {
        Query::select()
            .from(PackageManifests::Table)
            .columns([PackageManifests::Etag, PackageManifests::Document])
            .and_where(Expr::col(PackageManifests::PartitionKey).eq(key.partition_key()))
            .and_where(Expr::col(PackageManifests::Id).eq(key.id()))
            .build_sqlx(PostgresQueryBuilder)
    }

    fn replace_statement(
        key: &DocumentKey,
        if_match: &ETag,
        etag: &ETag,
        document: serde_json::Value,
    ) -> (String, SqlxValues) {
        Query::update()
            .table(PackageManifests::Table)
            .value(PackageManifests::Etag, etag.as_str())
            .value(PackageManifests::Document, document)
            .and_where(Expr::col(PackageManifests::PartitionKey).eq(key.partition_key()))
            .and_where(Expr::col(PackageManifests::Id).eq(key.id()))
            .and_where(Expr::col(PackageManifests::Etag).eq(if_match.as_str()))
            .build_sqlx(PostgresQueryBuilder)
    }

    pub async fn get_manifest(
        executor: &mut PgConnection,
        key: &DocumentKey,
    ) -> Result<Option<ManifestRow>> {
        let (sql, values) = Self::select_statement(key);
        Ok(sqlx::query_as_with::<_, ManifestRow, _>(&sql, values)
            .fetch_optional(executor)
            .await?)
    }

    pub async fn manifest_exists(executor: &mut PgConnection, key: &DocumentKey) -> Result<bool> {
        let (sql, values) = Query::select()
            .expr_as(
                Expr::exists(
                    Query::select()
                        .from(PackageManifests::Table)
                        .column(PackageManifests::Id)
                        .and_where(
                            Expr::col(PackageManifests::PartitionKey).eq(key.partition_key()),
                        )
                        .and_where(Expr::col(PackageManifests::Id).eq(key.id()))
                        .to_owned(),
                ),
                Alias::new("exists"),
            )
            .build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(&sql, values).fetch_one(executor).await?;

        Ok(row.try_get("exists")?)
    }

    pub async fn insert_manifest(
        executor: &mut PgConnection,
        key: &DocumentKey,
        etag: &ETag,
        manifest: &PackageManifest,
    ) -> Result<()> {
        let document = serde_json::value::to_value(manifest)?;
        let (sql, values) = Query::insert()
            .into_table(PackageManifests::Table)
            .columns([
                PackageManifests::Id,
                PackageManifests::PartitionKey,
                PackageManifests::Etag,
                PackageManifests::Document,
            ])
            .values([
                Value::from(key.id()).into(),
                Value::from(key.partition_key()).into(),
                Value::from(etag.as_str()).into(),
                Value::from(document).into(),
            ])?
            .build_sqlx(PostgresQueryBuilder);

        match sqlx::query_with(&sql, values).execute(executor).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(dberr)) => match dberr.kind() {
                sqlx::error::ErrorKind::UniqueViolation => {
                    tracing::debug!("unique violation error: {dberr}");
                    Err(Error::AlreadyExists(key.clone()))
                }
                _ => Err(sqlx::Error::Database(dberr).into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Returns whether a row was updated.
    pub async fn replace_manifest(
        executor: &mut PgConnection,
        key: &DocumentKey,
        if_match: &ETag,
        etag: &ETag,
        manifest: &PackageManifest,
    ) -> Result<bool> {
        let document = serde_json::value::to_value(manifest)?;
        let (sql, values) = Self::replace_statement(key, if_match, etag, document);
        let result = sqlx::query_with(&sql, values).execute(executor).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a row was deleted.
    pub async fn delete_manifest(executor: &mut PgConnection, key: &DocumentKey) -> Result<bool> {
        let (sql, values) = Query::delete()
            .from_table(PackageManifests::Table)
            .and_where(Expr::col(PackageManifests::PartitionKey).eq(key.partition_key()))
            .and_where(Expr::col(PackageManifests::Id).eq(key.id()))
            .build_sqlx(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(executor).await?;
        Ok(result.rows_affected() > 0)
    }
}

use sea_query::Iden;
use sqlx::Row;

use manifold_core::{ETag, PackageManifest, StoredManifest};

#[derive(Iden)]
pub enum PackageManifests {
    Table,
    Id,
    PartitionKey,
    Etag,
    Document,
}

/// A row of the `package_manifests` table.
pub struct ManifestRow {
    pub etag: String,
    pub document: PackageManifest,
}

impl sqlx::FromRow<'_, sqlx_postgres::PgRow> for ManifestRow {
    fn from_row(row: &sqlx_postgres::PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            etag: row.try_get("etag")?,
            document: match serde_json::from_value(row.try_get::<serde_json::Value, &str>("document")?) {
                Ok(v) => v,
                Err(e) => {
                    return Err(sqlx::Error::ColumnDecode {
                        index: "document".to_string(),
                        source: format!("{}", e).into(),
                    })
                }
            },
        })
    }
}

impl From<ManifestRow> for StoredManifest {
    fn from(row: ManifestRow) -> StoredManifest {
        StoredManifest {
            manifest: row.document,
            etag: ETag::from(row.etag),
        }
    }
}

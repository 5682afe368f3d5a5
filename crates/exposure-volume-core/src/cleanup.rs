use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tracing::{error, info};

use crate::config::ConfigSource;
use crate::db;
use crate::error::Result;

/// Removes everything the server under test stored for the given batch tags.
#[async_trait]
pub trait Cleanup: Send + Sync {
    async fn cleanup(&self, tags: &[String]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedRows {
    pub exposures: u64,
    pub upload_batches: u64,
}

/// Deletes rows directly from the upload service's database. Credentials are
/// only resolved when there is something to delete.
#[derive(Clone)]
pub struct PostgresCleanup {
    source: ConfigSource,
}

impl PostgresCleanup {
    pub fn new(source: ConfigSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Cleanup for PostgresCleanup {
    async fn cleanup(&self, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let config = self.source.database_config().await?;
        let mut connection = db::connect(&config.connect_options()).await?;

        let deleted = delete_batches(&mut connection, tags).await;
        let closed = connection.close().await;

        let deleted = deleted?;
        if let Err(err) = closed {
            error!(error = %err, "Failed to close cleanup connection");
            return Err(err.into());
        }

        info!(
            tags = tags.len(),
            exposures = deleted.exposures,
            upload_batches = deleted.upload_batches,
            "Deleted uploaded rows"
        );
        Ok(())
    }
}

/// Exposures go first since they reference their upload batch.
pub async fn delete_batches(connection: &mut PgConnection, tags: &[String]) -> Result<DeletedRows> {
    let exposures = sqlx::query(
        r#"
            DELETE FROM exposures
            WHERE upload_batch_id IN (
                SELECT id
                FROM upload_batches
                WHERE tag = ANY($1)
            )
        "#,
    )
    .bind(tags)
    .execute(&mut *connection)
    .await?;

    let upload_batches = sqlx::query(
        r#"
            DELETE FROM upload_batches
            WHERE tag = ANY($1)
        "#,
    )
    .bind(tags)
    .execute(&mut *connection)
    .await?;

    Ok(DeletedRows {
        exposures: exposures.rows_affected(),
        upload_batches: upload_batches.rows_affected(),
    })
}

//! Engine configuration store backed by Postgres

use crate::cache::{ConfigStore, ConfigStoreError};
use crate::domain::{EngineConfig, EngineId, ReferenceFile};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::error;

const SELECT_ENGINE: &str =
    "SELECT instructions, description FROM engines WHERE engine_id = $1";
const SELECT_FILES: &str =
    "SELECT name, content_ref FROM engine_files WHERE engine_id = $1 ORDER BY position";

/// Reads `engines` and `engine_files`; files come back ordered by `position`
#[derive(Debug, Clone)]
pub struct PostgresConfigStore {
    pool: PgPool,
}

impl PostgresConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace one engine and its files
    pub async fn upsert(&self, config: &EngineConfig) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO engines (engine_id, instructions, description) VALUES ($1, $2, $3) \
             ON CONFLICT (engine_id) DO UPDATE \
             SET instructions = EXCLUDED.instructions, description = EXCLUDED.description, updated_at = now()",
        )
        .bind(config.engine_id.as_ref())
        .bind(&config.instructions)
        .bind(&config.description)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM engine_files WHERE engine_id = $1")
            .bind(config.engine_id.as_ref())
            .execute(&mut *tx)
            .await?;

        for (position, file) in config.files.iter().enumerate() {
            sqlx::query(
                "INSERT INTO engine_files (engine_id, position, name, content_ref) VALUES ($1, $2, $3, $4)",
            )
            .bind(config.engine_id.as_ref())
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(&file.name)
            .bind(&file.content_ref)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await
    }
}

fn unavailable(engine_id: &EngineId, err: sqlx::Error) -> ConfigStoreError {
    error!(engine_id = %engine_id, error = %err, "configuration store query failed");
    ConfigStoreError::Unavailable(err.to_string())
}

fn malformed(engine_id: &EngineId, err: sqlx::Error) -> ConfigStoreError {
    ConfigStoreError::Malformed {
        engine_id: engine_id.clone(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ConfigStore for PostgresConfigStore {
    async fn fetch_engine_config(
        &self,
        engine_id: &EngineId,
    ) -> Result<EngineConfig, ConfigStoreError> {
        let row = sqlx::query(SELECT_ENGINE)
            .bind(engine_id.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unavailable(engine_id, e))?
            .ok_or_else(|| ConfigStoreError::NotFound(engine_id.clone()))?;

        let instructions: String = row
            .try_get("instructions")
            .map_err(|e| malformed(engine_id, e))?;
        let description: String = row
            .try_get("description")
            .map_err(|e| malformed(engine_id, e))?;

        let files = sqlx::query(SELECT_FILES)
            .bind(engine_id.as_ref())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| unavailable(engine_id, e))?
            .into_iter()
            .map(|row| {
                Ok(ReferenceFile {
                    name: row.try_get("name")?,
                    content_ref: row.try_get("content_ref")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| malformed(engine_id, e))?;

        Ok(EngineConfig {
            engine_id: engine_id.clone(),
            instructions,
            description,
            files,
        })
    }
}

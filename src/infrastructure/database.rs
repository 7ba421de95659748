use crate::config::DatabaseSettings;
use crate::infrastructure::log_messages::database as log_msg;
use crate::{Error, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::path::Path;
use tracing::info;

/// Directory holding the SQL migrations shipped with the crate
pub const MIGRATIONS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations");

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized from settings
    pub async fn connect(settings: &DatabaseSettings, url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections.into_inner())
            .connect(url)
            .await?;
        info!(host = %settings.host, "{}", log_msg::CONNECTION_ESTABLISHED);
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from `dir`
    pub async fn run_migrations(&self, dir: &Path) -> Result<()> {
        info!(dir = %dir.display(), "{}", log_msg::MIGRATION_STARTED);
        let migrator = Migrator::new(dir).await?;
        migrator.run(&self.pool).await?;
        info!("{}", log_msg::MIGRATION_COMPLETED);
        Ok(())
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<()> {
        let row = sqlx::query("SELECT 1 as health_check")
            .fetch_one(&self.pool)
            .await?;

        let health_check: i32 = row.try_get("health_check")?;

        if health_check == 1 {
            Ok(())
        } else {
            Err(Error::application(log_msg::HEALTH_CHECK_FAILED))
        }
    }
}

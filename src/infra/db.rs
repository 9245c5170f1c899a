use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::Path;
use std::time::Duration;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies pending migrations from `dir`. Versions and checksums are
    /// tracked in `_sqlx_migrations`, so applied scripts never run twice.
    pub async fn run_migrations(&self, dir: impl AsRef<Path>) -> Result<()> {
        let migrator = load_migrations(dir.as_ref()).await?;
        migrator
            .run(&self.pool)
            .await
            .context("failed to apply migrations")?;
        tracing::info!(available = migrator.iter().count(), "migrations up to date");
        Ok(())
    }
}

async fn load_migrations(dir: &Path) -> Result<Migrator> {
    Migrator::new(dir)
        .await
        .with_context(|| format!("cannot load migrations from {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bundled_migrations_are_versioned() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        let migrator = load_migrations(&dir).await.unwrap();

        let versions: Vec<i64> = migrator.iter().map(|migration| migration.version).collect();
        assert_eq!(versions, vec![1]);
        assert_eq!(migrator.iter().next().unwrap().description, "notifications");
    }
}

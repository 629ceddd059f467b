use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolOptions;
use sqlx::{Any, AnyPool, Row};
use tracing::debug;

use stratum_core::config::{DatabaseConfig, Dialect};
use stratum_core::error::{Result, StratumError};

use super::Connection;

/// sqlx-backed connection to a MySQL, PostgreSQL or SQLite database.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    dialect: Dialect,
}

impl Database {
    /// Build the handle without touching the network. The first statement
    /// opens the connection.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let url = config.connection_url()?;

        let pool = Self::pool_options(config)
            .connect_lazy(&url)
            .map_err(|e| StratumError::Config(format!("Invalid database URL: {}", e)))?;

        Ok(Self {
            pool,
            dialect: config.dialect,
        })
    }

    fn pool_options(config: &DatabaseConfig) -> PoolOptions<Any> {
        // A single long-lived handle; in-memory SQLite lives only as long as
        // its connection.
        PoolOptions::<Any>::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.pool_timeout_secs))
            .idle_timeout(None)
            .max_lifetime(None)
    }
}

#[async_trait]
impl Connection for Database {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StratumError::Database(format!("Failed to connect: {}", e)))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    async fn execute(&self, sql: &str, binds: &[String]) -> Result<u64> {
        debug!(sql, "execute");

        let result = if binds.is_empty() {
            sqlx::raw_sql(sql).execute(&self.pool).await?
        } else {
            let mut query = sqlx::query(sql);
            for bind in binds {
                query = query.bind(bind.as_str());
            }
            query.execute(&self.pool).await?
        };

        Ok(result.rows_affected())
    }

    async fn fetch(&self, sql: &str, binds: &[String], columns: &[&str]) -> Result<Vec<Vec<String>>> {
        debug!(sql, "fetch");

        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(bind.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| row.try_get::<String, _>(*column).map_err(StratumError::from))
                    .collect()
            })
            .collect()
    }
}

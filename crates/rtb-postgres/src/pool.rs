use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info};

use rtb_core::{config::DatabaseConfig, Error, Result};

use crate::storage_err;

/// Open a pool and make sure the database answers.
pub async fn create_pool(cfg: &DatabaseConfig) -> Result<PgPool> {
    info!(
        host = %cfg.host,
        port = cfg.port,
        database = %cfg.name,
        max_connections = cfg.max_connections,
        "creating database connection pool"
    );

    let options = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .min_connections(cfg.min_connections)
        .acquire_timeout(cfg.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(storage_err)?;

    health_check(&pool).await?;
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<()> {
    let (one,): (i32,) = sqlx::query_as("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(storage_err)?;
    if one != 1 {
        return Err(Error::Storage(format!(
            "health check returned unexpected value {one}"
        )));
    }
    debug!("database health check passed");
    Ok(())
}

use sqlx::postgres::PgPool;
use tracing::{info, warn};

use rtb_core::{Error, Result};

/// Apply the embedded `migrations/` that have not run yet.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "migration failed");
            Error::Storage(format!("migration failed: {e}"))
        })?;
    info!("database schema is up to date");
    Ok(())
}

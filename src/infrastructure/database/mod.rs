//! Database Module
//!
//! PostgreSQL connection pool, schema migrations and pool gauges.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::DatabaseSettings;
use crate::infrastructure::metrics;

/// Create a PostgreSQL connection pool and, if configured, bring the schema up to date.
#[instrument(skip(settings), fields(max = settings.max_connections))]
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(&settings.url)
        .await?;

    if settings.run_migrations {
        run_migrations(&pool).await?;
        info!("Database migrations applied");
    }

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Publish the pool's current idle/active/max connection counts.
pub fn report_pool_stats(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle() as u32;
    metrics::update_db_pool_stats(idle, size.saturating_sub(idle), pool.options().get_max_connections());
}

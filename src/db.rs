use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;

const SCHEMA: &str = include_str!("../schema.sql");

/// Build the connection pool. Connection count, idle reclamation and the
/// acquire timeout all come from config; excess queries queue on the pool.
pub async fn connect(cfg: &DbConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .idle_timeout(cfg.idle_timeout())
        .acquire_timeout(cfg.acquire_timeout())
        .connect(&cfg.connection_url())
        .await
        .context("connect to database")?;
    info!(
        host = %cfg.host,
        database = %cfg.name,
        max_connections = cfg.max_connections,
        "connected to PostgreSQL"
    );
    Ok(db)
}

/// Create tables, index and the `updated_at` trigger if they are missing.
pub async fn ensure_schema(db: &PgPool) -> anyhow::Result<()> {
    // Plain &str goes over the simple query protocol, which allows several statements.
    db.execute(SCHEMA).await.context("apply schema.sql")?;
    info!("database schema ready");
    Ok(())
}

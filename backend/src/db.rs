use crate::config::DatabaseConfig;
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Build the shared connection pool and run pending migrations.
///
/// The pool is bounded and connections are recycled after
/// `conn_max_lifetime`, so the host culling idle connections never hands a
/// dead connection to a sync worker.
pub fn init_pool(config: &DatabaseConfig) -> Result<DbPool, String> {
    let manager = ConnectionManager::<PgConnection>::new(&config.url);
    let pool = r2d2::Pool::builder()
        .max_size(config.max_pool_size)
        .max_lifetime(Some(config.conn_max_lifetime))
        .test_on_check_out(true)
        .build(manager)
        .map_err(|e| format!("Failed to create database pool: {}", e))?;

    let mut conn = pool
        .get()
        .map_err(|e| format!("Failed to get database connection: {}", e))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("Failed to run database migrations: {}", e))?;

    log::info!(
        "Database ready (pool size {}, connection lifetime {:?})",
        config.max_pool_size,
        config.conn_max_lifetime
    );

    Ok(pool)
}

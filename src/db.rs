pub mod transaction;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, UpdateResult,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    if db_pool.get_database_backend() == DbBackend::Sqlite && !config.url.contains(":memory:") {
        // Readers stop blocking the single writer; persisted in the database file
        db_pool
            .execute_unprepared("PRAGMA journal_mode=WAL")
            .await
            .map_err(ServiceError::DatabaseError)?;
    }

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Applies all pending schema migrations.
pub async fn run_migrations(db: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    migrations::Migrator::up(db, None).await.map_err(|e| {
        error!("Migration failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;
    info!("Database migrations completed");
    Ok(())
}

/// Cheap round trip used by the health endpoint.
pub async fn check_connection(db: &DbPool) -> Result<(), ServiceError> {
    db.ping().await.map_err(ServiceError::DatabaseError)
}

/// Turns the result of a guarded `UPDATE ... WHERE status = expected` into an error when
/// another writer changed the row first.
pub fn ensure_swapped(result: &UpdateResult, entity: &str, id: Uuid) -> Result<(), ServiceError> {
    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "{} {} was modified concurrently",
            entity, id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rows_is_a_conflict() {
        let id = Uuid::new_v4();
        let err = ensure_swapped(&UpdateResult { rows_affected: 0 }, "Packing task", id)
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert!(ensure_swapped(&UpdateResult { rows_affected: 1 }, "Packing task", id).is_ok());
    }

    #[tokio::test]
    async fn migrations_apply_on_sqlite_memory() {
        let mut cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        cfg.max_connections = 1;
        let db = establish_connection_with_config(&cfg).await.unwrap();
        run_migrations(&db).await.unwrap();
        check_connection(&db).await.unwrap();
    }
}

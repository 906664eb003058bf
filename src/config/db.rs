use diesel::{
    pg::PgConnection,
    r2d2::{self, ConnectionManager},
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::ServiceError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type Connection = PgConnection;
pub type Pool = r2d2::Pool<ConnectionManager<Connection>>;

pub fn init_db_pool(url: &str) -> Result<Pool, ServiceError> {
    log::info!("Configuring database pool");
    let manager = ConnectionManager::<Connection>::new(url);
    r2d2::Pool::builder().build(manager).map_err(|e| {
        log::error!("Failed to create database pool: {}", e);
        ServiceError::internal_server_error("Failed to create database pool")
            .with_context(|ctx| ctx.with_tag("database").with_detail(e.to_string()))
    })
}

pub fn run_migration(conn: &mut Connection) -> Result<(), ServiceError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|applied| {
            for version in applied {
                log::info!("Applied migration {}", version);
            }
        })
        .map_err(|e| {
            log::error!("Failed to run migrations: {}", e);
            ServiceError::internal_server_error("Failed to run database migrations")
                .with_context(|ctx| ctx.with_tag("database").with_detail(e.to_string()))
        })
}

//! # Schoolyard DB
//!
//! Database access shared by every feature module:
//!
//! - [`init_db_pool`] and [`MIGRATOR`]: connection pool and embedded migrations
//! - [`pipeline`]: filter, keyword, sort, window, populate and projection for listings
//! - [`references`]: the "is anything still pointing at this row" scan run before deletes
//! - [`errors`]: mapping of Postgres constraint violations onto HTTP errors
//!
//! # Example
//!
//! ```ignore
//! use schoolyard_config::DatabaseConfig;
//! use schoolyard_db::{MIGRATOR, init_db_pool};
//!
//! let pool = init_db_pool(&DatabaseConfig::from_env()?).await?;
//! MIGRATOR.run(&pool).await?;
//! ```

use std::time::Duration;

use schoolyard_config::DatabaseConfig;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

pub mod errors;
pub mod lookup;
pub mod pipeline;
pub mod references;

pub use errors::db_error;
pub use lookup::{ensure_exists, fetch_by_key};
pub use pipeline::{
    Field, Filter, FilterValue, Filters, ListQuery, ListSpec, Relation, fetch_document, fetch_page,
    field,
};
pub use references::{ReferenceCheck, ensure_unreferenced};

// Re-export PgPool for convenience
pub use sqlx::PgPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Connects a pool sized from `config`.
pub async fn init_db_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.url)
        .await
}

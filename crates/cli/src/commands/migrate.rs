//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! palma migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`

use palma_storefront::config::StorefrontConfig;
use palma_storefront::db;
use palma_storefront::error::AppError;

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails, or a
/// migration fails to apply.
pub async fn storefront(config: &StorefrontConfig) -> Result<(), AppError> {
    let pool = super::connect(config).await?;

    tracing::info!("Running storefront migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    pool.close().await;
    Ok(())
}

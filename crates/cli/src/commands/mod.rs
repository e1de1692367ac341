//! Command implementations.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod migrate;

use palma_core::{Identity, IdentityId};
use palma_storefront::config::StorefrontConfig;
use palma_storefront::db;
use palma_storefront::error::{AppError, set_sentry_user};
use palma_storefront::identity::SessionIdentityProvider;
use palma_storefront::state::Storefront;
use sqlx::PgPool;

/// Connect to the storefront database named by the configuration.
async fn connect(config: &StorefrontConfig) -> Result<PgPool, AppError> {
    let database_url = config.require_database_url()?;
    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(database_url).await?)
}

/// Parse an optional `--user` argument into a session identity.
fn parse_identity(user: Option<&str>) -> Result<Identity, AppError> {
    user.map(IdentityId::parse)
        .transpose()
        .map(Identity::from)
        .map_err(|e| AppError::BadRequest(format!("--user: {e}")))
}

/// Connect and start a storefront session for `identity`.
async fn open_session(config: StorefrontConfig, identity: Identity) -> Result<Storefront, AppError> {
    let pool = connect(&config).await?;
    if let Some(user) = identity.user_id() {
        set_sentry_user(user);
    }
    Ok(Storefront::start(config, pool, SessionIdentityProvider::new(identity)).await)
}

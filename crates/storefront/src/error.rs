//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for the outer surfaces (the CLI). Cart
//! operations never fail from the caller's point of view; everything else
//! returns a per-concern error that converts into `AppError`.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::db::RepositoryError;
use crate::identity::IdentityError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Migrations could not be applied.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Identity could not be determined.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Order could not be placed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(RepositoryError::Database(err))
    }
}

impl AppError {
    /// Whether this error is a system failure rather than a user mistake.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Config(_)
            | Self::Database(_)
            | Self::Migration(_)
            | Self::Catalog(_)
            | Self::Identity(_) => true,
            Self::Checkout(err) => matches!(err, CheckoutError::Store(_)),
            Self::NotFound(_) | Self::BadRequest(_) => false,
        }
    }

    /// Log the error and capture server errors to Sentry.
    pub fn report(&self) {
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Command failed"
            );
        } else {
            tracing::info!(error = %self, "Command rejected");
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this once the session identity is known to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product 7".to_string());
        assert_eq!(err.to_string(), "Not found: product 7");

        let err = AppError::from(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), "Checkout error: cart is empty");
    }

    #[test]
    fn test_server_error_classification() {
        assert!(AppError::from(RepositoryError::NotFound).is_server_error());
        assert!(AppError::from(ConfigError::MissingEnvVar("X".to_string())).is_server_error());
        assert!(
            AppError::from(CheckoutError::Store(RepositoryError::NotFound)).is_server_error()
        );
        assert!(!AppError::from(CheckoutError::NotSignedIn).is_server_error());
        assert!(!AppError::from(CheckoutError::InvalidShipping("phone")).is_server_error());
        assert!(!AppError::BadRequest("quantity".to_string()).is_server_error());
    }
}

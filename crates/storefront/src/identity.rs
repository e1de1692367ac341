//! Identity provider seam.
//!
//! Authentication itself (passwords, magic links, OAuth) happens outside this
//! crate. The provider only reports who is signed in and publishes changes.

use std::sync::Arc;

use async_trait::async_trait;
use palma_core::{Identity, IdentityId};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Errors that can occur when asking for the current identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The session could not be read.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of the current identity and of identity-change events.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The identity of the current session.
    async fn current_identity(&self) -> Result<Identity, IdentityError>;

    /// Subscribe to identity changes made after this call.
    ///
    /// Dropping the subscription unsubscribes.
    fn subscribe(&self) -> IdentitySubscription;
}

/// Stream of identity changes.
///
/// Changes published faster than they are consumed are coalesced: the
/// subscriber always observes the latest identity.
#[derive(Debug)]
pub struct IdentitySubscription {
    rx: watch::Receiver<Identity>,
}

impl IdentitySubscription {
    /// Wrap a watch receiver. Its current value counts as already seen.
    #[must_use]
    pub fn new(mut rx: watch::Receiver<Identity>) -> Self {
        rx.mark_unchanged();
        Self { rx }
    }

    /// Wait for the next change. Returns `None` once the provider is gone.
    pub async fn changed(&mut self) -> Option<Identity> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Identity provider backed by an in-process session.
///
/// The sign-in flow calls [`sign_in`](Self::sign_in) once credentials have been
/// verified, and [`sign_out`](Self::sign_out) on logout.
#[derive(Debug, Clone)]
pub struct SessionIdentityProvider {
    tx: Arc<watch::Sender<Identity>>,
}

impl SessionIdentityProvider {
    /// Create a provider with an initial identity.
    #[must_use]
    pub fn new(initial: Identity) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Create a provider for an anonymous session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(Identity::Anonymous)
    }

    /// Publish a signed-in identity.
    pub fn sign_in(&self, id: IdentityId) {
        self.publish(Identity::Authenticated(id));
    }

    /// Publish the anonymous identity.
    pub fn sign_out(&self) {
        self.publish(Identity::Anonymous);
    }

    /// The identity currently published.
    #[must_use]
    pub fn identity(&self) -> Identity {
        self.tx.borrow().clone()
    }

    fn publish(&self, identity: Identity) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == identity {
                return false;
            }
            *current = identity.clone();
            true
        });
        if changed {
            info!(identity = %identity, "Session identity changed");
        }
    }
}

impl Default for SessionIdentityProvider {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentityProvider {
    async fn current_identity(&self) -> Result<Identity, IdentityError> {
        Ok(self.identity())
    }

    fn subscribe(&self) -> IdentitySubscription {
        IdentitySubscription::new(self.tx.subscribe())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(id: &str) -> IdentityId {
        IdentityId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn test_subscription_sees_changes_after_subscribe() {
        let provider = SessionIdentityProvider::new(Identity::from(user("u0")));
        let mut sub = provider.subscribe();

        provider.sign_in(user("u1"));
        assert_eq!(sub.changed().await, Some(Identity::from(user("u1"))));

        provider.sign_out();
        assert_eq!(sub.changed().await, Some(Identity::Anonymous));
    }

    #[tokio::test]
    async fn test_republishing_same_identity_is_not_a_change() {
        let provider = SessionIdentityProvider::anonymous();
        let mut sub = provider.subscribe();

        provider.sign_out();
        provider.sign_in(user("u1"));
        assert_eq!(sub.changed().await, Some(Identity::from(user("u1"))));
        assert_eq!(provider.current_identity().await.unwrap(), Identity::from(user("u1")));
    }

    #[tokio::test]
    async fn test_subscription_ends_when_provider_dropped() {
        let provider = SessionIdentityProvider::anonymous();
        let mut sub = provider.subscribe();
        drop(provider);
        assert_eq!(sub.changed().await, None);
    }
}

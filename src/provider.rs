use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::AuthError;
use crate::types::{Email, Identity, ProfilePatch};

/// Identity change event: the full identity snapshot after the change, or
/// `None` when signed out.
pub type IdentityChange = Option<Identity>;

/// Identity SDK boundary.
///
/// Implementations wrap a concrete provider and must uphold two contracts on
/// [`subscribe`](IdentityProvider::subscribe):
///
/// - the receiver observes the current identity as its first event, promptly
///   after subscription (this is what ends the session's initial `loading`
///   interval);
/// - subsequent events are delivered in the order the provider emitted them.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribes to identity changes.
    fn subscribe(&self) -> broadcast::Receiver<IdentityChange>;

    /// Signs in with email and password.
    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, AuthError>;

    /// Signs in through the federated provider flow.
    async fn sign_in_federated(&self) -> Result<Identity, AuthError>;

    /// Creates an account and signs it in.
    async fn create_account(&self, email: &Email, password: &str) -> Result<Identity, AuthError>;

    /// Applies a partial update to the signed-in profile.
    async fn update_profile(&self, patch: ProfilePatch) -> Result<Identity, AuthError>;

    /// Signs out. Implementations must clear the local identity and emit a
    /// change event even when the remote call fails.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

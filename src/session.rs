use std::fmt;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::AuthError;
use crate::provider::{IdentityChange, IdentityProvider};
use crate::types::{Email, Identity, ProfilePatch};

const TRACING_TARGET: &str = "guardpost::session";

/// Read model of the identity session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionState {
    /// Current identity, absent when signed out.
    pub identity: Option<Identity>,
    /// True until the first identity event is delivered; never reverts.
    pub loading: bool,
}

impl SessionState {
    /// Returns whether an identity is present.
    pub fn identity_present(&self) -> bool {
        self.identity.is_some()
    }

    /// Returns the current identity's email when present.
    pub fn email(&self) -> Option<&Email> {
        self.identity
            .as_ref()
            .and_then(|identity| identity.email.as_ref())
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}

/// Process-wide identity session handle.
///
/// Construct one per application with [`Session::connect`] and clone it
/// freely: every clone observes the same state cell, so a sign-out in one
/// part of the UI is instantly visible everywhere. The provider subscription
/// is opened exactly once and closed when the last clone drops.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<SessionState>,
    listener: JoinHandle<()>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl Session {
    /// Connects to an identity provider and starts the change listener.
    ///
    /// Must be called within a tokio runtime.
    pub fn connect(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let events = provider.subscribe();
        let listener = tokio::spawn(listen(events, state.clone()));
        Self {
            inner: Arc::new(SessionInner {
                provider,
                state,
                listener,
            }),
        }
    }

    /// Returns a snapshot of the session state.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to session-state changes.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Signs in with email and password.
    pub async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, AuthError> {
        self.inner.provider.sign_in(email, password).await
    }

    /// Signs in through the federated provider flow.
    pub async fn sign_in_federated(&self) -> Result<Identity, AuthError> {
        self.inner.provider.sign_in_federated().await
    }

    /// Creates an account and signs it in.
    pub async fn create_account(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Identity, AuthError> {
        self.inner.provider.create_account(email, password).await
    }

    /// Applies a partial update to the signed-in profile.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Identity, AuthError> {
        self.inner.provider.update_profile(patch).await
    }

    /// Signs out.
    ///
    /// Idempotent, and always succeeds from the caller's point of view: when
    /// the provider's remote call fails the local identity is cleared anyway,
    /// so the UI is never stranded in a signed-in state.
    pub async fn sign_out(&self) {
        if let Err(err) = self.inner.provider.sign_out().await {
            tracing::warn!(
                target: TRACING_TARGET,
                error = %err,
                "remote sign-out failed; clearing local session"
            );
            self.inner.state.send_modify(|state| {
                state.identity = None;
                state.loading = false;
            });
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

async fn listen(
    mut events: broadcast::Receiver<IdentityChange>,
    state: watch::Sender<SessionState>,
) {
    loop {
        match events.recv().await {
            Ok(change) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    signed_in = change.is_some(),
                    "identity change applied"
                );
                state.send_modify(|current| {
                    current.identity = change;
                    current.loading = false;
                });
            }
            // Skipped events are already superseded; the next recv returns
            // the newest snapshot.
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

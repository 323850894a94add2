use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::AuthError;
use crate::provider::{IdentityChange, IdentityProvider};
use crate::types::{Email, Identity, ProfilePatch};

const EVENT_CAPACITY: usize = 16;
const MIN_PASSWORD_LEN: usize = 6;

/// In-memory identity provider for tests and demos.
///
/// Behaves like the hosted SDKs this boundary wraps: account creation signs
/// the new account in, sign-out is idempotent, and every change is broadcast
/// in order. Subscribers receive the current identity as their first event.
#[derive(Clone, Debug)]
pub struct MemoryIdentityProvider {
    inner: Arc<ProviderInner>,
}

#[derive(Debug)]
struct ProviderInner {
    accounts: Mutex<HashMap<Email, Account>>,
    current: Mutex<Option<Identity>>,
    federated: Mutex<Option<Identity>>,
    events: broadcast::Sender<IdentityChange>,
}

#[derive(Clone, Debug)]
struct Account {
    password: String,
    display_name: Option<String>,
}

impl MemoryIdentityProvider {
    /// Creates a signed-out provider with no accounts.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ProviderInner {
                accounts: Mutex::new(HashMap::new()),
                current: Mutex::new(None),
                federated: Mutex::new(None),
                events,
            }),
        }
    }

    /// Seeds an account without signing it in.
    pub fn add_account(
        &self,
        email: Email,
        password: impl Into<String>,
        display_name: Option<String>,
    ) {
        let mut guard = self.inner.accounts.lock().expect("poisoned lock");
        guard.insert(
            email,
            Account {
                password: password.into(),
                display_name,
            },
        );
    }

    /// Configures the identity returned by the federated flow. Without one,
    /// the flow fails as cancelled.
    pub fn set_federated_identity(&self, identity: Identity) {
        *self.inner.federated.lock().expect("poisoned lock") = Some(identity);
    }

    /// Returns the currently signed-in identity.
    pub fn current(&self) -> Option<Identity> {
        self.inner.current.lock().expect("poisoned lock").clone()
    }

    fn apply(&self, change: IdentityChange) {
        *self.inner.current.lock().expect("poisoned lock") = change.clone();
        let _ = self.inner.events.send(change);
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn subscribe(&self) -> broadcast::Receiver<IdentityChange> {
        let receiver = self.inner.events.subscribe();
        // The subscription contract: the current snapshot is the first event.
        let snapshot = self.inner.current.lock().expect("poisoned lock").clone();
        let _ = self.inner.events.send(snapshot);
        receiver
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, AuthError> {
        let account = {
            let guard = self.inner.accounts.lock().expect("poisoned lock");
            guard.get(email).cloned()
        };
        let Some(account) = account else {
            return Err(AuthError::InvalidCredentials);
        };
        if account.password != password {
            return Err(AuthError::InvalidCredentials);
        }
        let identity = Identity::new(email.clone(), account.display_name);
        self.apply(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_federated(&self) -> Result<Identity, AuthError> {
        let configured = self.inner.federated.lock().expect("poisoned lock").clone();
        let Some(identity) = configured else {
            return Err(AuthError::Cancelled);
        };
        self.apply(Some(identity.clone()));
        Ok(identity)
    }

    async fn create_account(&self, email: &Email, password: &str) -> Result<Identity, AuthError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        {
            let mut guard = self.inner.accounts.lock().expect("poisoned lock");
            if guard.contains_key(email) {
                return Err(AuthError::DuplicateAccount(email.clone()));
            }
            guard.insert(
                email.clone(),
                Account {
                    password: password.to_string(),
                    display_name: None,
                },
            );
        }
        let identity = Identity::new(email.clone(), None);
        self.apply(Some(identity.clone()));
        Ok(identity)
    }

    async fn update_profile(&self, patch: ProfilePatch) -> Result<Identity, AuthError> {
        let updated = {
            let guard = self.inner.current.lock().expect("poisoned lock");
            let Some(identity) = guard.clone() else {
                return Err(AuthError::NotSignedIn);
            };
            Identity {
                display_name: patch.display_name.or(identity.display_name),
                ..identity
            }
        };
        if let Some(email) = updated.email.clone() {
            let mut guard = self.inner.accounts.lock().expect("poisoned lock");
            if let Some(account) = guard.get_mut(&email) {
                account.display_name = updated.display_name.clone();
            }
        }
        self.apply(Some(updated.clone()));
        Ok(updated)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.apply(None);
        Ok(())
    }
}

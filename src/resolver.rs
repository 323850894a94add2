use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::directory::Directory;
use crate::session::SessionState;
use crate::types::{Email, Role};

const TRACING_TARGET: &str = "guardpost::resolver";

/// Read model of role resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoleState {
    /// Resolved role; absent while unauthenticated, unresolved, or after a
    /// failed lookup.
    pub role: Option<Role>,
    /// True while a fetch for the current identity is in flight, and before
    /// the session delivers its first snapshot.
    pub loading: bool,
}

impl Default for RoleState {
    fn default() -> Self {
        Self {
            role: None,
            loading: true,
        }
    }
}

type RoleFetch = Pin<Box<dyn Future<Output = Option<Role>> + Send>>;

/// Reactive derivation of [`RoleState`] from the session cell plus one
/// network round trip per identity.
///
/// The resolver task is the only writer of the cell and re-runs on every
/// session change:
///
/// - while the session is loading, the prior role state stands untouched;
/// - a missing identity (or one without an email) clears the role
///   synchronously, with no network call;
/// - otherwise one lookup is issued, and its failure degrades to no role.
///
/// Switching identities drops the in-flight fetch, so a stale response can
/// never overwrite a newer identity's role.
#[derive(Clone)]
pub struct RoleResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    state: watch::Sender<RoleState>,
    task: JoinHandle<()>,
}

impl Drop for ResolverInner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl RoleResolver {
    /// Spawns the resolver over a session subscription.
    ///
    /// Must be called within a tokio runtime. The task ends when the session
    /// cell closes or the last resolver clone drops.
    pub fn spawn(
        session: watch::Receiver<SessionState>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        let (state, _) = watch::channel(RoleState::default());
        let task = tokio::spawn(run(session, directory, state.clone()));
        Self {
            inner: Arc::new(ResolverInner { state, task }),
        }
    }

    /// Returns a snapshot of the role state.
    pub fn state(&self) -> RoleState {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to role-state changes.
    pub fn watch(&self) -> watch::Receiver<RoleState> {
        self.inner.state.subscribe()
    }
}

impl fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleResolver")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

async fn run(
    mut session: watch::Receiver<SessionState>,
    directory: Arc<dyn Directory>,
    state: watch::Sender<RoleState>,
) {
    let mut inflight: Option<RoleFetch> = None;

    loop {
        let snapshot = session.borrow_and_update().clone();
        // An indeterminate identity resolves nothing; the prior state stands.
        if !snapshot.loading {
            match snapshot.identity.and_then(|identity| identity.email) {
                None => {
                    inflight = None;
                    state.send_modify(|current| {
                        current.role = None;
                        current.loading = false;
                    });
                }
                Some(email) => {
                    state.send_modify(|current| current.loading = true);
                    inflight = Some(Box::pin(fetch(Arc::clone(&directory), email)));
                }
            }
        }

        loop {
            tokio::select! {
                changed = session.changed() => {
                    match changed {
                        Ok(()) => break,
                        Err(_) => return,
                    }
                }
                role = async { inflight.as_mut().expect("in-flight fetch").await }, if inflight.is_some() => {
                    inflight = None;
                    state.send_modify(|current| {
                        current.role = role;
                        current.loading = false;
                    });
                }
            }
        }
    }
}

async fn fetch(directory: Arc<dyn Directory>, email: Email) -> Option<Role> {
    tracing::debug!(target: TRACING_TARGET, email = %email, "role fetch started");
    match directory.role_for(&email).await {
        Ok(role) => {
            tracing::debug!(target: TRACING_TARGET, email = %email, role = %role, "role fetch settled");
            Some(role)
        }
        Err(err) => {
            // Failed lookups degrade to no privileged role.
            tracing::warn!(target: TRACING_TARGET, email = %email, error = %err, "role fetch failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::error::{ApiError, RoleFetchError};
    use crate::types::{Identity, LoginStamp, UserRecord};

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct ScriptedDirectory {
        roles: Mutex<HashMap<Email, Role>>,
        fail: AtomicBool,
        lookups: AtomicUsize,
    }

    impl ScriptedDirectory {
        fn assign(&self, email: Email, role: Role) {
            self.roles
                .lock()
                .expect("poisoned lock")
                .insert(email, role);
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Directory for ScriptedDirectory {
        async fn role_for(&self, email: &Email) -> Result<Role, RoleFetchError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(RoleFetchError::Api(ApiError::Status(500)));
            }
            self.roles
                .lock()
                .expect("poisoned lock")
                .get(email)
                .copied()
                .ok_or(RoleFetchError::Api(ApiError::Status(404)))
        }

        async fn register(&self, _record: &UserRecord) -> Result<(), ApiError> {
            Ok(())
        }

        async fn stamp_login(&self, _stamp: &LoginStamp) -> Result<(), ApiError> {
            Ok(())
        }
    }

    /// Directory whose lookups for one email block until released.
    struct GatedDirectory {
        gated: Email,
        gated_role: Role,
        open_role: Role,
        gate: Notify,
        lookups: AtomicUsize,
    }

    impl GatedDirectory {
        fn new(gated: Email, gated_role: Role, open_role: Role) -> Self {
            Self {
                gated,
                gated_role,
                open_role,
                gate: Notify::new(),
                lookups: AtomicUsize::new(0),
            }
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Directory for GatedDirectory {
        async fn role_for(&self, email: &Email) -> Result<Role, RoleFetchError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if email == &self.gated {
                self.gate.notified().await;
                Ok(self.gated_role)
            } else {
                Ok(self.open_role)
            }
        }

        async fn register(&self, _record: &UserRecord) -> Result<(), ApiError> {
            Ok(())
        }

        async fn stamp_login(&self, _stamp: &LoginStamp) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn email(value: &str) -> Email {
        Email::new(value).expect("email")
    }

    fn signed_out() -> SessionState {
        SessionState {
            identity: None,
            loading: false,
        }
    }

    fn signed_in(value: &str) -> SessionState {
        SessionState {
            identity: Some(Identity::new(email(value), None)),
            loading: false,
        }
    }

    async fn wait_state<F>(resolver: &RoleResolver, predicate: F) -> RoleState
    where
        F: FnMut(&RoleState) -> bool,
    {
        let mut rx = resolver.watch();
        timeout(WAIT, rx.wait_for(predicate))
            .await
            .expect("role state timeout")
            .expect("role cell closed")
            .clone()
    }

    async fn wait_until<F>(condition: F)
    where
        F: Fn() -> bool,
    {
        timeout(WAIT, async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition timeout");
    }

    #[tokio::test]
    async fn indeterminate_session_should_leave_state_untouched() {
        let (tx, rx) = watch::channel(SessionState::default());
        let directory = Arc::new(ScriptedDirectory::default());
        let resolver = RoleResolver::spawn(rx, directory.clone());

        sleep(Duration::from_millis(20)).await;

        assert_eq!(resolver.state(), RoleState::default());
        assert_eq!(directory.lookups(), 0);
        drop(tx);
    }

    #[tokio::test]
    async fn missing_identity_should_clear_role_without_lookup() {
        let (tx, rx) = watch::channel(SessionState::default());
        let directory = Arc::new(ScriptedDirectory::default());
        let resolver = RoleResolver::spawn(rx, directory.clone());

        tx.send(signed_out()).expect("send");
        let state = wait_state(&resolver, |state| !state.loading).await;

        assert_eq!(state.role, None);
        assert_eq!(directory.lookups(), 0);
    }

    #[tokio::test]
    async fn identity_without_email_should_clear_role_without_lookup() {
        let (tx, rx) = watch::channel(SessionState::default());
        let directory = Arc::new(ScriptedDirectory::default());
        let resolver = RoleResolver::spawn(rx, directory.clone());

        tx.send(SessionState {
            identity: Some(Identity {
                email: None,
                display_name: Some("Anon".to_string()),
            }),
            loading: false,
        })
        .expect("send");
        let state = wait_state(&resolver, |state| !state.loading).await;

        assert_eq!(state.role, None);
        assert_eq!(directory.lookups(), 0);
    }

    #[tokio::test]
    async fn role_should_resolve_for_the_current_identity() {
        let (tx, rx) = watch::channel(SessionState::default());
        let directory = Arc::new(ScriptedDirectory::default());
        directory.assign(email("alice@example.com"), Role::Admin);
        let resolver = RoleResolver::spawn(rx, directory.clone());

        tx.send(signed_in("alice@example.com")).expect("send");
        let state = wait_state(&resolver, |state| state.role.is_some()).await;

        assert_eq!(state.role, Some(Role::Admin));
        assert!(!state.loading);
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn failed_lookup_should_degrade_to_no_role() {
        let (tx, rx) = watch::channel(SessionState::default());
        let directory = Arc::new(ScriptedDirectory::default());
        directory.assign(email("alice@example.com"), Role::Admin);
        directory.fail.store(true, Ordering::SeqCst);
        let resolver = RoleResolver::spawn(rx, directory.clone());

        tx.send(signed_in("alice@example.com")).expect("send");
        let state = wait_state(&resolver, |state| !state.loading).await;

        assert_eq!(state.role, None);
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn repeated_identity_events_should_refresh_the_role() {
        let (tx, rx) = watch::channel(signed_out());
        let directory = Arc::new(ScriptedDirectory::default());
        directory.assign(email("alice@example.com"), Role::Admin);
        let resolver = RoleResolver::spawn(rx, directory.clone());

        tx.send(signed_in("alice@example.com")).expect("send");
        wait_state(&resolver, |state| state.role == Some(Role::Admin)).await;

        directory.assign(email("alice@example.com"), Role::Tutor);
        tx.send(signed_in("alice@example.com")).expect("send");
        let state = wait_state(&resolver, |state| state.role == Some(Role::Tutor)).await;

        assert!(!state.loading);
        assert_eq!(directory.lookups(), 2);
    }

    #[tokio::test]
    async fn sign_out_should_discard_the_inflight_lookup() {
        let (tx, rx) = watch::channel(signed_out());
        let directory = Arc::new(GatedDirectory::new(
            email("alice@example.com"),
            Role::Admin,
            Role::User,
        ));
        let resolver = RoleResolver::spawn(rx, directory.clone());
        wait_state(&resolver, |state| !state.loading).await;

        tx.send(signed_in("alice@example.com")).expect("send");
        wait_until(|| directory.lookups() == 1).await;

        tx.send(signed_out()).expect("send");
        let state = wait_state(&resolver, |state| !state.loading && state.role.is_none()).await;
        assert_eq!(state.role, None);

        // Releasing the gate must not resurrect the discarded response.
        directory.gate.notify_one();
        sleep(Duration::from_millis(20)).await;
        assert_eq!(resolver.state().role, None);
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn stale_response_should_never_overwrite_a_newer_identity() {
        let (tx, rx) = watch::channel(signed_out());
        let directory = Arc::new(GatedDirectory::new(
            email("alice@example.com"),
            Role::Admin,
            Role::Tutor,
        ));
        let resolver = RoleResolver::spawn(rx, directory.clone());
        wait_state(&resolver, |state| !state.loading).await;

        tx.send(signed_in("alice@example.com")).expect("send");
        wait_until(|| directory.lookups() == 1).await;

        tx.send(signed_in("bob@example.com")).expect("send");
        let state = wait_state(&resolver, |state| state.role == Some(Role::Tutor)).await;
        assert!(!state.loading);

        directory.gate.notify_one();
        sleep(Duration::from_millis(20)).await;
        assert_eq!(resolver.state().role, Some(Role::Tutor));
        assert_eq!(directory.lookups(), 2);
    }
}

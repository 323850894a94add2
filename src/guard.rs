use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::resolver::{RoleResolver, RoleState};
use crate::session::{Session, SessionState};
use crate::types::{Role, RoutePath};

const TRACING_TARGET: &str = "guardpost::guard";

/// Guard evaluation outcome.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Session or role state is still loading; render a placeholder and do
    /// not navigate.
    Pending,
    /// Render the protected children.
    Allow,
    /// Redirect to the guard's error destination.
    Deny(Redirect),
}

/// Client-side redirect in the router's wire shape.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Redirect {
    /// Destination path.
    pub to: RoutePath,
    /// Navigation state carried to the destination.
    pub state: RedirectState,
    /// Replace the current history entry instead of pushing one.
    pub replace: bool,
}

/// Navigation state attached to a redirect.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RedirectState {
    /// Path the visitor attempted before being redirected.
    pub from: RoutePath,
}

impl Redirect {
    fn new(to: RoutePath, from: RoutePath) -> Self {
        Self {
            to,
            state: RedirectState { from },
            replace: true,
        }
    }
}

type AcceptFn = Arc<dyn Fn(Option<Role>, bool) -> bool + Send + Sync>;

/// Route guard: one decision machine parameterized by an acceptance
/// predicate and a redirect target.
///
/// Guards own no state and cache no decision; every evaluation is recomputed
/// from the session and role snapshots it is handed, so all guards share one
/// authorization semantics.
#[derive(Clone)]
pub struct Guard {
    label: String,
    accept: AcceptFn,
    redirect_to: RoutePath,
}

impl Guard {
    /// Guard that accepts any signed-in identity.
    pub fn authenticated(redirect_to: RoutePath) -> Self {
        Self::with_predicate(
            "authenticated",
            |_, identity_present| identity_present,
            redirect_to,
        )
    }

    /// Guard that accepts only the given role.
    pub fn role(required: Role, redirect_to: RoutePath) -> Self {
        Self::with_predicate(
            required.as_str(),
            move |role, _| role == Some(required),
            redirect_to,
        )
    }

    /// Guard with a custom acceptance predicate.
    ///
    /// The predicate receives the resolved role and whether an identity is
    /// present. It is only consulted once both cells have settled, and an
    /// absent identity denies regardless of its verdict.
    pub fn with_predicate<F>(label: impl Into<String>, accept: F, redirect_to: RoutePath) -> Self
    where
        F: Fn(Option<Role>, bool) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            accept: Arc::new(accept),
            redirect_to,
        }
    }

    /// Evaluates the guard against state snapshots.
    pub fn evaluate(
        &self,
        session: &SessionState,
        roles: &RoleState,
        attempted: &RoutePath,
    ) -> Decision {
        if session.loading || roles.loading {
            return Decision::Pending;
        }
        let identity_present = session.identity_present();
        if identity_present && (self.accept)(roles.role, identity_present) {
            return Decision::Allow;
        }
        tracing::debug!(
            target: TRACING_TARGET,
            guard = %self.label,
            from = %attempted,
            to = %self.redirect_to,
            "access denied"
        );
        Decision::Deny(Redirect::new(self.redirect_to.clone(), attempted.clone()))
    }

    /// Evaluates the guard against the live session and role cells.
    pub fn decide(
        &self,
        session: &Session,
        roles: &RoleResolver,
        attempted: &RoutePath,
    ) -> Decision {
        self.evaluate(&session.state(), &roles.state(), attempted)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("label", &self.label)
            .field("redirect_to", &self.redirect_to)
            .finish_non_exhaustive()
    }
}

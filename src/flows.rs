//! Account flows: the orchestration a login or registration surface runs.
//!
//! Provider operations come first; the directory bookkeeping calls
//! (`POST /users`, `PATCH /users/login`) are best-effort and never block a
//! session that already succeeded.

use chrono::Utc;

use crate::directory::Directory;
use crate::error::AuthError;
use crate::session::Session;
use crate::types::{Email, Identity, LoginStamp, ProfilePatch, Role, UserRecord};

const TRACING_TARGET: &str = "guardpost::flows";

/// Signs in with email and password, then stamps the last-login timestamp.
pub async fn login(
    session: &Session,
    directory: &dyn Directory,
    email: &Email,
    password: &str,
) -> Result<Identity, AuthError> {
    let identity = session.sign_in(email, password).await?;
    let stamp = LoginStamp {
        email: email.clone(),
        last_log_in: Utc::now(),
    };
    if let Err(err) = directory.stamp_login(&stamp).await {
        tracing::warn!(target: TRACING_TARGET, email = %email, error = %err, "login stamp failed");
    }
    Ok(identity)
}

/// Runs the federated sign-in flow, then registers the user record with the
/// default role.
pub async fn login_federated(
    session: &Session,
    directory: &dyn Directory,
) -> Result<Identity, AuthError> {
    let identity = session.sign_in_federated().await?;
    match identity.email.clone() {
        Some(email) => {
            let now = Utc::now();
            let record = UserRecord {
                name: identity.display_name.clone(),
                email,
                role: Role::User,
                created_at: now,
                last_log_in: now,
            };
            if let Err(err) = directory.register(&record).await {
                tracing::warn!(target: TRACING_TARGET, error = %err, "user record registration failed");
            }
        }
        None => {
            tracing::warn!(target: TRACING_TARGET, "federated identity has no email; skipping registration");
        }
    }
    Ok(identity)
}

/// Creates an account, names the profile, then registers the user record.
///
/// Provider failures (duplicate account, weak password, profile update)
/// propagate; only the directory registration is best-effort.
pub async fn register(
    session: &Session,
    directory: &dyn Directory,
    name: &str,
    email: &Email,
    password: &str,
) -> Result<Identity, AuthError> {
    session.create_account(email, password).await?;
    let identity = session
        .update_profile(ProfilePatch {
            display_name: Some(name.to_string()),
        })
        .await?;
    let now = Utc::now();
    let record = UserRecord {
        name: Some(name.to_string()),
        email: email.clone(),
        role: Role::User,
        created_at: now,
        last_log_in: now,
    };
    if let Err(err) = directory.register(&record).await {
        tracing::warn!(target: TRACING_TARGET, email = %email, error = %err, "user record registration failed");
    }
    Ok(identity)
}

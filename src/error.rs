use thiserror::Error;

use crate::types::Email;

/// Boundary error type for identity-provider and transport sources.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from parsing or validating domain values.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Invalid email address.
    #[error("invalid email: {0}")]
    Email(String),
    /// Invalid route path.
    #[error("invalid route path: {0}")]
    RoutePath(String),
    /// Role tag outside the closed set.
    #[error("unknown role: {0}")]
    Role(String),
}

/// Identity-provider failures, surfaced to the caller that initiated the
/// operation. Recovered locally; never fatal.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown account or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// An account already exists for the email.
    #[error("an account already exists for {0}")]
    DuplicateAccount(Email),
    /// Password rejected by the provider's policy.
    #[error("password does not meet provider requirements")]
    WeakPassword,
    /// The federated sign-in flow was cancelled.
    #[error("federated sign-in was cancelled")]
    Cancelled,
    /// The operation requires a signed-in identity.
    #[error("no identity is currently signed in")]
    NotSignedIn,
    /// Provider or network error wrapper.
    #[error("identity provider error: {0}")]
    Provider(#[source] ProviderError),
}

/// Failures at the authenticated HTTP client boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("request failed with status {0}")]
    Status(u16),
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[source] ProviderError),
}

/// Role-resolution failures. The resolver downgrades every variant to
/// "no role"; these never reach the user.
#[derive(Debug, Error)]
pub enum RoleFetchError {
    /// The lookup request failed.
    #[error("role lookup failed: {0}")]
    Api(#[from] ApiError),
    /// The response body did not match the role contract.
    #[error("malformed role payload: {0}")]
    Malformed(String),
}

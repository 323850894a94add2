//! Session-aware RBAC route guarding for single-page apps.
//!
//! This crate composes two independent asynchronous sources, the identity
//! session and a backend-resolved authorization role, into one race-free
//! authorization decision consumed by route guards. The default behavior is
//! deny-by-default: an unresolved or failed role lookup never grants access.
//! Use [`Session`] for identity state, [`RoleResolver`] for role state, and
//! [`Guard`] for navigation decisions.
//!
//! # Examples
//!
//! Wiring the in-memory boundaries (enable `memory`):
//! ```no_run
//! # #[cfg(feature = "memory")]
//! # async fn wire() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use guardpost::{
//!     Decision, Email, Guard, MemoryDirectory, MemoryIdentityProvider, Role, RoleResolver,
//!     RoutePath, Session,
//! };
//!
//! let provider = Arc::new(MemoryIdentityProvider::new());
//! let directory = Arc::new(MemoryDirectory::new());
//! let admin = Email::new("admin@example.com")?;
//! provider.add_account(admin.clone(), "secret-1", None);
//! directory.assign_role(admin.clone(), Role::Admin);
//!
//! let session = Session::connect(provider);
//! let resolver = RoleResolver::spawn(session.watch(), directory);
//! session.sign_in(&admin, "secret-1").await?;
//!
//! let guard = Guard::role(Role::Admin, RoutePath::new("/error")?);
//! let attempted = RoutePath::new("/admin")?;
//! match guard.decide(&session, &resolver, &attempted) {
//!     Decision::Pending => { /* render a loading placeholder */ }
//!     Decision::Allow => { /* render the protected view */ }
//!     Decision::Deny(redirect) => { /* navigate to redirect.to */ let _ = redirect; }
//! }
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod client;
mod directory;
mod error;
pub mod flows;
mod guard;
mod provider;
mod resolver;
mod session;
mod types;

#[cfg(feature = "memory")]
mod memory_directory;
#[cfg(feature = "memory")]
mod memory_provider;

#[cfg(feature = "reqwest-client")]
pub mod http;

pub use crate::client::{ApiClient, Method};
pub use crate::directory::{Directory, RestDirectory};
pub use crate::error::{ApiError, AuthError, ParseError, ProviderError, RoleFetchError};
pub use crate::guard::{Decision, Guard, Redirect, RedirectState};
pub use crate::provider::{IdentityChange, IdentityProvider};
pub use crate::resolver::{RoleResolver, RoleState};
pub use crate::session::{Session, SessionState};
pub use crate::types::{
    Email, Identity, LoginStamp, ProfilePatch, Role, RoutePath, UserRecord,
};

#[cfg(feature = "memory")]
pub use crate::memory_directory::MemoryDirectory;
#[cfg(feature = "memory")]
pub use crate::memory_provider::MemoryIdentityProvider;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::directory::Directory;
use crate::error::{ApiError, RoleFetchError};
use crate::types::{Email, LoginStamp, Role, UserRecord};

/// In-memory role directory for tests and demos.
///
/// Records every write and counts role lookups so tests can assert on the
/// exact network traffic a scenario produces.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory {
    inner: Arc<DirectoryInner>,
}

#[derive(Debug, Default)]
struct DirectoryInner {
    roles: Mutex<HashMap<Email, Role>>,
    records: Mutex<Vec<UserRecord>>,
    stamps: Mutex<Vec<LoginStamp>>,
    lookups: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a role to an email.
    pub fn assign_role(&self, email: Email, role: Role) {
        self.inner
            .roles
            .lock()
            .expect("poisoned lock")
            .insert(email, role);
    }

    /// Makes role lookups fail with a server error.
    pub fn fail_role_lookups(&self, fail: bool) {
        self.inner.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Makes registrations and login stamps fail with a server error.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns how many role lookups were issued.
    pub fn lookup_count(&self) -> usize {
        self.inner.lookups.load(Ordering::SeqCst)
    }

    /// Returns the registered user records.
    pub fn registered(&self) -> Vec<UserRecord> {
        self.inner.records.lock().expect("poisoned lock").clone()
    }

    /// Returns the recorded login stamps.
    pub fn login_stamps(&self) -> Vec<LoginStamp> {
        self.inner.stamps.lock().expect("poisoned lock").clone()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn role_for(&self, email: &Email) -> Result<Role, RoleFetchError> {
        self.inner.lookups.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_lookups.load(Ordering::SeqCst) {
            return Err(RoleFetchError::Api(ApiError::Status(500)));
        }
        let guard = self.inner.roles.lock().expect("poisoned lock");
        guard
            .get(email)
            .copied()
            .ok_or(RoleFetchError::Api(ApiError::Status(404)))
    }

    async fn register(&self, record: &UserRecord) -> Result<(), ApiError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::Status(503));
        }
        self.inner
            .records
            .lock()
            .expect("poisoned lock")
            .push(record.clone());
        Ok(())
    }

    async fn stamp_login(&self, stamp: &LoginStamp) -> Result<(), ApiError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(ApiError::Status(503));
        }
        self.inner
            .stamps
            .lock()
            .expect("poisoned lock")
            .push(stamp.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    fn email(value: &str) -> Email {
        Email::new(value).expect("email")
    }

    #[test]
    fn role_for_should_return_assigned_roles_and_count_lookups() {
        let directory = MemoryDirectory::new();
        directory.assign_role(email("alice@example.com"), Role::Tutor);

        let role = block_on(directory.role_for(&email("alice@example.com"))).expect("role");

        assert_eq!(role, Role::Tutor);
        assert_eq!(directory.lookup_count(), 1);
    }

    #[test]
    fn role_for_should_answer_not_found_for_unknown_emails() {
        let directory = MemoryDirectory::new();

        let err = block_on(directory.role_for(&email("ghost@example.com"))).expect_err("unknown");

        assert!(matches!(err, RoleFetchError::Api(ApiError::Status(404))));
        assert_eq!(directory.lookup_count(), 1);
    }

    #[test]
    fn scripted_failures_should_override_assignments() {
        let directory = MemoryDirectory::new();
        directory.assign_role(email("alice@example.com"), Role::Admin);
        directory.fail_role_lookups(true);

        let err = block_on(directory.role_for(&email("alice@example.com"))).expect_err("failure");

        assert!(matches!(err, RoleFetchError::Api(ApiError::Status(500))));
    }
}

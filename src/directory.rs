use async_trait::async_trait;
use serde::Deserialize;

use crate::client::{ApiClient, Method};
use crate::error::{ApiError, RoleFetchError};
use crate::types::{Email, LoginStamp, Role, UserRecord};

/// Backend user-directory boundary: role lookup plus the bookkeeping calls
/// issued by the account flows.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetches the role assigned to an email.
    async fn role_for(&self, email: &Email) -> Result<Role, RoleFetchError>;

    /// Registers a user record after account creation.
    async fn register(&self, record: &UserRecord) -> Result<(), ApiError>;

    /// Updates the last-login timestamp after a successful sign-in.
    async fn stamp_login(&self, stamp: &LoginStamp) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    role: Role,
}

/// [`Directory`] implementation over the fixed REST surface:
/// `GET /users/role/{email}`, `POST /users`, `PATCH /users/login`.
#[derive(Debug, Clone)]
pub struct RestDirectory<C> {
    client: C,
}

impl<C> RestDirectory<C> {
    /// Creates a directory over an authenticated client.
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: ApiClient> Directory for RestDirectory<C> {
    async fn role_for(&self, email: &Email) -> Result<Role, RoleFetchError> {
        let path = format!("/users/role/{}", urlencoding::encode(email.as_str()));
        let body = self.client.request(Method::Get, &path, None).await?;
        let payload: RolePayload = serde_json::from_value(body)
            .map_err(|err| RoleFetchError::Malformed(err.to_string()))?;
        Ok(payload.role)
    }

    async fn register(&self, record: &UserRecord) -> Result<(), ApiError> {
        let body =
            serde_json::to_value(record).map_err(|err| ApiError::Transport(Box::new(err)))?;
        self.client
            .request(Method::Post, "/users", Some(body))
            .await?;
        Ok(())
    }

    async fn stamp_login(&self, stamp: &LoginStamp) -> Result<(), ApiError> {
        let body =
            serde_json::to_value(stamp).map_err(|err| ApiError::Transport(Box::new(err)))?;
        self.client
            .request(Method::Patch, "/users/login", Some(body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use futures::executor::block_on;
    use serde_json::{Value, json};

    use super::*;

    struct RecordedCall {
        method: Method,
        path: String,
        body: Option<Value>,
    }

    struct ScriptedClient {
        calls: Mutex<Vec<RecordedCall>>,
        response: Result<Value, u16>,
    }

    impl ScriptedClient {
        fn returning(response: Result<Value, u16>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                response,
            }
        }
    }

    #[async_trait]
    impl ApiClient for ScriptedClient {
        async fn request(
            &self,
            method: Method,
            path: &str,
            body: Option<Value>,
        ) -> Result<Value, ApiError> {
            self.calls.lock().expect("poisoned lock").push(RecordedCall {
                method,
                path: path.to_string(),
                body,
            });
            match &self.response {
                Ok(value) => Ok(value.clone()),
                Err(status) => Err(ApiError::Status(*status)),
            }
        }
    }

    fn email(value: &str) -> Email {
        Email::new(value).expect("email")
    }

    #[test]
    fn role_for_should_fetch_encoded_path_and_parse() {
        let directory = RestDirectory::new(ScriptedClient::returning(Ok(json!({
            "role": "admin"
        }))));

        let role = block_on(directory.role_for(&email("alice@example.com"))).expect("role");

        assert_eq!(role, Role::Admin);
        let calls = directory.client.calls.lock().expect("poisoned lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::Get);
        assert_eq!(calls[0].path, "/users/role/alice%40example.com");
        assert!(calls[0].body.is_none());
    }

    #[test]
    fn role_for_should_surface_status_failures() {
        let directory = RestDirectory::new(ScriptedClient::returning(Err(404)));

        let err = block_on(directory.role_for(&email("alice@example.com"))).expect_err("status");

        assert!(matches!(
            err,
            RoleFetchError::Api(ApiError::Status(404))
        ));
    }

    #[test]
    fn role_for_should_reject_tags_outside_the_closed_set() {
        let directory = RestDirectory::new(ScriptedClient::returning(Ok(json!({
            "role": "owner"
        }))));

        let err = block_on(directory.role_for(&email("alice@example.com"))).expect_err("parse");

        assert!(matches!(err, RoleFetchError::Malformed(_)));
    }

    #[test]
    fn register_should_post_the_wire_shape() {
        let directory = RestDirectory::new(ScriptedClient::returning(Ok(Value::Null)));
        let now = Utc::now();
        let record = UserRecord {
            name: Some("Alice".to_string()),
            email: email("alice@example.com"),
            role: Role::User,
            created_at: now,
            last_log_in: now,
        };

        block_on(directory.register(&record)).expect("register");

        let calls = directory.client.calls.lock().expect("poisoned lock");
        assert_eq!(calls[0].method, Method::Post);
        assert_eq!(calls[0].path, "/users");
        let body = calls[0].body.as_ref().expect("body");
        assert_eq!(body["email"], json!("alice@example.com"));
        assert_eq!(body["role"], json!("user"));
        let stamp = body["last_log_in"].as_str().expect("timestamp");
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn stamp_login_should_patch_the_login_path() {
        let directory = RestDirectory::new(ScriptedClient::returning(Ok(Value::Null)));
        let stamp = LoginStamp {
            email: email("alice@example.com"),
            last_log_in: Utc::now(),
        };

        block_on(directory.stamp_login(&stamp)).expect("stamp");

        let calls = directory.client.calls.lock().expect("poisoned lock");
        assert_eq!(calls[0].method, Method::Patch);
        assert_eq!(calls[0].path, "/users/login");
        assert_eq!(
            calls[0].body.as_ref().expect("body")["email"],
            json!("alice@example.com")
        );
    }
}

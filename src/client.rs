use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;

/// HTTP method subset used by the backend contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Method {
    /// GET request.
    Get,
    /// POST request.
    Post,
    /// PATCH request.
    Patch,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated HTTP client boundary.
///
/// Implementations attach the current credential to outgoing requests and
/// surface failures as [`ApiError`], carrying the status code where one
/// exists.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Issues a request and returns the decoded JSON body, or `Value::Null`
    /// when the response has no body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError>;
}

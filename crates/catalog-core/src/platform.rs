use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::PlatformError;
use crate::security::{AccessToken, Credentials};

/// A client handle for the remote platform, owned by one browser session.
///
/// The handle carries the session's access token; `select` and `execute`
/// fail with [`PlatformError::NotAuthenticated`] until one is set.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Exchange credentials for an access token and keep it on the handle.
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), PlatformError>;

    /// Install a token without contacting the platform.
    fn set_access_token(&self, token: AccessToken);

    fn clear_access_token(&self);

    fn is_authenticated(&self) -> bool;

    /// Query records of `resource` matching `filter` (an empty object matches all).
    async fn select(&self, resource: &str, filter: &Value) -> Result<Vec<Value>, PlatformError>;

    /// Invoke a named procedure.
    async fn execute(&self, procedure: &str, args: &Value) -> Result<Value, PlatformError>;
}

/// Builds one unauthenticated [`PlatformApi`] handle per session.
pub trait PlatformFactory: Send + Sync {
    fn create(&self) -> Arc<dyn PlatformApi>;
}

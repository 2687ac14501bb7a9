//! In-memory platform with programmable responses, for tests that should
//! not touch the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use secrecy::ExposeSecret;
use serde_json::Value;

use catalog_core::{AccessToken, Credentials, PlatformApi, PlatformError, PlatformFactory};

/// Token handed out by a successful [`MockPlatform::authenticate`].
pub const MOCK_ACCESS_TOKEN: &str = "mock-access-token";

/// Raw body of the mock's authentication rejection.
pub const MOCK_AUTH_FAILURE_BODY: &str =
    r#"[{"code":"io.vantiq.authentication.failed","message":"invalid username or password"}]"#;

/// Which operation a failure or delay applies to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MockTarget {
    Authenticate,
    Select(String),
    Execute(String),
}

/// A call observed by the mock.
#[derive(Clone, Debug, PartialEq)]
pub enum MockCall {
    Authenticate { username: String },
    Select { resource: String, filter: Value },
    Execute { procedure: String, args: Value },
}

impl MockCall {
    pub fn target(&self) -> MockTarget {
        match self {
            Self::Authenticate { .. } => MockTarget::Authenticate,
            Self::Select { resource, .. } => MockTarget::Select(resource.clone()),
            Self::Execute { procedure, .. } => MockTarget::Execute(procedure.clone()),
        }
    }
}

#[derive(Default)]
struct MockConfig {
    credentials: Option<(String, String)>,
    accepted_tokens: Vec<String>,
    resources: HashMap<String, Vec<Value>>,
    procedures: HashMap<String, Value>,
    failures: HashMap<MockTarget, PlatformError>,
    delays: HashMap<MockTarget, Duration>,
}

#[derive(Default)]
struct Shared {
    config: RwLock<MockConfig>,
    calls: Mutex<Vec<MockCall>>,
}

/// Hands out [`MockPlatform`] handles that all see the same programmed data.
///
/// Configuration can be changed after handles exist; handles read it on
/// every call.
#[derive(Clone, Default)]
pub struct MockPlatformFactory {
    shared: Arc<Shared>,
}

impl MockPlatformFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept exactly this username/password pair.
    pub fn with_credentials(self, username: &str, password: &str) -> Self {
        self.shared.config.write().credentials = Some((username.into(), password.into()));
        self
    }

    /// Accept a pasted access token in addition to [`MOCK_ACCESS_TOKEN`].
    pub fn with_access_token(self, token: &str) -> Self {
        self.shared.config.write().accepted_tokens.push(token.into());
        self
    }

    pub fn with_resource(self, resource: &str, records: Vec<Value>) -> Self {
        self.shared
            .config
            .write()
            .resources
            .insert(resource.into(), records);
        self
    }

    pub fn with_procedure(self, procedure: &str, result: Value) -> Self {
        self.shared
            .config
            .write()
            .procedures
            .insert(procedure.into(), result);
        self
    }

    pub fn with_delay(self, target: MockTarget, delay: Duration) -> Self {
        self.shared.config.write().delays.insert(target, delay);
        self
    }

    /// Make every later call to `target` fail with `error`.
    pub fn fail(&self, target: MockTarget, error: PlatformError) {
        self.shared.config.write().failures.insert(target, error);
    }

    pub fn clear_failures(&self) {
        self.shared.config.write().failures.clear();
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.shared.calls.lock().clone()
    }

    pub fn call_count(&self, target: &MockTarget) -> usize {
        self.shared
            .calls
            .lock()
            .iter()
            .filter(|c| &c.target() == target)
            .count()
    }

    pub fn platform(&self) -> MockPlatform {
        MockPlatform {
            shared: Arc::clone(&self.shared),
            token: RwLock::new(None),
        }
    }
}

impl PlatformFactory for MockPlatformFactory {
    fn create(&self) -> Arc<dyn PlatformApi> {
        Arc::new(self.platform())
    }
}

/// One session's handle on the mock platform.
pub struct MockPlatform {
    shared: Arc<Shared>,
    token: RwLock<Option<AccessToken>>,
}

impl MockPlatform {
    /// Record the call, apply its delay, then return any programmed failure.
    async fn enter(&self, call: MockCall) -> Result<(), PlatformError> {
        let target = call.target();
        self.shared.calls.lock().push(call);

        let delay = self.shared.config.read().delays.get(&target).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.shared.config.read().failures.get(&target) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn check_token(&self) -> Result<(), PlatformError> {
        let token = self.token.read();
        let token = token.as_ref().ok_or(PlatformError::NotAuthenticated)?;
        let accepted = token.expose() == MOCK_ACCESS_TOKEN
            || self
                .shared
                .config
                .read()
                .accepted_tokens
                .iter()
                .any(|t| t == token.expose());
        if accepted {
            Ok(())
        } else {
            Err(PlatformError::AuthenticationFailed("invalid access token".into()))
        }
    }
}

#[async_trait]
impl PlatformApi for MockPlatform {
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), PlatformError> {
        self.enter(MockCall::Authenticate {
            username: credentials.username.clone(),
        })
        .await?;

        let matches = self
            .shared
            .config
            .read()
            .credentials
            .as_ref()
            .is_some_and(|(user, pass)| {
                *user == credentials.username && pass.as_str() == credentials.password.expose_secret()
            });
        if !matches {
            return Err(PlatformError::AuthenticationFailed(MOCK_AUTH_FAILURE_BODY.into()));
        }

        *self.token.write() = Some(AccessToken::new(MOCK_ACCESS_TOKEN));
        Ok(())
    }

    fn set_access_token(&self, token: AccessToken) {
        *self.token.write() = Some(token);
    }

    fn clear_access_token(&self) {
        *self.token.write() = None;
    }

    fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    async fn select(&self, resource: &str, filter: &Value) -> Result<Vec<Value>, PlatformError> {
        self.enter(MockCall::Select {
            resource: resource.into(),
            filter: filter.clone(),
        })
        .await?;
        self.check_token()?;

        Ok(self
            .shared
            .config
            .read()
            .resources
            .get(resource)
            .cloned()
            .unwrap_or_default())
    }

    async fn execute(&self, procedure: &str, args: &Value) -> Result<Value, PlatformError> {
        self.enter(MockCall::Execute {
            procedure: procedure.into(),
            args: args.clone(),
        })
        .await?;
        self.check_token()?;

        self.shared
            .config
            .read()
            .procedures
            .get(procedure)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("procedure {procedure}")))
    }
}

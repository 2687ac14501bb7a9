//! REST client for the event-broker platform.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use catalog_core::{AccessToken, Credentials, PlatformApi, PlatformError, PlatformFactory};

/// Endpoint and timeouts for the platform.
#[derive(Clone, Debug)]
pub struct PlatformConfig {
    pub base_url: String,
    pub api_version: u32,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            api_version: 1,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PlatformConfig {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    fn authenticate_url(&self) -> String {
        format!("{}/authenticate", self.base())
    }

    fn resources_url(&self, path: &str) -> String {
        format!("{}/api/v{}/resources/{}", self.base(), self.api_version, path)
    }
}

/// Map a resource type name to its REST path.
///
/// System types (`system.nodes`) live directly under `resources/`; user
/// types live under `resources/custom/`.
pub fn resource_path(resource: &str) -> String {
    match resource.strip_prefix("system.") {
        Some(system) => system.to_string(),
        None => format!("custom/{resource}"),
    }
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// One session's handle on the platform. Shares the connection pool with
/// every other handle built by the same [`VantiqClientFactory`].
pub struct VantiqClient {
    http: Client,
    config: Arc<PlatformConfig>,
    token: RwLock<Option<AccessToken>>,
}

impl VantiqClient {
    pub fn new(http: Client, config: Arc<PlatformConfig>) -> Self {
        Self {
            http,
            config,
            token: RwLock::new(None),
        }
    }

    fn bearer(&self) -> Result<String, PlatformError> {
        self.token
            .read()
            .as_ref()
            .map(|t| t.expose().to_string())
            .ok_or(PlatformError::NotAuthenticated)
    }

    fn transport_error(&self, e: reqwest::Error) -> PlatformError {
        if e.is_timeout() {
            PlatformError::Timeout(self.config.request_timeout)
        } else if e.is_decode() {
            PlatformError::Decode(e.to_string())
        } else {
            PlatformError::NetworkError(e.to_string())
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, PlatformError> {
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::from_status(status, body));
        }

        Ok(resp)
    }
}

fn is_empty_filter(filter: &Value) -> bool {
    match filter {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl PlatformApi for VantiqClient {
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), PlatformError> {
        let req = self.http.get(self.config.authenticate_url()).basic_auth(
            &credentials.username,
            Some(credentials.password.expose_secret()),
        );
        let resp = self.send(req).await?;
        let body: AuthResponse = resp.json().await.map_err(|e| self.transport_error(e))?;

        *self.token.write() = Some(AccessToken::new(body.access_token));
        debug!("authenticated");
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

    #[instrument(skip(self, filter))]
    async fn select(&self, resource: &str, filter: &Value) -> Result<Vec<Value>, PlatformError> {
        let token = self.bearer()?;
        let mut req = self
            .http
            .get(self.config.resources_url(&resource_path(resource)))
            .bearer_auth(token);
        if !is_empty_filter(filter) {
            req = req.query(&[("where", serde_json::to_string(filter)?)]);
        }

        let resp = self.send(req).await?;
        let records: Vec<Value> = resp.json().await.map_err(|e| self.transport_error(e))?;
        debug!(count = records.len(), "select complete");
        Ok(records)
    }

    #[instrument(skip(self, args))]
    async fn execute(&self, procedure: &str, args: &Value) -> Result<Value, PlatformError> {
        let token = self.bearer()?;
        let req = self
            .http
            .post(self.config.resources_url(&format!("procedures/{procedure}")))
            .bearer_auth(token)
            .json(args);

        let resp = self.send(req).await?;
        resp.json().await.map_err(|e| self.transport_error(e))
    }
}

/// Builds [`VantiqClient`] handles that share one HTTP connection pool.
pub struct VantiqClientFactory {
    http: Client,
    config: Arc<PlatformConfig>,
}

impl VantiqClientFactory {
    pub fn new(config: PlatformConfig) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PlatformError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }
}

impl PlatformFactory for VantiqClientFactory {
    fn create(&self) -> Arc<dyn PlatformApi> {
        Arc::new(VantiqClient::new(self.http.clone(), Arc::clone(&self.config)))
    }
}

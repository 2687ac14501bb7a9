//! Settings schema with compiled defaults.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub server: ServerSettings,
    pub platform: PlatformSettings,
    pub sessions: SessionSettings,
    pub catalog: CatalogSettings,
    pub logging: LoggingSettings,
}

/// HTTP listener.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound on handling one browser request, remote calls included.
    /// Must exceed `platform.request_timeout_secs`.
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            request_timeout_secs: 45,
        }
    }
}

/// Remote platform endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub base_url: String,
    pub api_version: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            api_version: 1,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

/// Session registry limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Idle time after which a session is dropped.
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_sessions: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
            max_sessions: 1024,
        }
    }
}

/// Where the catalog collections live on the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub manager_resource: String,
    pub manager_property: String,
    pub events_procedure: String,
    pub publishers_resource: String,
    pub subscribers_resource: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            manager_resource: "system.nodes".into(),
            manager_property: "ars_properties.manager".into(),
            events_procedure: "Broker.getAllEvents".into(),
            publishers_resource: "ArsPublisher".into(),
            subscribers_resource: "ArsSubscriber".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl DashboardSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = &self.platform.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SettingsError::InvalidValue(format!(
                "platform.base_url must be an http(s) URL, got {url:?}"
            )));
        }

        let positive = [
            ("server.request_timeout_secs", self.server.request_timeout_secs),
            ("platform.connect_timeout_secs", self.platform.connect_timeout_secs),
            ("platform.request_timeout_secs", self.platform.request_timeout_secs),
            ("sessions.ttl_secs", self.sessions.ttl_secs),
            ("sessions.sweep_interval_secs", self.sessions.sweep_interval_secs),
            ("sessions.max_sessions", self.sessions.max_sessions as u64),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(SettingsError::InvalidValue(format!("{key} must be positive")));
        }

        if self.server.request_timeout_secs <= self.platform.request_timeout_secs {
            return Err(SettingsError::InvalidValue(format!(
                "server.request_timeout_secs ({}) must exceed platform.request_timeout_secs ({})",
                self.server.request_timeout_secs, self.platform.request_timeout_secs
            )));
        }

        Ok(())
    }
}

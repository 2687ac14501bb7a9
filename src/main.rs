use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use catalog_platform::{CatalogSources, PlatformConfig, VantiqClientFactory};
use catalog_server::ServerConfig;
use catalog_settings::DashboardSettings;
use catalog_telemetry::TelemetryConfig;

/// Browse the event catalogs connected to a VANTIQ namespace.
#[derive(Debug, Parser)]
#[command(name = "catalog-dashboard", version)]
struct Args {
    /// Settings file (default: ~/.catalog-dashboard/settings.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the VANTIQ server
    #[arg(long)]
    platform_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Command-line flags win over every settings layer.
    fn apply(&self, settings: &mut DashboardSettings) {
        if let Some(host) = &self.host {
            settings.server.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(url) = &self.platform_url {
            settings.platform.base_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = level.clone();
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

fn server_config(settings: &DashboardSettings) -> ServerConfig {
    ServerConfig {
        host: settings.server.host.clone(),
        port: settings.server.port,
        request_timeout: Duration::from_secs(settings.server.request_timeout_secs),
        session_ttl: Duration::from_secs(settings.sessions.ttl_secs),
        sweep_interval: Duration::from_secs(settings.sessions.sweep_interval_secs),
        max_sessions: settings.sessions.max_sessions,
    }
}

fn platform_config(settings: &DashboardSettings) -> PlatformConfig {
    PlatformConfig {
        base_url: settings.platform.base_url.clone(),
        api_version: settings.platform.api_version,
        connect_timeout: Duration::from_secs(settings.platform.connect_timeout_secs),
        request_timeout: Duration::from_secs(settings.platform.request_timeout_secs),
    }
}

fn catalog_sources(settings: &DashboardSettings) -> CatalogSources {
    let catalog = &settings.catalog;
    CatalogSources {
        manager_resource: catalog.manager_resource.clone(),
        manager_property: catalog.manager_property.clone(),
        events_procedure: catalog.events_procedure.clone(),
        publishers_resource: catalog.publishers_resource.clone(),
        subscribers_resource: catalog.subscribers_resource.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let path = args
        .config
        .clone()
        .unwrap_or_else(catalog_settings::settings_path);
    let mut settings = catalog_settings::load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    args.apply(&mut settings);
    settings.validate().context("invalid settings")?;

    let telemetry = TelemetryConfig {
        log_level: catalog_telemetry::parse_level(&settings.logging.level)?,
        json: settings.logging.json,
        ..Default::default()
    }
    .with_module_level("hyper_util", tracing::Level::WARN);
    catalog_telemetry::init_telemetry(&telemetry)?;

    tracing::info!(
        platform = %settings.platform.base_url,
        api_version = settings.platform.api_version,
        "starting catalog dashboard"
    );

    let factory = VantiqClientFactory::new(platform_config(&settings))
        .context("failed to build platform client")?;
    let handle = catalog_server::start(
        server_config(&settings),
        Arc::new(factory),
        catalog_sources(&settings),
    )
    .await?;

    tracing::info!(addr = %handle.local_addr(), "catalog dashboard ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

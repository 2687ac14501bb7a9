//! Settings loading.
//!
//! Loading flow:
//! 1. Start with compiled [`DashboardSettings::default()`]
//! 2. If the settings file exists, merge its values over the defaults
//! 3. Apply `CATALOG_*` environment overrides; `__` separates nesting levels,
//!    so `CATALOG_SESSIONS__TTL_SECS=600` sets `sessions.ttl_secs`
//! 4. Validate the result

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use tracing::debug;

use crate::errors::Result;
use crate::types::DashboardSettings;

/// Prefix of environment variables that override settings.
pub const ENV_PREFIX: &str = "CATALOG_";

/// Resolve the path to the settings file (`~/.catalog-dashboard/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home)
        .join(".catalog-dashboard")
        .join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DashboardSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file is not an error; a malformed one is.
pub fn load_settings_from_path(path: &Path) -> Result<DashboardSettings> {
    if path.exists() {
        debug!(?path, "loading settings from file");
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let settings: DashboardSettings = Figment::from(Serialized::defaults(DashboardSettings::default()))
        .merge(Json::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    settings.validate()?;
    Ok(settings)
}

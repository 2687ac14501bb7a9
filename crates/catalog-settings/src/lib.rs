//! # catalog-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`DashboardSettings::default()`]
//! 2. **User file**: `~/.catalog-dashboard/settings.json`, or a path given on
//!    the command line
//! 3. **Environment variables**: `CATALOG_<SECTION>__<KEY>` (highest priority)
//!
//! ```no_run
//! let settings = catalog_settings::load_settings().unwrap_or_default();
//! println!("listening on {}:{}", settings.server.host, settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path, ENV_PREFIX};
pub use types::*;

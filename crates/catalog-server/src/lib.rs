//! # catalog-server
//!
//! Axum dashboard over the event-broker platform.
//!
//! - Session registry: opaque token → per-session platform handle and the
//!   managers/catalogs already shown to that session
//! - Handlers: landing page, credential and token sign-in, catalog view,
//!   registration forms, health
//! - Views: Tera templates compiled into the binary

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sessions;
pub mod views;

pub use config::ServerConfig;
pub use error::{DashboardError, ServerError};
pub use server::{build_router, start, AppState, ServerHandle};
pub use sessions::{Session, SessionRegistry};

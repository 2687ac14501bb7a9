//! HTML views.
//!
//! Templates are compiled into the binary and parsed once. View models carry
//! names only; forms post them back and handlers resolve them against the
//! session.

use std::error::Error as _;
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::{Map, Value};
use tera::{Context, Tera};

use catalog_core::{CatalogEntry, SessionToken};

use crate::error::DashboardError;

const TEMPLATES: [(&str, &str); 5] = [
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("catalog.html", include_str!("../templates/catalog.html")),
    ("register.html", include_str!("../templates/register.html")),
    ("error.html", include_str!("../templates/error.html")),
];

/// Stylesheet served at `/static/style.css`.
pub const STYLESHEET: &str = include_str!("../static/style.css");

static ENGINE: OnceLock<Result<Tera, String>> = OnceLock::new();

fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn load() -> Result<Tera, String> {
    let mut tera = Tera::default();
    tera.add_raw_templates(TEMPLATES).map_err(|e| describe(&e))?;
    Ok(tera)
}

fn engine() -> Result<&'static Tera, DashboardError> {
    ENGINE
        .get_or_init(load)
        .as_ref()
        .map_err(|e| DashboardError::Render(e.clone()))
}

fn render<T: Serialize>(template: &str, view: &T) -> Result<String, DashboardError> {
    let context = Context::from_serialize(view).map_err(|e| DashboardError::Render(describe(&e)))?;
    engine()?
        .render(template, &context)
        .map_err(|e| DashboardError::Render(describe(&e)))
}

/// Landing page: sign-in forms, or the manager list once signed in.
#[derive(Debug, Serialize)]
pub struct LandingView {
    pub session_id: String,
    pub authenticated: bool,
    pub error: Option<&'static str>,
    pub managers: Vec<String>,
}

impl LandingView {
    pub fn signed_out(token: &SessionToken, error: Option<&'static str>) -> Self {
        Self {
            session_id: token.as_str().to_string(),
            authenticated: false,
            error,
            managers: Vec::new(),
        }
    }

    pub fn signed_in(token: &SessionToken, managers: Vec<String>) -> Self {
        Self {
            session_id: token.as_str().to_string(),
            authenticated: true,
            error: None,
            managers,
        }
    }
}

/// A record property flattened to display text.
#[derive(Debug, Serialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

fn properties(map: &Map<String, Value>) -> Vec<Property> {
    map.iter()
        .map(|(key, value)| Property {
            key: key.clone(),
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
        .collect()
}

fn description(entry: &CatalogEntry) -> Option<String> {
    entry
        .event
        .properties
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Serialize)]
pub struct CatalogRow {
    pub name: String,
    pub description: Option<String>,
    pub published: bool,
    pub subscribed: bool,
}

/// One manager's merged catalog.
#[derive(Debug, Serialize)]
pub struct CatalogView {
    pub session_id: String,
    pub manager: String,
    pub rows: Vec<CatalogRow>,
}

impl CatalogView {
    pub fn new(token: &SessionToken, manager: &str, entries: &[CatalogEntry]) -> Self {
        Self {
            session_id: token.as_str().to_string(),
            manager: manager.to_string(),
            rows: entries
                .iter()
                .map(|entry| CatalogRow {
                    name: entry.name().to_string(),
                    description: description(entry),
                    published: entry.publisher.is_some(),
                    subscribed: entry.subscriber.is_some(),
                })
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationKind {
    Subscribe,
    Publish,
}

impl RegistrationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Publish => "publish",
        }
    }
}

/// Registration form for one catalog event. Displays only; nothing is
/// registered from here.
#[derive(Debug, Serialize)]
pub struct RegisterView {
    pub session_id: String,
    pub kind: RegistrationKind,
    pub manager: String,
    pub event: String,
    pub description: Option<String>,
    /// Properties of the matching registration, when one exists.
    pub existing: Option<Vec<Property>>,
    pub event_properties: Vec<Property>,
    pub suggested_local_name: String,
}

impl RegisterView {
    pub fn new(
        token: &SessionToken,
        kind: RegistrationKind,
        manager: &str,
        entry: &CatalogEntry,
    ) -> Self {
        let existing = match kind {
            RegistrationKind::Subscribe => entry.subscriber.as_ref().map(|r| &r.properties),
            RegistrationKind::Publish => entry.publisher.as_ref().map(|r| &r.properties),
        };
        Self {
            session_id: token.as_str().to_string(),
            kind,
            manager: manager.to_string(),
            event: entry.name().to_string(),
            description: description(entry),
            existing: existing.map(properties),
            event_properties: properties(&entry.event.properties),
            suggested_local_name: format!("/{}", entry.name().trim_start_matches('/')),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorView {
    pub status: u16,
    pub title: &'static str,
    pub message: &'static str,
}

pub fn landing(view: &LandingView) -> Result<String, DashboardError> {
    render("index.html", view)
}

pub fn catalog(view: &CatalogView) -> Result<String, DashboardError> {
    render("catalog.html", view)
}

pub fn registration(view: &RegisterView) -> Result<String, DashboardError> {
    render("register.html", view)
}

pub fn error_page(view: &ErrorView) -> Result<String, DashboardError> {
    render("error.html", view)
}

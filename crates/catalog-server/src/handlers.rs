//! Request handlers, one per dashboard action.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use catalog_core::{AccessToken, Credentials, PlatformError, SessionToken};
use catalog_platform::{fetch_catalog, list_managers};

use crate::error::DashboardError;
use crate::server::AppState;
use crate::sessions::Session;
use crate::views::{self, CatalogView, LandingView, RegisterView, RegistrationKind};

/// Shown when the platform rejects a username/password pair.
pub const AUTH_FAILED_MESSAGE: &str = "Failed to authenticate with VANTIQ server";

/// Shown when the platform rejects the session's access token.
pub const TOKEN_REJECTED_MESSAGE: &str =
    "The VANTIQ server rejected the access token. Sign in again.";

// Missing form fields decode as empty strings so they surface as dashboard
// errors instead of extractor rejections.

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CredentialsForm {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub username: String,
    pub password: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct TokenForm {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub token: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CatalogForm {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub manager: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RegistrationForm {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub manager: String,
    pub event: String,
}

/// Run remote work under the request deadline. Running out of time counts
/// as a platform timeout.
async fn within<T>(
    state: &AppState,
    work: impl Future<Output = Result<T, PlatformError>>,
) -> Result<T, PlatformError> {
    tokio::time::timeout(state.request_timeout, work)
        .await
        .unwrap_or(Err(PlatformError::Timeout(state.request_timeout)))
}

fn page(status: StatusCode, html: String) -> Response {
    (status, Html(html)).into_response()
}

fn landing_page(status: StatusCode, view: &LandingView) -> Result<Response, DashboardError> {
    Ok(page(status, views::landing(view)?))
}

/// Sign the session out and show the landing page with `message`.
fn rejected(session: &Session, message: &'static str) -> Result<Response, DashboardError> {
    session.sign_out();
    landing_page(
        StatusCode::UNAUTHORIZED,
        &LandingView::signed_out(session.token(), Some(message)),
    )
}

/// `GET /`: start a new session.
pub async fn landing(State(state): State<AppState>) -> Result<Response, DashboardError> {
    let session = state.sessions.create(state.platform.create());
    info!(session = %session.token().fingerprint(), "session started");
    landing_page(StatusCode::OK, &LandingView::signed_out(session.token(), None))
}

/// `POST /credentials`
pub async fn credentials(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Result<Response, DashboardError> {
    let session = state.session(&form.session_id)?;
    if form.username.trim().is_empty() {
        return Err(DashboardError::InvalidInput("A username is required."));
    }
    let credentials = Credentials::new(form.username, form.password);

    if let Err(e) = within(&state, session.client().authenticate(&credentials)).await {
        warn!(
            session = %session.token().fingerprint(),
            username = %credentials.username,
            error_kind = e.error_kind(),
            error = %e,
            "authentication failed"
        );
        return rejected(&session, AUTH_FAILED_MESSAGE);
    }

    info!(session = %session.token().fingerprint(), "authenticated with credentials");
    show_managers(&state, &session).await
}

/// `POST /token`
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Response, DashboardError> {
    let session = state.session(&form.session_id)?;
    let token = AccessToken::new(form.token.trim());
    if token.is_blank() {
        return Err(DashboardError::InvalidInput("An access token is required."));
    }

    session.client().set_access_token(token);
    info!(session = %session.token().fingerprint(), "access token set");
    show_managers(&state, &session).await
}

async fn show_managers(state: &AppState, session: &Session) -> Result<Response, DashboardError> {
    let listing = list_managers(session.client().as_ref(), &state.sources);
    let managers = match within(state, listing).await {
        Ok(managers) => managers,
        Err(e) if e.is_auth_failure() => {
            warn!(
                session = %session.token().fingerprint(),
                error_kind = e.error_kind(),
                error = %e,
                "manager listing rejected"
            );
            return rejected(session, TOKEN_REJECTED_MESSAGE);
        }
        Err(e) => return Err(e.into()),
    };

    let names = managers.iter().map(|m| m.name.clone()).collect();
    session.set_managers(managers);
    landing_page(StatusCode::OK, &LandingView::signed_in(session.token(), names))
}

/// `POST /catalog`: merged catalog of a manager listed for this session.
pub async fn catalog(
    State(state): State<AppState>,
    Form(form): Form<CatalogForm>,
) -> Result<Response, DashboardError> {
    let session = state.session(&form.session_id)?;
    let manager = session
        .manager(&form.manager)
        .ok_or(DashboardError::UnknownManager(form.manager))?;

    let fetch = fetch_catalog(session.client().as_ref(), &manager, &state.sources);
    let entries = match within(&state, fetch).await {
        Ok(entries) => entries,
        Err(e) if e.is_auth_failure() => {
            warn!(
                session = %session.token().fingerprint(),
                manager = %manager.name,
                error_kind = e.error_kind(),
                error = %e,
                "catalog fetch rejected"
            );
            return rejected(&session, TOKEN_REJECTED_MESSAGE);
        }
        Err(e) => {
            warn!(
                session = %session.token().fingerprint(),
                manager = %manager.name,
                error_kind = e.error_kind(),
                "catalog fetch failed"
            );
            return Err(e.into());
        }
    };

    info!(
        session = %session.token().fingerprint(),
        manager = %manager.name,
        events = entries.len(),
        "catalog shown"
    );
    let html = views::catalog(&CatalogView::new(session.token(), &manager.name, &entries))?;
    session.store_catalog(&manager.name, entries);
    Ok(page(StatusCode::OK, html))
}

/// `POST /subscribeForm`
pub async fn subscribe_form(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, DashboardError> {
    registration_form(&state, form, RegistrationKind::Subscribe)
}

/// `POST /publishForm`
pub async fn publish_form(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, DashboardError> {
    registration_form(&state, form, RegistrationKind::Publish)
}

fn registration_form(
    state: &AppState,
    form: RegistrationForm,
    kind: RegistrationKind,
) -> Result<Response, DashboardError> {
    let session = state.session(&form.session_id)?;
    if session.manager(&form.manager).is_none() {
        return Err(DashboardError::UnknownManager(form.manager));
    }
    let entry = session
        .catalog_entry(&form.manager, &form.event)
        .ok_or_else(|| DashboardError::UnknownEvent {
            manager: form.manager.clone(),
            event: form.event.clone(),
        })?;

    info!(
        session = %session.token().fingerprint(),
        manager = %form.manager,
        event = %form.event,
        kind = kind.as_str(),
        "registration form shown"
    );
    let view = RegisterView::new(session.token(), kind, &form.manager, &entry);
    Ok(page(StatusCode::OK, views::registration(&view)?))
}

/// `GET /static/style.css`
pub async fn stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        views::STYLESHEET,
    )
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "active_sessions": state.sessions.count(),
    }))
}

impl AppState {
    /// Resolve a form's session id.
    pub(crate) fn session(&self, raw: &str) -> Result<Arc<Session>, DashboardError> {
        self.sessions
            .get(&SessionToken::from_raw(raw))
            .ok_or(DashboardError::UnknownSession)
    }
}

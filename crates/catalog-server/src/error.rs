use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use catalog_core::PlatformError;

use crate::views::{self, ErrorView};

/// Server lifecycle errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure while handling one dashboard request.
///
/// Converts into an error page. Only fixed messages reach the browser; the
/// detail carried here is logged.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("unknown or expired session")]
    UnknownSession,

    #[error("unknown manager {0:?}")]
    UnknownManager(String),

    #[error("unknown event {event:?} for manager {manager:?}")]
    UnknownEvent { manager: String, event: String },

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("render failed: {0}")]
    Render(String),
}

impl DashboardError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownSession => StatusCode::UNAUTHORIZED,
            Self::UnknownManager(_) | Self::UnknownEvent { .. } => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Platform(PlatformError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Platform(_) => StatusCode::BAD_GATEWAY,
            Self::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error kind for logs.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::UnknownSession => "unknown_session",
            Self::UnknownManager(_) => "unknown_manager",
            Self::UnknownEvent { .. } => "unknown_event",
            Self::InvalidInput(_) => "invalid_input",
            Self::Platform(e) => e.error_kind(),
            Self::Render(_) => "render",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Self::UnknownSession => "Session expired",
            Self::UnknownManager(_) => "Unknown manager",
            Self::UnknownEvent { .. } => "Unknown event",
            Self::InvalidInput(_) => "Invalid request",
            Self::Platform(PlatformError::Timeout(_)) => "Platform timed out",
            Self::Platform(_) => "Platform unavailable",
            Self::Render(_) => "Internal error",
        }
    }

    /// Text shown to the user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnknownSession => "This session is unknown or has expired. Start a new session.",
            Self::UnknownManager(_) => {
                "That manager is not in this session's manager list. Reload the list and try again."
            }
            Self::UnknownEvent { .. } => {
                "That event is not in the catalog last shown for this manager. Reload the catalog and try again."
            }
            Self::InvalidInput(message) => *message,
            Self::Platform(PlatformError::Timeout(_)) => {
                "The VANTIQ server did not answer in time. Try again later."
            }
            Self::Platform(_) => "The catalog could not be loaded from the VANTIQ server.",
            Self::Render(_) => "The page could not be rendered.",
        }
    }
}

const RENDER_FAILURE_TEXT: &str = "Internal error: the page could not be rendered.";

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error_kind = self.error_kind(), error = %self, "request failed");
        } else {
            tracing::warn!(error_kind = self.error_kind(), error = %self, "request rejected");
        }

        if matches!(self, Self::Render(_)) {
            return (status, RENDER_FAILURE_TEXT).into_response();
        }

        let view = ErrorView {
            status: status.as_u16(),
            title: self.title(),
            message: self.user_message(),
        };
        match views::error_page(&view) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "error page failed to render");
                (StatusCode::INTERNAL_SERVER_ERROR, RENDER_FAILURE_TEXT).into_response()
            }
        }
    }
}

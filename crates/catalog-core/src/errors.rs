use std::time::Duration;

/// Typed error hierarchy for remote platform calls.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PlatformError {
    // Rejected by the platform
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },

    // Transport
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // Payload
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Whether the platform refused the caller's identity.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::NotAuthenticated)
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::NotAuthenticated => "not_authenticated",
            Self::NotFound(_) => "not_found",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Decode(_) => "decode",
        }
    }

    /// Classify a non-success HTTP status into the appropriate variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            404 => Self::NotFound(body),
            400 => Self::InvalidRequest(body),
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_mapping() {
        assert!(PlatformError::from_status(401, "unauthorized".into()).is_auth_failure());
        assert!(PlatformError::from_status(403, "forbidden".into()).is_auth_failure());
        assert!(matches!(
            PlatformError::from_status(404, "missing".into()),
            PlatformError::NotFound(_)
        ));
        assert!(matches!(
            PlatformError::from_status(400, "bad".into()),
            PlatformError::InvalidRequest(_)
        ));
        assert!(matches!(
            PlatformError::from_status(502, "bad gateway".into()),
            PlatformError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn unexpected_status_keeps_code() {
        let err = PlatformError::from_status(418, "teapot".into());
        assert!(err.to_string().contains("418"));
        assert_eq!(err.error_kind(), "invalid_request");
    }

    #[test]
    fn auth_failure_classification() {
        assert!(PlatformError::NotAuthenticated.is_auth_failure());
        assert!(!PlatformError::NetworkError("reset".into()).is_auth_failure());
        assert!(!PlatformError::Timeout(Duration::from_secs(1)).is_auth_failure());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(PlatformError::NotAuthenticated.error_kind(), "not_authenticated");
        assert_eq!(PlatformError::Decode("x".into()).error_kind(), "decode");
        assert_eq!(
            PlatformError::ServerError { status: 500, body: String::new() }.error_kind(),
            "server_error"
        );
    }

    #[test]
    fn json_error_becomes_decode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: PlatformError = json_err.into();
        assert!(matches!(err, PlatformError::Decode(_)));
    }
}

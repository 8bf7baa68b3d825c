use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors the proxy reports to its caller or hits at startup.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// A required request field was absent or blank. Holds the reply text.
    #[error("{0}")]
    MissingField(&'static str),

    #[error("Unknown action")]
    UnknownAction(Option<String>),

    /// The upstream could not be reached or did not answer in time.
    #[error("{0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        ProxyError::Upstream(e.to_string())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match self {
            ProxyError::MissingField(_) | ProxyError::UnknownAction(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) | ProxyError::Config(_) | ProxyError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match &self {
            ProxyError::UnknownAction(action) => json!({ "error": self.to_string(), "action": action }),
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

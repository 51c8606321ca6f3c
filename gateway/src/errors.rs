use crate::config::ValidationError;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, Response, StatusCode};
use hyper::body::Bytes;
use serde_json::json;
use std::io;

const UNEXPECTED_MESSAGE: &str = "Something went wrong on our end.";

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("Tenant ID is required")]
    MissingTenant,

    #[error("{0}")]
    BadRequest(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("no route for {0}")]
    NoRoute(String),

    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),

    #[error("service {service} is unavailable: {reason}")]
    UpstreamUnavailable { service: String, reason: String },

    #[error("service {0} did not respond in time")]
    UpstreamTimeout(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingTenant | GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnknownService(_) | GatewayError::NoRoute(_) => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Unexpected(_) | GatewayError::Validation(_) | GatewayError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The only place gateway failures become HTTP responses.
    pub fn into_response(self) -> Response<Bytes> {
        let status = self.status();
        let body = match &self {
            GatewayError::MissingTenant => json!({ "error": self.to_string() }),
            GatewayError::BadRequest(_) => json!({ "error": "Bad request", "message": self.to_string() }),
            GatewayError::UnknownService(_) | GatewayError::NoRoute(_) => {
                json!({ "error": "Not Found", "message": self.to_string() })
            }
            GatewayError::MethodNotAllowed(_) => {
                json!({ "error": "Method not allowed", "message": self.to_string() })
            }
            GatewayError::UpstreamUnavailable { .. } => {
                tracing::warn!(error = %self, "Upstream unavailable");
                json!({ "error": "Service Unavailable", "message": self.to_string() })
            }
            GatewayError::UpstreamTimeout(_) => {
                tracing::warn!(error = %self, "Upstream timed out");
                json!({ "error": "Request Timeout", "message": self.to_string() })
            }
            GatewayError::Unexpected(_) | GatewayError::Validation(_) | GatewayError::Io(_) => {
                tracing::error!(error = %self, "Unexpected gateway error");
                json!({ "error": "Internal Server Error", "message": UNEXPECTED_MESSAGE })
            }
        };

        let mut response = Response::new(Bytes::from(body.to_string()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The main error type for the booking service.
#[derive(Debug, thiserror::Error)]
pub enum InnkeeperError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Already paid: {0}")]
    AlreadyPaid(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request timeout")]
    RequestTimeout,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Client-facing error body. `error_id` correlates the response with the
/// server-side log line.
#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
    error_id: String,
}

impl InnkeeperError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn already_paid(msg: impl Into<String>) -> Self {
        Self::AlreadyPaid(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_signature(msg: impl Into<String>) -> Self {
        Self::InvalidSignature(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_)
            | Self::AlreadyPaid(_)
            | Self::Config(_)
            | Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }

    /// Message safe to return to clients. 4xx errors expose their message
    /// (the caller needs to know what was wrong with the request); 5xx
    /// errors return a generic message and the details stay in the logs.
    fn safe_message(&self) -> String {
        match self {
            Self::NotFound(msg) => format!("Not found: {}", msg),
            Self::BadRequest(msg) => format!("Bad request: {}", msg),
            Self::Unauthorized(msg) => format!("Unauthorized: {}", msg),
            Self::Forbidden(msg) => format!("Forbidden: {}", msg),
            Self::AlreadyPaid(msg) => format!("Already paid: {}", msg),
            Self::Config(msg) => format!("Configuration error: {}", msg),
            Self::InvalidSignature(msg) => format!("Invalid signature: {}", msg),
            Self::Conflict(msg) => format!("Conflict: {}", msg),
            Self::RequestTimeout => "Request timeout".to_string(),

            Self::Internal(_) | Self::Anyhow(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_string(),
        }
    }
}

impl IntoResponse for InnkeeperError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Request rejected"
            );
        }

        let body = Json(ErrorResponse {
            error: self.safe_message(),
            error_id,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations and handlers.
pub type Result<T> = std::result::Result<T, InnkeeperError>;

impl From<serde_json::Error> for InnkeeperError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            InnkeeperError::BadRequest(format!("JSON error: {}", err))
        } else {
            InnkeeperError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for InnkeeperError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            InnkeeperError::RequestTimeout
        } else if err.is_connect() {
            InnkeeperError::ServiceUnavailable(format!("Connection error: {}", err))
        } else if err.is_status() {
            match err.status().map(|s| s.as_u16()) {
                Some(401) => {
                    InnkeeperError::Config("Gateway rejected the configured credentials".to_string())
                }
                Some(404) => InnkeeperError::NotFound("Upstream resource not found".to_string()),
                Some(429) | Some(503) => {
                    InnkeeperError::ServiceUnavailable("Upstream unavailable".to_string())
                }
                _ => InnkeeperError::Internal(format!("Upstream error: {}", err)),
            }
        } else {
            InnkeeperError::Internal(format!("Request error: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            InnkeeperError::not_found("hotel").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            InnkeeperError::bad_request("dates").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InnkeeperError::unauthorized("no identity").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            InnkeeperError::forbidden("not the owner").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            InnkeeperError::already_paid("booking").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InnkeeperError::config("no gateway key").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InnkeeperError::invalid_signature("mismatch").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InnkeeperError::conflict("room taken").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            InnkeeperError::RequestTimeout.status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            InnkeeperError::service_unavailable("gateway down").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_safe_message_hides_server_errors() {
        let err = InnkeeperError::internal("db password is hunter2");
        assert_eq!(err.safe_message(), "Internal server error");

        let err = InnkeeperError::service_unavailable("gateway at 10.0.0.3 unreachable");
        assert_eq!(err.safe_message(), "Service unavailable");
    }

    #[test]
    fn test_safe_message_exposes_client_errors() {
        let err = InnkeeperError::bad_request("check-out must be after check-in");
        assert_eq!(
            err.safe_message(),
            "Bad request: check-out must be after check-in"
        );
    }

    #[tokio::test]
    async fn test_into_response_shape() {
        let response = InnkeeperError::not_found("booking").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Not found: booking");
        assert!(uuid::Uuid::parse_str(json["error_id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_from_serde_json_error() {
        let result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{ not json }");
        let err: InnkeeperError = result.unwrap_err().into();
        assert!(matches!(err, InnkeeperError::BadRequest(_)));
    }
}

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::InnkeeperError;

/// Header carrying the authenticated user id, set by the fronting auth proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor for the calling user. Rejects with 401 when the header is
/// absent or empty.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = InnkeeperError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if user_id.is_empty() {
            return Err(InnkeeperError::unauthorized("user authentication required"));
        }

        Ok(AuthUser(user_id.to_string()))
    }
}

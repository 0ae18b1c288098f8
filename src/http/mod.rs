//! HTTP surface: authentication extractor, application state, and routes.

mod auth;
mod routes;

pub use auth::{AuthUser, USER_ID_HEADER};
pub use routes::{AppState, PaymentsContext, router};

//! Test doubles and fixtures.
//!
//! Exposed unconditionally so integration tests and downstream consumers
//! can drive the payment flow without a live gateway.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::catalog::Hotel;
use crate::error::{InnkeeperError, Result};
use crate::gateway::{
    CheckoutClient, CreateSessionRequest, CreatedSession, SessionDetails, SessionMetadata,
    SessionPaymentStatus, SessionStatus,
};

#[derive(Default)]
struct MockState {
    counter: u64,
    requests: Vec<CreateSessionRequest>,
    sessions: HashMap<String, SessionDetails>,
}

/// In-memory gateway. Sessions open as `open`/`unpaid`; tests flip them with
/// the `complete_session*` helpers to simulate the customer paying.
#[derive(Clone, Default)]
pub struct MockCheckoutClient {
    inner: Arc<RwLock<MockState>>,
}

impl MockCheckoutClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::RwLockWriteGuard<'_, MockState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark a session complete and paid.
    pub fn complete_session(&self, session_id: &str) {
        self.update(session_id, SessionStatus::Complete, SessionPaymentStatus::Paid, None);
    }

    /// Mark a session complete and paid, with a customer email attached.
    pub fn complete_session_with_email(&self, session_id: &str, email: &str) {
        self.update(
            session_id,
            SessionStatus::Complete,
            SessionPaymentStatus::Paid,
            Some(email.to_string()),
        );
    }

    /// Mark a session complete while the payment is still settling.
    pub fn complete_session_unpaid(&self, session_id: &str) {
        self.update(
            session_id,
            SessionStatus::Complete,
            SessionPaymentStatus::Unpaid,
            None,
        );
    }

    fn update(
        &self,
        session_id: &str,
        status: SessionStatus,
        payment_status: SessionPaymentStatus,
        email: Option<String>,
    ) {
        let mut state = self.lock();
        if let Some(session) = state.sessions.get_mut(session_id) {
            session.status = status;
            session.payment_status = payment_status;
            if email.is_some() {
                session.customer_email = email;
            }
        }
    }

    /// Register a session that points at a booking id without going through
    /// the broker, for exercising missing-booking paths.
    pub fn orphan_session(&self, booking_id: &str) -> String {
        let mut state = self.lock();
        state.counter += 1;
        let id = format!("cs_test_{}", state.counter);
        state.sessions.insert(
            id.clone(),
            SessionDetails {
                id: id.clone(),
                status: SessionStatus::Open,
                payment_status: SessionPaymentStatus::Unpaid,
                customer_email: None,
                metadata: Some(SessionMetadata {
                    booking_id: booking_id.to_string(),
                    user_id: None,
                    hotel_id: None,
                    nights: None,
                }),
            },
        );
        id
    }

    /// Every create request the client has seen, in order.
    pub fn created_sessions(&self) -> Vec<CreateSessionRequest> {
        self.lock().requests.clone()
    }

    /// Id of the most recently created session.
    pub fn last_session_id(&self) -> Option<String> {
        let state = self.lock();
        if state.counter == 0 {
            return None;
        }
        Some(format!("cs_test_{}", state.counter))
    }
}

#[async_trait]
impl CheckoutClient for MockCheckoutClient {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<CreatedSession> {
        let mut state = self.lock();
        state.counter += 1;
        let id = format!("cs_test_{}", state.counter);
        let client_secret = format!("{id}_secret");

        state.sessions.insert(
            id.clone(),
            SessionDetails {
                id: id.clone(),
                status: SessionStatus::Open,
                payment_status: SessionPaymentStatus::Unpaid,
                customer_email: None,
                metadata: Some(request.metadata.clone()),
            },
        );
        state.requests.push(request);

        Ok(CreatedSession { id, client_secret })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
        _expand_line_items: bool,
    ) -> Result<SessionDetails> {
        self.lock()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| InnkeeperError::not_found(format!("session {session_id}")))
    }
}

/// Build a valid webhook signature header for the given payload, the way the
/// gateway would sign it.
pub fn signed_webhook_header(secret: &str, payload: &[u8]) -> String {
    let timestamp = Utc::now().timestamp();
    let signature = crate::gateway::webhook::compute_signature(secret, timestamp, payload);
    format!("t={},v1={}", timestamp, hex::encode(signature))
}

/// A `checkout.session.completed` event body for the given session.
pub fn completed_event_body(session_id: &str) -> Vec<u8> {
    serde_json::json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {"object": {"id": session_id, "object": "checkout.session"}}
    })
    .to_string()
    .into_bytes()
}

/// A hotel with a gateway price plan configured.
pub fn hotel_with_plan(id: &str) -> Hotel {
    Hotel {
        id: id.to_string(),
        name: "Harbor View".to_string(),
        location: "Lisbon".to_string(),
        price_cents: 10_000,
        price_plan_ref: Some(format!("price_{id}")),
    }
}

/// A hotel that has to be billed with an ad-hoc line item.
pub fn hotel_without_plan(id: &str) -> Hotel {
    Hotel {
        id: id.to_string(),
        name: "Cedar Lodge".to_string(),
        location: "Banff".to_string(),
        price_cents: 10_000,
        price_plan_ref: None,
    }
}

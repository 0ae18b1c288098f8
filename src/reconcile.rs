//! Reconciliation: settling bookings against the payment gateway.
//!
//! Two paths converge on the same conditional write. The poll path serves
//! the frontend's return page, fetching the session and upgrading the
//! booking if the gateway reports it settled. The webhook path verifies the
//! gateway's signature and fulfills completed sessions. Both go through
//! [`crate::booking::BookingStore::mark_paid_if_pending`], so a booking is
//! marked paid exactly once no matter how the two paths interleave.

use std::sync::Arc;

use uuid::Uuid;

use crate::booking::{Booking, BookingStore, PaymentStatus};
use crate::catalog::{Hotel, HotelStore};
use crate::error::{InnkeeperError, Result};
use crate::gateway::{CheckoutClient, SessionStatus, WebhookVerifier};

/// What handling a verified webhook did. Every variant maps to an HTTP 200
/// so the gateway does not retry deliveries we have dealt with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The booking was transitioned to PAID.
    Fulfilled,
    /// The booking was already PAID, nothing to do.
    AlreadyProcessed,
    /// The session completed but payment has not settled yet; a later
    /// async_payment_succeeded event will finish the job.
    AwaitingPayment,
    /// The session references a booking we no longer have.
    BookingMissing,
    /// Not a completion event.
    Ignored,
}

/// Snapshot returned to the frontend's return page.
#[derive(Debug, Clone)]
pub struct SessionStatusView {
    pub session_status: SessionStatus,
    pub customer_email: Option<String>,
    pub booking: Booking,
    pub hotel: Option<Hotel>,
}

pub struct ReconciliationEngine<B, H, C> {
    bookings: B,
    hotels: H,
    gateway: Arc<C>,
    verifier: Option<WebhookVerifier>,
}

impl<B, H, C> ReconciliationEngine<B, H, C>
where
    B: BookingStore,
    H: HotelStore,
    C: CheckoutClient,
{
    pub fn new(bookings: B, hotels: H, gateway: Arc<C>, verifier: Option<WebhookVerifier>) -> Self {
        Self {
            bookings,
            hotels,
            gateway,
            verifier,
        }
    }

    /// Poll path: fetch the session, settle the booking if the gateway says
    /// payment is resolved, and return the current state.
    pub async fn reconcile_by_poll(&self, session_id: &str) -> Result<SessionStatusView> {
        let session = self.gateway.retrieve_session(session_id, false).await?;

        let metadata = session.metadata.as_ref().ok_or_else(|| {
            InnkeeperError::not_found(format!("session {session_id} has no booking reference"))
        })?;
        let booking_id = Uuid::parse_str(&metadata.booking_id).map_err(|_| {
            InnkeeperError::not_found(format!("session {session_id} has no booking reference"))
        })?;

        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| InnkeeperError::not_found(format!("booking {booking_id}")))?;

        let booking = if session.payment_status.is_settled()
            && booking.payment_status == PaymentStatus::Pending
        {
            if self.bookings.mark_paid_if_pending(booking_id).await? {
                tracing::info!(booking_id = %booking_id, session_id, "Booking settled via poll");
            }
            self.bookings
                .get(booking_id)
                .await?
                .ok_or_else(|| InnkeeperError::not_found(format!("booking {booking_id}")))?
        } else {
            booking
        };

        let hotel = self.hotels.get(&booking.hotel_id).await?;

        Ok(SessionStatusView {
            session_status: session.status,
            customer_email: session.customer_email,
            booking,
            hotel,
        })
    }

    /// Webhook path: verify the signature over the raw payload, then fulfill
    /// completion events.
    pub async fn process_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookOutcome> {
        let verifier = self.verifier.as_ref().ok_or_else(|| {
            InnkeeperError::config("webhook secret not configured")
        })?;

        let event = verifier.verify(payload, signature_header)?;

        if !event.is_completion() {
            tracing::debug!(event_id = %event.id, kind = %event.kind, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored);
        }

        let session_id = event
            .session_id()
            .ok_or_else(|| InnkeeperError::bad_request("event object has no session id"))?
            .to_string();

        self.fulfill(&session_id).await
    }

    async fn fulfill(&self, session_id: &str) -> Result<WebhookOutcome> {
        // Re-fetch rather than trusting the event payload: the session in
        // the event may be stale by the time the delivery arrives.
        let session = match self.gateway.retrieve_session(session_id, true).await {
            Ok(session) => session,
            Err(InnkeeperError::NotFound(_)) => {
                // A vanished session cannot be fulfilled by retrying, so
                // acknowledge the delivery like a missing booking.
                tracing::warn!(session_id, "Completed session no longer exists at the gateway");
                return Ok(WebhookOutcome::BookingMissing);
            }
            Err(err) => return Err(err),
        };

        let booking_id = session
            .metadata
            .as_ref()
            .and_then(|m| Uuid::parse_str(&m.booking_id).ok());

        let Some(booking_id) = booking_id else {
            tracing::warn!(session_id, "Completed session carries no booking reference");
            return Ok(WebhookOutcome::BookingMissing);
        };

        if !session.payment_status.is_settled() {
            tracing::info!(
                booking_id = %booking_id,
                session_id,
                "Session complete but payment not settled yet"
            );
            return Ok(WebhookOutcome::AwaitingPayment);
        }

        match self.bookings.mark_paid_if_pending(booking_id).await {
            Ok(true) => {
                tracing::info!(booking_id = %booking_id, session_id, "Booking fulfilled");
                Ok(WebhookOutcome::Fulfilled)
            }
            Ok(false) => {
                tracing::debug!(booking_id = %booking_id, "Booking already paid, duplicate delivery");
                Ok(WebhookOutcome::AlreadyProcessed)
            }
            Err(InnkeeperError::NotFound(_)) => {
                // The gateway will not learn anything from a retry if the
                // booking is gone, so acknowledge the delivery.
                tracing::warn!(booking_id = %booking_id, session_id, "Booking not found for completed session");
                Ok(WebhookOutcome::BookingMissing)
            }
            Err(err) => Err(err),
        }
    }
}

use std::sync::Arc;

use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::booking::{BookingStore, PaymentStatus};
use crate::catalog::HotelStore;
use crate::error::{InnkeeperError, Result};
use crate::gateway::client::{
    CheckoutClient, CreateSessionRequest, SessionLineItem, SessionMetadata,
};

/// Checkout behavior knobs, split from the service [`crate::Config`] so the
/// broker can be built directly in tests.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub return_url: String,
    pub max_nights: u32,
    pub currency: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            return_url: "http://localhost:5173/booking/complete".to_string(),
            max_nights: 30,
            currency: "usd".to_string(),
        }
    }
}

impl CheckoutConfig {
    #[must_use]
    pub fn return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = url.into();
        self
    }

    #[must_use]
    pub fn max_nights(mut self, nights: u32) -> Self {
        self.max_nights = nights;
        self
    }

    fn validate_return_url(&self) -> Result<()> {
        let url = Url::parse(&self.return_url)
            .map_err(|e| InnkeeperError::config(format!("invalid return_url: {e}")))?;
        let is_local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
        if url.scheme() != "https" && !is_local {
            return Err(InnkeeperError::config(
                "return_url must use https outside of localhost",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenedSession {
    pub client_secret: String,
}

/// Opens embedded checkout sessions for pending bookings.
pub struct CheckoutBroker<B, H, C> {
    bookings: B,
    hotels: H,
    gateway: Arc<C>,
    config: CheckoutConfig,
}

impl<B, H, C> CheckoutBroker<B, H, C>
where
    B: BookingStore,
    H: HotelStore,
    C: CheckoutClient,
{
    pub fn new(bookings: B, hotels: H, gateway: Arc<C>, config: CheckoutConfig) -> Self {
        Self {
            bookings,
            hotels,
            gateway,
            config,
        }
    }

    /// Open a checkout session for the booking and return the client secret
    /// the frontend mounts the embedded checkout with.
    pub async fn open_session(&self, user_id: &str, booking_id: &str) -> Result<OpenedSession> {
        if user_id.is_empty() {
            return Err(InnkeeperError::unauthorized("user authentication required"));
        }

        let booking_id = Uuid::parse_str(booking_id)
            .map_err(|_| InnkeeperError::bad_request(format!("invalid booking id: {booking_id}")))?;

        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| InnkeeperError::not_found(format!("booking {booking_id}")))?;

        if booking.user_id != user_id {
            return Err(InnkeeperError::forbidden(
                "booking belongs to a different user",
            ));
        }
        if booking.payment_status == PaymentStatus::Paid {
            return Err(InnkeeperError::already_paid(format!(
                "booking {booking_id} has already been paid"
            )));
        }

        let nights = booking.nights();
        if nights == 0 || nights > self.config.max_nights {
            return Err(InnkeeperError::bad_request(format!(
                "stay must be between 1 and {} nights",
                self.config.max_nights
            )));
        }

        let hotel = self
            .hotels
            .get(&booking.hotel_id)
            .await?
            .ok_or_else(|| InnkeeperError::not_found(format!("hotel {}", booking.hotel_id)))?;

        self.config.validate_return_url()?;

        let line_item = match &hotel.price_plan_ref {
            Some(price_ref) => SessionLineItem::Plan {
                price_ref: price_ref.clone(),
                quantity: nights,
            },
            None => {
                tracing::warn!(
                    hotel_id = %hotel.id,
                    "Hotel has no gateway price plan, falling back to ad-hoc line item"
                );
                SessionLineItem::AdHoc {
                    name: hotel.name.clone(),
                    description: format!("{} night stay at {}", nights, hotel.name),
                    unit_amount_cents: hotel.price_cents,
                    quantity: nights,
                    currency: self.config.currency.clone(),
                }
            }
        };

        let request = CreateSessionRequest {
            line_item,
            metadata: SessionMetadata {
                booking_id: booking.id.to_string(),
                user_id: Some(booking.user_id.clone()),
                hotel_id: Some(booking.hotel_id.clone()),
                nights: Some(nights),
            },
            return_url: format!(
                "{}?session_id={{CHECKOUT_SESSION_ID}}",
                self.config.return_url
            ),
        };

        let session = self.gateway.create_session(request).await?;
        tracing::info!(
            booking_id = %booking.id,
            session_id = %session.id,
            "Checkout session opened"
        );

        Ok(OpenedSession {
            client_secret: session.client_secret,
        })
    }
}

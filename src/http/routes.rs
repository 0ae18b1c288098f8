use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::booking::{Booking, BookingAllocator, BookingStore};
use crate::catalog::{Hotel, HotelStore};
use crate::error::{InnkeeperError, Result};
use crate::gateway::{CheckoutBroker, CheckoutClient, OpenedSession};
use crate::http::auth::AuthUser;
use crate::reconcile::ReconciliationEngine;

/// Shared application state. Payments are optional: without gateway
/// credentials the service still takes bookings and the payment routes
/// answer with a configuration error.
pub struct AppState<B, H, C> {
    pub allocator: Arc<BookingAllocator<B, H>>,
    pub bookings: B,
    pub hotels: H,
    pub payments: Option<PaymentsContext<B, H, C>>,
}

pub struct PaymentsContext<B, H, C> {
    pub broker: Arc<CheckoutBroker<B, H, C>>,
    pub engine: Arc<ReconciliationEngine<B, H, C>>,
}

impl<B: Clone, H: Clone, C> Clone for AppState<B, H, C> {
    fn clone(&self) -> Self {
        Self {
            allocator: self.allocator.clone(),
            bookings: self.bookings.clone(),
            hotels: self.hotels.clone(),
            payments: self.payments.clone(),
        }
    }
}

impl<B, H, C> Clone for PaymentsContext<B, H, C> {
    fn clone(&self) -> Self {
        Self {
            broker: self.broker.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<B, H, C> AppState<B, H, C> {
    pub fn new(allocator: Arc<BookingAllocator<B, H>>, bookings: B, hotels: H) -> Self {
        Self {
            allocator,
            bookings,
            hotels,
            payments: None,
        }
    }

    #[must_use]
    pub fn with_payments(mut self, payments: PaymentsContext<B, H, C>) -> Self {
        self.payments = Some(payments);
        self
    }

    fn payments(&self) -> Result<&PaymentsContext<B, H, C>> {
        self.payments
            .as_ref()
            .ok_or_else(|| InnkeeperError::config("payment gateway not configured"))
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub hotel_id: String,
    pub check_in: String,
    pub check_out: String,
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub id: String,
    pub hotel_id: String,
    pub check_in: String,
    pub check_out: String,
    pub room_number: u32,
    pub payment_status: String,
    pub total_cents: i64,
}

impl From<&Booking> for BookingView {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id.to_string(),
            hotel_id: b.hotel_id.clone(),
            check_in: b.check_in.format("%Y-%m-%d").to_string(),
            check_out: b.check_out.format("%Y-%m-%d").to_string(),
            room_number: b.room_number,
            payment_status: b.payment_status.as_str().to_string(),
            total_cents: b.total_cents,
        }
    }
}

/// Booking-history item: the booking plus the hotel it was made against,
/// so the frontend does not need a second round trip per row.
#[derive(Serialize)]
pub struct UserBookingView {
    #[serde(flatten)]
    pub booking: BookingView,
    pub hotel: Option<Hotel>,
}

#[derive(Serialize)]
pub struct CreateBookingResponse {
    pub message: String,
    pub booking: BookingView,
}

#[derive(Deserialize)]
pub struct OpenSessionRequest {
    pub booking_id: String,
}

#[derive(Deserialize)]
pub struct SessionStatusQuery {
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct SessionStatusResponse {
    pub session_status: String,
    pub customer_email: Option<String>,
    pub booking: BookingView,
    pub hotel: Option<Hotel>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

pub fn router<B, H, C>(state: AppState<B, H, C>) -> Router
where
    B: BookingStore + Clone + Send + Sync + 'static,
    H: HotelStore + Clone + Send + Sync + 'static,
    C: CheckoutClient + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/bookings", post(create_booking::<B, H, C>))
        .route("/api/bookings/user", get(list_user_bookings::<B, H, C>))
        .route(
            "/api/payments/checkout-session",
            post(open_checkout_session::<B, H, C>),
        )
        .route(
            "/api/payments/session-status",
            get(session_status::<B, H, C>),
        )
        .route("/api/payments/webhook", post(handle_webhook::<B, H, C>))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn create_booking<B, H, C>(
    State(state): State<AppState<B, H, C>>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>)>
where
    B: BookingStore + Clone + Send + Sync + 'static,
    H: HotelStore + Clone + Send + Sync + 'static,
    C: CheckoutClient + Send + Sync + 'static,
{
    let booking = state
        .allocator
        .allocate(&user_id, &request.hotel_id, &request.check_in, &request.check_out)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            message: "Booking created".to_string(),
            booking: BookingView::from(&booking),
        }),
    ))
}

async fn list_user_bookings<B, H, C>(
    State(state): State<AppState<B, H, C>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<UserBookingView>>>
where
    B: BookingStore + Clone + Send + Sync + 'static,
    H: HotelStore + Clone + Send + Sync + 'static,
    C: CheckoutClient + Send + Sync + 'static,
{
    let bookings = state.bookings.list_for_user(&user_id).await?;
    let mut views = Vec::with_capacity(bookings.len());
    for booking in &bookings {
        let hotel = state.hotels.get(&booking.hotel_id).await?;
        views.push(UserBookingView {
            booking: BookingView::from(booking),
            hotel,
        });
    }
    Ok(Json(views))
}

async fn open_checkout_session<B, H, C>(
    State(state): State<AppState<B, H, C>>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<OpenSessionRequest>,
) -> Result<Json<OpenedSession>>
where
    B: BookingStore + Clone + Send + Sync + 'static,
    H: HotelStore + Clone + Send + Sync + 'static,
    C: CheckoutClient + Send + Sync + 'static,
{
    let payments = state.payments()?;
    let session = payments
        .broker
        .open_session(&user_id, &request.booking_id)
        .await?;
    Ok(Json(session))
}

async fn session_status<B, H, C>(
    State(state): State<AppState<B, H, C>>,
    Query(query): Query<SessionStatusQuery>,
) -> Result<Json<SessionStatusResponse>>
where
    B: BookingStore + Clone + Send + Sync + 'static,
    H: HotelStore + Clone + Send + Sync + 'static,
    C: CheckoutClient + Send + Sync + 'static,
{
    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| InnkeeperError::bad_request("session_id is required"))?;

    let payments = state.payments()?;
    let view = payments.engine.reconcile_by_poll(&session_id).await?;

    Ok(Json(SessionStatusResponse {
        session_status: view.session_status.as_str().to_string(),
        customer_email: view.customer_email,
        booking: BookingView::from(&view.booking),
        hotel: view.hotel,
    }))
}

/// Webhook endpoint. Takes the raw body so the signature can be checked over
/// the exact bytes the gateway signed.
async fn handle_webhook<B, H, C>(
    State(state): State<AppState<B, H, C>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>>
where
    B: BookingStore + Clone + Send + Sync + 'static,
    H: HotelStore + Clone + Send + Sync + 'static,
    C: CheckoutClient + Send + Sync + 'static,
{
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| InnkeeperError::bad_request("missing signature header"))?;

    let payments = state.payments()?;
    payments.engine.process_webhook(&body, signature).await?;

    Ok(Json(WebhookAck { received: true }))
}

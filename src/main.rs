use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use innkeeper::booking::{BookingAllocator, InMemoryBookingStore};
use innkeeper::catalog::{Hotel, InMemoryHotelStore};
use innkeeper::gateway::{
    CheckoutBroker, CheckoutConfig, LiveCheckoutClient, WebhookVerifier,
};
use innkeeper::http::{AppState, PaymentsContext, router};
use innkeeper::reconcile::ReconciliationEngine;
use innkeeper::{Config, InnkeeperError, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    innkeeper::init_tracing(&config.logging);

    let bookings = InMemoryBookingStore::new();
    let hotels = InMemoryHotelStore::new();
    seed_hotels(&hotels)?;

    let allocator = Arc::new(BookingAllocator::new(bookings.clone(), hotels.clone()));
    let mut state: AppState<_, _, LiveCheckoutClient> =
        AppState::new(allocator, bookings.clone(), hotels.clone());

    match &config.gateway.secret_key {
        Some(secret_key) => {
            let gateway = Arc::new(LiveCheckoutClient::new(secret_key.clone())?);
            let checkout = CheckoutConfig::default()
                .return_url(config.checkout.return_url.clone())
                .max_nights(config.checkout.max_nights);

            let verifier = config
                .gateway
                .webhook_secret
                .as_ref()
                .map(|s| WebhookVerifier::new(s.clone()));
            if verifier.is_none() {
                tracing::warn!("No webhook secret configured, webhook deliveries will be rejected");
            }

            let broker = Arc::new(CheckoutBroker::new(
                bookings.clone(),
                hotels.clone(),
                gateway.clone(),
                checkout,
            ));
            let engine = Arc::new(ReconciliationEngine::new(
                bookings.clone(),
                hotels.clone(),
                gateway,
                verifier,
            ));
            state = state.with_payments(PaymentsContext { broker, engine });
        }
        None => {
            tracing::warn!("No gateway secret key configured, payment routes are disabled");
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .checkout
                .frontend_origin
                .parse::<HeaderValue>()
                .map_err(|_| InnkeeperError::config("invalid frontend origin"))?,
        )
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any);

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| InnkeeperError::internal(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| InnkeeperError::internal(format!("server error: {e}")))?;

    Ok(())
}

/// Seed the catalog from `HOTEL_SEED_FILE` (a JSON array of hotels) when
/// set, otherwise load a small built-in catalog for development.
fn seed_hotels(hotels: &InMemoryHotelStore) -> Result<()> {
    if let Ok(path) = std::env::var("HOTEL_SEED_FILE") {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| InnkeeperError::config(format!("cannot read {path}: {e}")))?;
        let seeded: Vec<Hotel> = serde_json::from_str(&raw)
            .map_err(|e| InnkeeperError::config(format!("invalid hotel seed file: {e}")))?;
        let count = seeded.len();
        hotels.seed(seeded)?;
        tracing::info!(count, "Seeded hotels from file");
        return Ok(());
    }

    hotels.seed([
        Hotel {
            id: "hotel_harbor_view".to_string(),
            name: "Harbor View".to_string(),
            location: "Lisbon".to_string(),
            price_cents: 10_000,
            price_plan_ref: None,
        },
        Hotel {
            id: "hotel_cedar_lodge".to_string(),
            name: "Cedar Lodge".to_string(),
            location: "Banff".to_string(),
            price_cents: 18_500,
            price_plan_ref: None,
        },
    ])?;
    Ok(())
}

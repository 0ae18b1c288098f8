//! Hotel booking service with embedded checkout payments.
//!
//! The crate is organized around three pieces. The [`booking`] module
//! allocates rooms and tracks payment state, [`gateway`] talks to the
//! payment provider and verifies its webhooks, and [`reconcile`] ties the
//! two together so every booking is marked paid exactly once whether the
//! confirmation arrives by webhook or by the frontend polling.
//!
//! Storage sits behind [`booking::BookingStore`] and [`catalog::HotelStore`]
//! traits with in-memory implementations; [`testing`] provides a mock
//! gateway client and webhook signing helpers.

pub mod booking;
pub mod catalog;
mod config;
mod error;
pub mod gateway;
pub mod http;
pub mod reconcile;
pub mod testing;

pub use config::{CheckoutOptions, Config, GatewayConfig, LoggingConfig, ServerConfig};
pub use error::{InnkeeperError, Result};

/// Initialize tracing from the config, honoring `RUST_LOG` when set.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

//! Payment gateway integration: the client seam, the live HTTP client, the
//! checkout session broker, and webhook verification.

mod checkout;
mod client;
mod live;
pub(crate) mod webhook;

pub use checkout::{CheckoutBroker, CheckoutConfig, OpenedSession};
pub use client::{
    CheckoutClient, CreateSessionRequest, CreatedSession, SessionDetails, SessionLineItem,
    SessionMetadata, SessionPaymentStatus, SessionStatus,
};
pub use live::{LiveCheckoutClient, LiveClientConfig};
pub use webhook::{GatewayEvent, WebhookVerifier};

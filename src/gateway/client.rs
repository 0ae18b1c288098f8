use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What the session bills for: either a pre-configured gateway price plan or
/// an ad-hoc amount built from the hotel's nightly rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLineItem {
    Plan {
        price_ref: String,
        quantity: u32,
    },
    AdHoc {
        name: String,
        description: String,
        unit_amount_cents: i64,
        quantity: u32,
        currency: String,
    },
}

/// Booking context carried on the session so webhooks and polls can find
/// their way back to the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub booking_id: String,
    pub user_id: Option<String>,
    pub hotel_id: Option<String>,
    pub nights: Option<u32>,
}

impl SessionMetadata {
    /// Flatten into form-encoded key/value pairs for the gateway API.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![(
            "metadata[booking_id]".to_string(),
            self.booking_id.clone(),
        )];
        if let Some(user_id) = &self.user_id {
            pairs.push(("metadata[user_id]".to_string(), user_id.clone()));
        }
        if let Some(hotel_id) = &self.hotel_id {
            pairs.push(("metadata[hotel_id]".to_string(), hotel_id.clone()));
        }
        if let Some(nights) = self.nights {
            pairs.push(("metadata[nights]".to_string(), nights.to_string()));
        }
        pairs
    }

    /// Rebuild from a raw metadata map. Returns `None` when the booking id
    /// is missing, which marks the session as not ours to reconcile.
    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let booking_id = map.get("booking_id")?.clone();
        Some(Self {
            booking_id,
            user_id: map.get("user_id").cloned(),
            hotel_id: map.get("hotel_id").cloned(),
            nights: map.get("nights").and_then(|n| n.parse().ok()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub line_item: SessionLineItem,
    pub metadata: SessionMetadata,
    /// Full return URL including the gateway's session id placeholder.
    pub return_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSession {
    pub id: String,
    /// Secret the embedded checkout frontend mounts with.
    pub client_secret: String,
}

/// Session state as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    Complete,
    Expired,
    Unknown,
}

impl SessionStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "open" => Self::Open,
            "complete" => Self::Complete,
            "expired" => Self::Expired,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Complete => "complete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

/// Whether the gateway collected payment. Unrecognized wire values parse to
/// `Unpaid` so a new gateway state never marks a booking paid by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPaymentStatus {
    Unpaid,
    Paid,
    NoPaymentRequired,
}

impl SessionPaymentStatus {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "paid" => Self::Paid,
            "no_payment_required" => Self::NoPaymentRequired,
            _ => Self::Unpaid,
        }
    }

    /// Settled means the money question is resolved: paid, or nothing owed.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Unpaid)
    }
}

#[derive(Debug, Clone)]
pub struct SessionDetails {
    pub id: String,
    pub status: SessionStatus,
    pub payment_status: SessionPaymentStatus,
    pub customer_email: Option<String>,
    pub metadata: Option<SessionMetadata>,
}

/// Seam over the payment gateway. The live implementation talks HTTP; tests
/// use the mock in [`crate::testing`].
#[async_trait]
pub trait CheckoutClient: Send + Sync {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<CreatedSession>;

    /// Fetch a session by id. `expand_line_items` asks the gateway to
    /// include line items, as webhook fulfillment does.
    async fn retrieve_session(
        &self,
        session_id: &str,
        expand_line_items: bool,
    ) -> Result<SessionDetails>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trip() {
        let metadata = SessionMetadata {
            booking_id: "b1".to_string(),
            user_id: Some("u1".to_string()),
            hotel_id: Some("h1".to_string()),
            nights: Some(3),
        };

        let map: HashMap<String, String> = metadata
            .to_pairs()
            .into_iter()
            .map(|(k, v)| {
                let key = k
                    .trim_start_matches("metadata[")
                    .trim_end_matches(']')
                    .to_string();
                (key, v)
            })
            .collect();

        assert_eq!(SessionMetadata::from_map(&map), Some(metadata));
    }

    #[test]
    fn test_metadata_requires_booking_id() {
        let mut map = HashMap::new();
        map.insert("user_id".to_string(), "u1".to_string());
        assert_eq!(SessionMetadata::from_map(&map), None);
    }

    #[test]
    fn test_payment_status_parsing() {
        assert_eq!(
            SessionPaymentStatus::from_wire("paid"),
            SessionPaymentStatus::Paid
        );
        assert_eq!(
            SessionPaymentStatus::from_wire("no_payment_required"),
            SessionPaymentStatus::NoPaymentRequired
        );
        assert_eq!(
            SessionPaymentStatus::from_wire("unpaid"),
            SessionPaymentStatus::Unpaid
        );
        // Unknown states must not count as settled.
        assert_eq!(
            SessionPaymentStatus::from_wire("something_new"),
            SessionPaymentStatus::Unpaid
        );
    }

    #[test]
    fn test_is_settled() {
        assert!(SessionPaymentStatus::Paid.is_settled());
        assert!(SessionPaymentStatus::NoPaymentRequired.is_settled());
        assert!(!SessionPaymentStatus::Unpaid.is_settled());
    }

    #[test]
    fn test_session_status_parsing() {
        assert_eq!(SessionStatus::from_wire("open"), SessionStatus::Open);
        assert_eq!(SessionStatus::from_wire("complete"), SessionStatus::Complete);
        assert_eq!(SessionStatus::from_wire("expired"), SessionStatus::Expired);
        assert_eq!(SessionStatus::from_wire("weird"), SessionStatus::Unknown);
    }
}

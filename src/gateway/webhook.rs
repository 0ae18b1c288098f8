use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{InnkeeperError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Seconds a webhook timestamp may lag before it is rejected as a replay.
const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verifies gateway webhook signatures.
///
/// The signature header has the form `t=<unix_ts>,v1=<hex_hmac>` where the
/// HMAC-SHA256 is computed over `"{t}.{raw_body}"` with the endpoint secret.
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verify the signature over the raw payload, then parse the event.
    ///
    /// Verification failures are `InvalidSignature`; a payload that fails to
    /// parse after a valid signature is `BadRequest`.
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<GatewayEvent> {
        let (timestamp, signature) = parse_signature_header(signature_header)?;

        let age = (Utc::now().timestamp() - timestamp).abs();
        if age > self.tolerance_secs {
            return Err(InnkeeperError::invalid_signature(
                "webhook timestamp outside tolerance",
            ));
        }

        let expected = compute_signature(self.secret.expose_secret(), timestamp, payload);
        let provided = hex::decode(signature)
            .map_err(|_| InnkeeperError::invalid_signature("signature is not valid hex"))?;

        if expected.ct_eq(provided.as_slice()).unwrap_u8() != 1 {
            return Err(InnkeeperError::invalid_signature("signature mismatch"));
        }

        let event: GatewayEvent = serde_json::from_slice(payload)
            .map_err(|e| InnkeeperError::bad_request(format!("malformed webhook payload: {e}")))?;
        Ok(event)
    }
}

fn parse_signature_header(header: &str) -> Result<(i64, &str)> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(s)) => Ok((t, s)),
        _ => Err(InnkeeperError::invalid_signature(
            "malformed signature header",
        )),
    }
}

pub(crate) fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: GatewayEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayEventData {
    pub object: serde_json::Value,
}

impl GatewayEvent {
    /// Session id from the event payload, when the object carries one.
    pub fn session_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|v| v.as_str())
    }

    /// Events that signal a completed checkout and trigger fulfillment.
    pub fn is_completion(&self) -> bool {
        matches!(
            self.kind.as_str(),
            "checkout.session.completed" | "checkout.session.async_payment_succeeded"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn signed_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let sig = compute_signature(secret, timestamp, payload);
        format!("t={},v1={}", timestamp, hex::encode(sig))
    }

    fn payload() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": Utc::now().timestamp(),
            "data": {"object": {"id": "cs_test_1"}}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_verifies_valid_signature() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload();
        let header = signed_header(SECRET, Utc::now().timestamp(), &body);

        let event = verifier.verify(&body, &header).unwrap();
        assert_eq!(event.session_id(), Some("cs_test_1"));
        assert!(event.is_completion());
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload();
        let header = signed_header(SECRET, Utc::now().timestamp(), &body);

        let mut tampered = body.clone();
        tampered[0] ^= 0x01;
        let err = verifier.verify(&tampered, &header).unwrap_err();
        assert!(matches!(err, InnkeeperError::InvalidSignature(_)));
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload();
        let header = signed_header("whsec_other", Utc::now().timestamp(), &body);

        let err = verifier.verify(&body, &header).unwrap_err();
        assert!(matches!(err, InnkeeperError::InvalidSignature(_)));
    }

    #[test]
    fn test_rejects_stale_timestamp() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload();
        let stale = Utc::now().timestamp() - 600;
        let header = signed_header(SECRET, stale, &body);

        let err = verifier.verify(&body, &header).unwrap_err();
        assert!(matches!(err, InnkeeperError::InvalidSignature(_)));
    }

    #[test]
    fn test_rejects_malformed_header() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = payload();

        for header in ["", "t=abc,v1=def", "v1=deadbeef", "t=123"] {
            let err = verifier.verify(&body, header).unwrap_err();
            assert!(matches!(err, InnkeeperError::InvalidSignature(_)));
        }
    }

    #[test]
    fn test_non_completion_event() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = serde_json::json!({
            "id": "evt_2",
            "type": "checkout.session.expired",
            "data": {"object": {"id": "cs_test_2"}}
        })
        .to_string()
        .into_bytes();
        let header = signed_header(SECRET, Utc::now().timestamp(), &body);

        let event = verifier.verify(&body, &header).unwrap();
        assert!(!event.is_completion());
    }
}

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{InnkeeperError, Result};
use crate::gateway::client::{
    CheckoutClient, CreateSessionRequest, CreatedSession, SessionDetails, SessionLineItem,
    SessionMetadata, SessionPaymentStatus, SessionStatus,
};

#[derive(Debug, Clone)]
pub struct LiveClientConfig {
    pub timeout_seconds: u64,
    pub api_base: String,
}

impl Default for LiveClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            api_base: "https://api.stripe.com".to_string(),
        }
    }
}

fn validate_api_key(key: &str) -> Result<()> {
    let valid_prefix = ["sk_test_", "sk_live_", "rk_test_", "rk_live_"]
        .iter()
        .any(|p| key.starts_with(p));
    if !valid_prefix || key.len() < 20 {
        return Err(InnkeeperError::config(
            "gateway secret key is malformed, expected an sk_ or rk_ key",
        ));
    }
    Ok(())
}

/// HTTP client against the gateway's checkout session API.
pub struct LiveCheckoutClient {
    http: reqwest::Client,
    config: LiveClientConfig,
    api_key: SecretString,
}

impl LiveCheckoutClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, LiveClientConfig::default())
    }

    pub fn with_config(api_key: impl Into<String>, config: LiveClientConfig) -> Result<Self> {
        let api_key = api_key.into();
        validate_api_key(&api_key)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| InnkeeperError::internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            config,
            api_key: SecretString::new(api_key),
        })
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.config.api_base)
    }
}

#[async_trait]
impl CheckoutClient for LiveCheckoutClient {
    async fn create_session(&self, request: CreateSessionRequest) -> Result<CreatedSession> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("ui_mode".to_string(), "embedded".to_string()),
            ("return_url".to_string(), request.return_url),
        ];

        match request.line_item {
            SessionLineItem::Plan { price_ref, quantity } => {
                form.push(("line_items[0][price]".to_string(), price_ref));
                form.push(("line_items[0][quantity]".to_string(), quantity.to_string()));
            }
            SessionLineItem::AdHoc {
                name,
                description,
                unit_amount_cents,
                quantity,
                currency,
            } => {
                form.push((
                    "line_items[0][price_data][currency]".to_string(),
                    currency,
                ));
                form.push((
                    "line_items[0][price_data][product_data][name]".to_string(),
                    name,
                ));
                form.push((
                    "line_items[0][price_data][product_data][description]".to_string(),
                    description,
                ));
                form.push((
                    "line_items[0][price_data][unit_amount]".to_string(),
                    unit_amount_cents.to_string(),
                ));
                form.push(("line_items[0][quantity]".to_string(), quantity.to_string()));
            }
        }
        form.extend(request.metadata.to_pairs());

        let session: WireSession = self
            .http
            .post(self.sessions_url())
            .bearer_auth(self.api_key.expose_secret())
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let client_secret = session.client_secret.ok_or_else(|| {
            InnkeeperError::internal("gateway returned a session without a client secret")
        })?;

        Ok(CreatedSession {
            id: session.id,
            client_secret,
        })
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
        expand_line_items: bool,
    ) -> Result<SessionDetails> {
        let url = format!("{}/{}", self.sessions_url(), session_id);
        let mut request = self.http.get(url).bearer_auth(self.api_key.expose_secret());
        if expand_line_items {
            request = request.query(&[("expand[]", "line_items")]);
        }

        let session: WireSession = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(session.into_details())
    }
}

#[derive(Debug, Deserialize)]
struct WireSession {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    customer_details: Option<WireCustomerDetails>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct WireCustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

impl WireSession {
    fn into_details(self) -> SessionDetails {
        SessionDetails {
            id: self.id,
            status: self
                .status
                .as_deref()
                .map(SessionStatus::from_wire)
                .unwrap_or(SessionStatus::Unknown),
            payment_status: self
                .payment_status
                .as_deref()
                .map(SessionPaymentStatus::from_wire)
                .unwrap_or(SessionPaymentStatus::Unpaid),
            customer_email: self.customer_details.and_then(|d| d.email),
            metadata: self.metadata.as_ref().and_then(SessionMetadata::from_map),
        }
    }
}

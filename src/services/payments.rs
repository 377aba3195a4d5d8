use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::PaymentConfig;

/// Provider-side failure modes.
///
/// `CardDeclined` and `Provider` carry the provider's own message and are
/// surfaced to the caller; `Transport` covers network-level failures and maps
/// to an internal error at the service boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("card error: {0}")]
    CardDeclined(String),
    #[error("payment provider error: {0}")]
    Provider(String),
    #[error("payment transport error: {0}")]
    Transport(String),
}

/// Parameters for creating a payment intent.
#[derive(Debug, Clone)]
pub struct IntentRequest {
    /// Amount in minor currency units (cents)
    pub amount_minor: i64,
    /// ISO 4217 currency code, lowercase
    pub currency: String,
    pub user_id: Uuid,
    pub order_id: Uuid,
    /// Fresh per attempt; stops the gateway from double-charging when a
    /// logical call is retried over the network.
    pub idempotency_key: String,
}

/// Gateway representation of an in-progress charge attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
}

impl PaymentIntent {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// Provider-agnostic payment gateway boundary.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetails {
    #[serde(rename = "type")]
    error_type: String,
    message: Option<String>,
}

/// HTTP implementation of the gateway against a Stripe-style API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(api_base: String, secret_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    pub fn from_config(cfg: &PaymentConfig) -> Self {
        Self::new(cfg.api_base.clone(), cfg.secret_key.clone())
    }

    fn intents_url(&self) -> String {
        format!("{}/v1/payment_intents", self.api_base)
    }
}

/// Classifies a non-success provider response body.
fn classify_error_body(body: &str) -> GatewayError {
    match serde_json::from_str::<ProviderErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| "no message provided".to_string());
            if parsed.error.error_type == "card_error" {
                GatewayError::CardDeclined(message)
            } else {
                GatewayError::Provider(message)
            }
        }
        Err(_) => GatewayError::Provider(body.to_string()),
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self), fields(order_id = %request.order_id, amount = request.amount_minor))]
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError> {
        let mut params: HashMap<String, String> = HashMap::new();
        params.insert("amount".to_string(), request.amount_minor.to_string());
        params.insert("currency".to_string(), request.currency.clone());
        params.insert("payment_method_types[]".to_string(), "card".to_string());
        params.insert(
            "metadata[user_id]".to_string(),
            request.user_id.to_string(),
        );
        params.insert(
            "metadata[order_id]".to_string(),
            request.order_id.to_string(),
        );

        let response = self
            .client
            .post(self.intents_url())
            .basic_auth(&self.secret_key, Some(""))
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if response.status().is_success() {
            let intent: PaymentIntent = response
                .json()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;
            info!(intent_id = %intent.id, "Payment intent created");
            Ok(intent)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Payment intent creation failed");
            Err(classify_error_body(&body))
        }
    }

    #[instrument(skip(self))]
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let response = self
            .client
            .get(format!("{}/{}", self.intents_url(), intent_id))
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_error_body(&body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_errors_are_classified() {
        let body = r#"{"error": {"type": "card_error", "message": "Your card was declined."}}"#;
        match classify_error_body(body) {
            GatewayError::CardDeclined(msg) => assert_eq!(msg, "Your card was declined."),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn provider_errors_are_classified() {
        let body = r#"{"error": {"type": "api_error", "message": "Something went wrong."}}"#;
        match classify_error_body(body) {
            GatewayError::Provider(msg) => assert_eq!(msg, "Something went wrong."),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn unparseable_bodies_fall_back_to_provider_error() {
        match classify_error_body("<html>bad gateway</html>") {
            GatewayError::Provider(msg) => assert!(msg.contains("bad gateway")),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn missing_message_gets_a_placeholder() {
        let body = r#"{"error": {"type": "card_error"}}"#;
        match classify_error_body(body) {
            GatewayError::CardDeclined(msg) => assert_eq!(msg, "no message provided"),
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn succeeded_status_check() {
        let intent = PaymentIntent {
            id: "pi_1".into(),
            status: "succeeded".into(),
            client_secret: None,
        };
        assert!(intent.succeeded());

        let intent = PaymentIntent {
            id: "pi_2".into(),
            status: "requires_action".into(),
            client_secret: None,
        };
        assert!(!intent.succeeded());
    }

    #[test]
    fn base_url_is_normalized() {
        let gw = HttpPaymentGateway::new("https://api.example.com/".into(), "sk_test".into());
        assert_eq!(gw.intents_url(), "https://api.example.com/v1/payment_intents");
    }
}

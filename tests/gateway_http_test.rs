use storefront_api::services::payments::{
    GatewayError, HttpPaymentGateway, IntentRequest, PaymentGateway,
};
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn intent_request(amount_minor: i64) -> IntentRequest {
    IntentRequest {
        amount_minor,
        currency: "usd".to_string(),
        user_id: Uuid::new_v4(),
        order_id: Uuid::new_v4(),
        idempotency_key: Uuid::new_v4().to_string(),
    }
}

#[tokio::test]
async fn create_intent_sends_minor_units_and_idempotency_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header_exists("Idempotency-Key"))
        .and(body_string_contains("amount=2000"))
        .and(body_string_contains("currency=usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "pi_123",
            "object": "payment_intent",
            "amount": 2000,
            "currency": "usd",
            "status": "requires_payment_method",
            "client_secret": "pi_123_secret_abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpPaymentGateway::new(server.uri(), "sk_test_123".to_string());
    let intent = gateway
        .create_intent(intent_request(2000))
        .await
        .expect("intent should be created");

    assert_eq!(intent.id, "pi_123");
    assert_eq!(intent.client_secret.as_deref(), Some("pi_123_secret_abc"));
    assert!(!intent.succeeded());
}

#[tokio::test]
async fn create_intent_passes_order_metadata() {
    let server = MockServer::start().await;
    let request = intent_request(500);
    let order_id = request.order_id;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(body_string_contains(order_id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "pi_meta",
            "status": "requires_payment_method",
            "client_secret": "cs_meta"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpPaymentGateway::new(server.uri(), "sk_test_123".to_string());
    gateway
        .create_intent(request)
        .await
        .expect("metadata body should match");
}

#[tokio::test]
async fn card_declines_surface_the_provider_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "message": "Your card was declined."
            }
        })))
        .mount(&server)
        .await;

    let gateway = HttpPaymentGateway::new(server.uri(), "sk_test_123".to_string());
    let err = gateway
        .create_intent(intent_request(1000))
        .await
        .expect_err("decline must error");

    match err {
        GatewayError::CardDeclined(msg) => assert_eq!(msg, "Your card was declined."),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn provider_errors_are_not_card_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": {
                "type": "api_error",
                "message": "An unknown error occurred."
            }
        })))
        .mount(&server)
        .await;

    let gateway = HttpPaymentGateway::new(server.uri(), "sk_test_123".to_string());
    let err = gateway
        .create_intent(intent_request(1000))
        .await
        .expect_err("provider failure must error");

    assert!(matches!(err, GatewayError::Provider(_)));
}

#[tokio::test]
async fn retrieve_intent_reports_settlement_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "pi_123",
            "status": "succeeded"
        })))
        .mount(&server)
        .await;

    let gateway = HttpPaymentGateway::new(server.uri(), "sk_test_123".to_string());
    let intent = gateway
        .retrieve_intent("pi_123")
        .await
        .expect("retrieval should succeed");

    assert!(intent.succeeded());
}

#[tokio::test]
async fn retrieve_unknown_intent_is_a_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {
                "type": "invalid_request_error",
                "message": "No such payment_intent: 'pi_missing'"
            }
        })))
        .mount(&server)
        .await;

    let gateway = HttpPaymentGateway::new(server.uri(), "sk_test_123".to_string());
    let err = gateway
        .retrieve_intent("pi_missing")
        .await
        .expect_err("missing intent must error");

    match err {
        GatewayError::Provider(msg) => assert!(msg.contains("pi_missing")),
        other => panic!("unexpected error: {:?}", other),
    }
}

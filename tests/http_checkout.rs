//! End-to-end checkout over real HTTP.
//!
//! Each test spins up an Axum server on a random port that plays both the
//! HoopMetrix backend and the payment network, then drives the production
//! `HttpCheckoutApi` and `StripeCardConfirmer` against it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use hoopmetrix::checkout::{
    AuthSession, BillingCycle, CardInput, CheckoutForm, CheckoutWorkflow, HttpCheckoutApi, PlanSelection,
    StripeCardConfirmer,
};
use hoopmetrix::config::{CheckoutConfig, PaymentConfig};
use hoopmetrix::error::CheckoutError;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const TAKEN_EMAIL: &str = "taken@example.com";
const BROKEN_EMAIL: &str = "broken@example.com";
/// Signup works for this email but sign-in answers 401.
const LOCKED_EMAIL: &str = "locked@example.com";

/// How the confirm-subscription route answers.
#[derive(Clone, Copy)]
enum ConfirmReply {
    Success,
    Unsuccessful,
    ServerError,
    Garbage,
}

#[derive(Clone)]
struct FakeServer {
    received: Arc<Mutex<Vec<(String, Value)>>>,
    confirm: ConfirmReply,
}

impl FakeServer {
    fn record(&self, route: &str, body: Value) {
        self.received
            .lock()
            .unwrap()
            .push((route.to_string(), body));
    }

    fn routes(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect()
    }
}

fn authorization(headers: &HeaderMap) -> Value {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

async fn signup(State(server): State<FakeServer>, Json(body): Json<Value>) -> Response {
    server.record("signup", body.clone());
    match body["email"].as_str() {
        Some(TAKEN_EMAIL) => (
            StatusCode::CONFLICT,
            Json(json!({"error": "User already registered"})),
        )
            .into_response(),
        Some(BROKEN_EMAIL) => (StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>").into_response(),
        _ => Json(json!({"user": {"id": "user_1"}})).into_response(),
    }
}

async fn create_setup_intent(
    State(server): State<FakeServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let plan_id = body["planId"].clone();
    server.record(
        "setup_intent",
        json!({"body": body, "authorization": authorization(&headers)}),
    );
    if plan_id != "premium" {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid plan"}))).into_response();
    }
    Json(json!({
        "clientSecret": "seti_42_secret_abc",
        "customerId": "cus_42",
        "setupIntentId": "seti_42",
    }))
    .into_response()
}

async fn confirm_subscription(
    State(server): State<FakeServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    server.record(
        "confirm_subscription",
        json!({"body": body, "authorization": authorization(&headers)}),
    );
    match server.confirm {
        ConfirmReply::Success => Json(json!({"success": true})).into_response(),
        ConfirmReply::Unsuccessful => Json(json!({"success": false})).into_response(),
        ConfirmReply::ServerError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Stripe subscription creation failed"})),
        )
            .into_response(),
        ConfirmReply::Garbage => (StatusCode::OK, "not json").into_response(),
    }
}

async fn sign_in(State(server): State<FakeServer>, Json(body): Json<Value>) -> Response {
    server.record("sign_in", body.clone());
    if body["email"] == LOCKED_EMAIL {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Email not confirmed"})),
        )
            .into_response();
    }
    Json(json!({"session": {"access_token": "at_1"}})).into_response()
}

async fn stripe_confirm(
    State(server): State<FakeServer>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    server.record(
        "stripe_confirm",
        json!({"id": id, "authorization": auth, "form": form}),
    );

    match form.get("payment_method").map(String::as_str) {
        Some("pm_card_chargeDeclined") => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({"error": {
                "type": "card_error",
                "code": "card_declined",
                "message": "Your card was declined."
            }})),
        )
            .into_response(),
        Some("pm_card_authenticationRequired") => {
            Json(json!({"id": id, "object": "setup_intent", "status": "requires_action"}))
                .into_response()
        }
        _ => Json(json!({"id": id, "object": "setup_intent", "status": "succeeded"}))
            .into_response(),
    }
}

/// Start the fake backend + payment network on a random port.
async fn start_server(confirm: ConfirmReply) -> (u16, FakeServer) {
    let server = FakeServer {
        received: Arc::new(Mutex::new(Vec::new())),
        confirm,
    };
    let app = Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/stripe/create-setup-intent", post(create_setup_intent))
        .route("/api/stripe/confirm-subscription", post(confirm_subscription))
        .route("/api/auth/signin", post(sign_in))
        .route("/v1/setup_intents/{id}/confirm", post(stripe_confirm))
        .with_state(server.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, server)
}

fn config(port: u16) -> CheckoutConfig {
    CheckoutConfig {
        api_base_url: format!("http://127.0.0.1:{port}"),
        payment: Some(PaymentConfig {
            publishable_key: SecretString::from("pk_test_hoop"),
            api_base: format!("http://127.0.0.1:{port}"),
        }),
        ..CheckoutConfig::default()
    }
}

fn workflow(config: &CheckoutConfig) -> CheckoutWorkflow {
    let api = Arc::new(HttpCheckoutApi::new(config.clone()).unwrap());
    let confirmer = Arc::new(StripeCardConfirmer::new(config.payment.as_ref().unwrap()));
    CheckoutWorkflow::new(api, confirmer, config)
}

fn premium() -> PlanSelection {
    PlanSelection {
        plan_id: "premium".to_string(),
        billing_cycle: BillingCycle::Monthly,
    }
}

fn guest(email: &str) -> CheckoutForm {
    CheckoutForm::guest("Caitlin Clark", email, "logo3s!", "logo3s!")
}

#[tokio::test]
async fn guest_checkout_end_to_end() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::Success).await;
        let wf = workflow(&config(port));

        let outcome = wf
            .submit(&premium(), &guest("cc@example.com"), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap();

        assert!(outcome.account_created);
        assert!(outcome.signed_in);
        assert_eq!(outcome.customer_id, "cus_42");
        assert_eq!(outcome.redirect_to, "/membership/success");

        let received = server.received.lock().unwrap().clone();
        let routes: Vec<&str> = received.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(
            routes,
            vec![
                "signup",
                "setup_intent",
                "stripe_confirm",
                "confirm_subscription",
                "sign_in"
            ]
        );

        let stripe = &received[2].1;
        assert_eq!(stripe["id"], "seti_42");
        assert_eq!(stripe["authorization"], "Bearer pk_test_hoop");
        assert_eq!(stripe["form"]["client_secret"], "seti_42_secret_abc");
        assert_eq!(stripe["form"]["payment_method"], "pm_card_visa");

        let confirm = &received[3].1;
        assert_eq!(confirm["body"]["setupIntentId"], "seti_42");
        assert_eq!(confirm["body"]["customerId"], "cus_42");
        assert_eq!(confirm["body"]["billingCycle"], "monthly");
        // Guests carry no credentials.
        assert_eq!(confirm["authorization"], Value::Null);
        assert_eq!(received[1].1["authorization"], Value::Null);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn conflict_maps_to_account_exists() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::Success).await;
        let wf = workflow(&config(port));

        let err = wf
            .submit(&premium(), &guest(TAKEN_EMAIL), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CheckoutError::AccountExists {
                email: TAKEN_EMAIL.to_string(),
                login_page: "/login".to_string(),
            }
        );
        assert_eq!(server.received.lock().unwrap().len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn signup_error_without_json_body_uses_fallback() {
    timeout(TEST_TIMEOUT, async {
        let (port, _server) = start_server(ConfirmReply::Success).await;
        let wf = workflow(&config(port));

        let err = wf
            .submit(&premium(), &guest(BROKEN_EMAIL), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CheckoutError::Server {
                status: 500,
                message: "Failed to create account".to_string(),
            }
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn setup_intent_error_text_is_passed_through() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::Success).await;
        let wf = workflow(&config(port));

        let selection = PlanSelection {
            plan_id: "courtside".to_string(),
            billing_cycle: BillingCycle::Yearly,
        };
        let err = wf
            .submit(&selection, &guest("cc@example.com"), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Invalid plan");
        let routes: Vec<String> = server
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect();
        assert!(!routes.contains(&"stripe_confirm".to_string()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn declined_card_surfaces_network_message() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::Success).await;
        let wf = workflow(&config(port));

        let err = wf
            .submit(
                &premium(),
                &guest("cc@example.com"),
                None,
                &CardInput::new("pm_card_chargeDeclined"),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CheckoutError::PaymentNetwork {
                message: "Your card was declined.".to_string(),
                code: Some("card_declined".to_string()),
            }
        );
        let routes: Vec<String> = server
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect();
        assert!(!routes.contains(&"confirm_subscription".to_string()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn card_requiring_action_is_not_confirmed() {
    timeout(TEST_TIMEOUT, async {
        let (port, _server) = start_server(ConfirmReply::Success).await;
        let wf = workflow(&config(port));

        let err = wf
            .submit(
                &premium(),
                &guest("cc@example.com"),
                None,
                &CardInput::new("pm_card_authenticationRequired"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::CardNotConfirmed { ref status } if status == "requires_action"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unsuccessful_confirmation_is_generic_failure() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::Unsuccessful).await;
        let wf = workflow(&config(port));

        let err = wf
            .submit(&premium(), &guest("cc@example.com"), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap_err();

        assert_eq!(err, CheckoutError::SubscriptionFailed);
        let routes: Vec<String> = server
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|(r, _)| r.clone())
            .collect();
        assert!(!routes.contains(&"sign_in".to_string()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_backend_is_transport_error() {
    timeout(TEST_TIMEOUT, async {
        // Grab a free port, then close it so nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let wf = workflow(&config(port));
        let err = wf
            .submit(&premium(), &guest("cc@example.com"), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::Transport { ref endpoint, .. } if endpoint == "signup"));
        assert!(!err.is_recoverable());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn member_requests_carry_session_token() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::Success).await;
        let wf = workflow(&config(port));
        let session = AuthSession {
            user_id: "user_7".to_string(),
            email: "member@example.com".to_string(),
            access_token: SecretString::from("at_member"),
        };

        let outcome = wf
            .submit(
                &premium(),
                &CheckoutForm::member("Sue Bird", "member@example.com"),
                Some(&session),
                &CardInput::new("pm_card_visa"),
            )
            .await
            .unwrap();
        assert!(!outcome.account_created);

        let received = server.received.lock().unwrap().clone();
        let routes: Vec<&str> = received.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(
            routes,
            vec!["setup_intent", "stripe_confirm", "confirm_subscription"]
        );
        assert_eq!(received[0].1["authorization"], "Bearer at_member");
        assert_eq!(received[2].1["authorization"], "Bearer at_member");
        // The payment network still only sees the publishable key.
        assert_eq!(received[1].1["authorization"], "Bearer pk_test_hoop");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn confirmation_server_error_is_generic_failure() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::ServerError).await;
        let wf = workflow(&config(port));

        let err = wf
            .submit(&premium(), &guest("cc@example.com"), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap_err();

        assert_eq!(err, CheckoutError::SubscriptionFailed);
        assert_eq!(
            err.user_message(),
            "Failed to confirm subscription. Please try again."
        );
        assert!(!server.routes().contains(&"sign_in".to_string()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreadable_confirmation_is_generic_failure() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::Garbage).await;
        let wf = workflow(&config(port));

        let err = wf
            .submit(&premium(), &guest("cc@example.com"), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap_err();

        assert_eq!(err, CheckoutError::SubscriptionFailed);
        assert!(!server.routes().contains(&"sign_in".to_string()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rejected_sign_in_still_completes_checkout() {
    timeout(TEST_TIMEOUT, async {
        let (port, server) = start_server(ConfirmReply::Success).await;
        let wf = workflow(&config(port));

        let outcome = wf
            .submit(&premium(), &guest(LOCKED_EMAIL), None, &CardInput::new("pm_card_visa"))
            .await
            .unwrap();

        assert!(outcome.account_created);
        assert!(!outcome.signed_in);
        assert_eq!(outcome.redirect_to, "/membership/success");
        assert_eq!(server.routes().last().map(String::as_str), Some("sign_in"));
    })
    .await
    .expect("test timed out");
}

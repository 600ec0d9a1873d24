//! Checkout data model: form input, wire payloads and outcomes.
//!
//! Field names on the wire structs match what the HoopMetrix backend expects
//! (a mix of camelCase and snake_case).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recurrence of a subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl Default for BillingCycle {
    fn default() -> Self {
        Self::Monthly
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for BillingCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "year" | "annual" => Ok(Self::Yearly),
            other => Err(format!("unknown billing cycle: {other}")),
        }
    }
}

/// The plan and cycle the buyer picked before opening the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSelection {
    pub plan_id: String,
    pub billing_cycle: BillingCycle,
}

/// Data typed into the checkout form.
///
/// The password fields are only read for guests.
#[derive(Debug, Clone)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

impl CheckoutForm {
    /// A blank form, as shown when the dialog opens.
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            password: SecretString::from(""),
            confirm_password: SecretString::from(""),
        }
    }

    /// Form for a buyer who is already signed in.
    pub fn member(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::empty()
        }
    }

    /// Form for a guest who will get an account as part of checkout.
    pub fn guest(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: SecretString::from(password.into()),
            confirm_password: SecretString::from(confirm_password.into()),
        }
    }
}

/// A signed-in buyer. Its presence skips account provisioning.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub access_token: SecretString,
}

/// Reference to the hosted card element.
///
/// Holds the payment-method token the payment network issued for the card
/// field; card numbers never reach this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInput {
    pub payment_method_id: String,
}

impl CardInput {
    pub fn new(payment_method_id: impl Into<String>) -> Self {
        Self {
            payment_method_id: payment_method_id.into(),
        }
    }
}

// ── Wire payloads ───────────────────────────────────────────────────────

/// POST body for the signup endpoint.
#[derive(Debug, Serialize)]
pub struct SignupRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    #[serde(rename = "planId")]
    pub plan_id: &'a str,
    #[serde(rename = "billingCycle")]
    pub billing_cycle: BillingCycle,
}

/// Billing contact attached to the setup intent.
#[derive(Debug, Serialize)]
pub struct CustomerDetails<'a> {
    pub name: &'a str,
    pub email: &'a str,
}

/// POST body for setup-intent creation.
#[derive(Debug, Serialize)]
pub struct SetupIntentRequest<'a> {
    #[serde(rename = "planId")]
    pub plan_id: &'a str,
    #[serde(rename = "billingCycle")]
    pub billing_cycle: BillingCycle,
    pub customer_details: CustomerDetails<'a>,
}

/// Raw setup-intent creation response.
#[derive(Debug, Deserialize)]
pub(crate) struct SetupIntentWire {
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
    #[serde(rename = "customerId")]
    pub customer_id: String,
    #[serde(rename = "setupIntentId")]
    pub setup_intent_id: String,
}

/// A created setup intent, ready to be confirmed with the card.
#[derive(Debug, Clone)]
pub struct SetupIntent {
    pub client_secret: SecretString,
    pub customer_id: String,
    pub setup_intent_id: String,
}

impl From<SetupIntentWire> for SetupIntent {
    fn from(wire: SetupIntentWire) -> Self {
        Self {
            client_secret: SecretString::from(wire.client_secret),
            customer_id: wire.customer_id,
            setup_intent_id: wire.setup_intent_id,
        }
    }
}

/// POST body for subscription confirmation.
#[derive(Debug, Serialize)]
pub struct ConfirmSubscriptionRequest<'a> {
    #[serde(rename = "setupIntentId")]
    pub setup_intent_id: &'a str,
    #[serde(rename = "customerId")]
    pub customer_id: &'a str,
    #[serde(rename = "planId")]
    pub plan_id: &'a str,
    #[serde(rename = "billingCycle")]
    pub billing_cycle: BillingCycle,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmSubscriptionResponse {
    #[serde(default)]
    pub success: bool,
}

/// POST body for sign-in.
#[derive(Debug, Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Pull a human-readable message out of an error response body.
///
/// Accepts `{"error": "text"}` and `{"error": {"message": "text"}}`.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .as_str()
        .or_else(|| error.get("message").and_then(|m| m.as_str()))
        .map(str::to_string)
        .filter(|m| !m.trim().is_empty())
}

// ── Payment network ─────────────────────────────────────────────────────

/// Status of a setup intent as reported by the payment network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupIntentStatus {
    Succeeded,
    Processing,
    RequiresAction,
    RequiresPaymentMethod,
    RequiresConfirmation,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SetupIntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Succeeded => "succeeded",
            Self::Processing => "processing",
            Self::RequiresAction => "requires_action",
            Self::RequiresPaymentMethod => "requires_payment_method",
            Self::RequiresConfirmation => "requires_confirmation",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// What the payment network returned for a confirmed card setup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CardSetupResult {
    pub id: String,
    pub status: SetupIntentStatus,
}

// ── Outcome ─────────────────────────────────────────────────────────────

/// A completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOutcome {
    pub run_id: Uuid,
    pub plan: PlanSelection,
    pub customer_id: String,
    pub setup_intent_id: String,
    /// Whether checkout created a new account.
    pub account_created: bool,
    /// Whether the new account was signed in automatically.
    pub signed_in: bool,
    /// Confirmation page to send the buyer to.
    pub redirect_to: String,
}

//! Card confirmation with the payment network.
//!
//! The hosted card field hands us a payment-method token. Confirming the
//! setup intent attaches that token to the customer for future charges.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::model::{CardInput, CardSetupResult};
use crate::config::PaymentConfig;
use crate::error::CheckoutError;

/// Confirms a setup intent with the card the buyer entered.
///
/// Implementations return the payment network's result as-is; deciding
/// whether the status is good enough is up to the caller.
#[async_trait]
pub trait CardSetupConfirmer: Send + Sync {
    async fn confirm_card_setup(
        &self,
        client_secret: &SecretString,
        card: &CardInput,
    ) -> Result<CardSetupResult, CheckoutError>;
}

/// Stripe's setup-intent confirmation endpoint, called with the publishable key.
pub struct StripeCardConfirmer {
    client: reqwest::Client,
    publishable_key: SecretString,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl StripeCardConfirmer {
    pub fn new(config: &PaymentConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: &PaymentConfig) -> Self {
        Self {
            client,
            publishable_key: config.publishable_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }
}

/// The setup intent id is the part of the client secret before `_secret_`.
pub fn setup_intent_id_from_secret(client_secret: &str) -> Option<&str> {
    let (id, rest) = client_secret.split_once("_secret_")?;
    if id.starts_with("seti_") && !rest.is_empty() {
        Some(id)
    } else {
        None
    }
}

fn network_error(message: impl Into<String>, code: Option<String>) -> CheckoutError {
    CheckoutError::PaymentNetwork {
        message: message.into(),
        code,
    }
}

#[async_trait]
impl CardSetupConfirmer for StripeCardConfirmer {
    async fn confirm_card_setup(
        &self,
        client_secret: &SecretString,
        card: &CardInput,
    ) -> Result<CardSetupResult, CheckoutError> {
        let secret = client_secret.expose_secret();
        let intent_id = setup_intent_id_from_secret(secret).ok_or_else(|| {
            network_error("Invalid setup intent client secret", None)
        })?;

        let url = format!("{}/v1/setup_intents/{}/confirm", self.api_base, intent_id);
        tracing::debug!(setup_intent_id = intent_id, "Confirming card setup");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.publishable_key.expose_secret())
            .form(&[
                ("client_secret", secret),
                ("payment_method", card.payment_method_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CheckoutError::Transport {
                endpoint: "payment_network".to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| CheckoutError::Transport {
            endpoint: "payment_network".to_string(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<StripeErrorBody>(&body) {
                Ok(parsed) => network_error(
                    parsed
                        .error
                        .message
                        .unwrap_or_else(|| "Your card could not be set up.".to_string()),
                    parsed.error.code,
                ),
                Err(_) => network_error(
                    format!("Payment network returned {}", status.as_u16()),
                    None,
                ),
            });
        }

        serde_json::from_str::<CardSetupResult>(&body).map_err(|e| CheckoutError::Transport {
            endpoint: "payment_network".to_string(),
            reason: format!("unreadable setup intent: {e}"),
        })
    }
}

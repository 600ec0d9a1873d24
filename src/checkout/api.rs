//! HoopMetrix backend endpoints used by checkout.
//!
//! `CheckoutApi` is the seam the workflow talks to; `HttpCheckoutApi` is the
//! reqwest-backed implementation.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Serialize;

use super::model::{
    AuthSession, ConfirmSubscriptionRequest, ConfirmSubscriptionResponse, SetupIntent,
    SetupIntentRequest, SetupIntentWire, SignInRequest, SignupRequest, error_message,
};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, ConfigError};

/// The four backend calls checkout makes, in the order it makes them.
#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// Create an account for a guest. 409 means the email is taken.
    async fn signup(&self, request: &SignupRequest<'_>) -> Result<(), CheckoutError>;

    /// Create a setup intent and the billing customer behind it.
    ///
    /// `session` is the signed-in member, if any; its token authenticates the call.
    async fn create_setup_intent(
        &self,
        request: &SetupIntentRequest<'_>,
        session: Option<&AuthSession>,
    ) -> Result<SetupIntent, CheckoutError>;

    /// Attach the confirmed payment method to a recurring plan.
    async fn confirm_subscription(
        &self,
        request: &ConfirmSubscriptionRequest<'_>,
        session: Option<&AuthSession>,
    ) -> Result<(), CheckoutError>;

    /// Sign a user in with email and password.
    async fn sign_in(&self, request: &SignInRequest<'_>) -> Result<(), CheckoutError>;
}

/// `CheckoutApi` over HTTP.
pub struct HttpCheckoutApi {
    client: reqwest::Client,
    config: CheckoutConfig,
}

impl HttpCheckoutApi {
    /// Build a client from configuration. Applies the request timeout if one is set.
    pub fn new(config: CheckoutConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Use an existing reqwest client.
    pub fn with_client(client: reqwest::Client, config: CheckoutConfig) -> Self {
        Self { client, config }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &'static str,
        path: &str,
        body: &B,
        session: Option<&AuthSession>,
    ) -> Result<reqwest::Response, CheckoutError> {
        let url = self.config.endpoint(path);
        tracing::debug!(endpoint, %url, authenticated = session.is_some(), "POST");
        let mut req = self.client.post(&url).json(body);
        if let Some(session) = session {
            req = req.bearer_auth(session.access_token.expose_secret());
        }
        req.send()
            .await
            .map_err(|e| transport(endpoint, e))
    }
}

fn transport(endpoint: &str, err: impl std::fmt::Display) -> CheckoutError {
    CheckoutError::Transport {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    }
}

/// Turn a non-OK response into `Server`, keeping the body's error text.
async fn server_error(resp: reqwest::Response, fallback: &str) -> CheckoutError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| fallback.to_string());
    CheckoutError::Server { status, message }
}

#[async_trait]
impl CheckoutApi for HttpCheckoutApi {
    async fn signup(&self, request: &SignupRequest<'_>) -> Result<(), CheckoutError> {
        let resp = self
            .post("signup", &self.config.signup_path, request, None)
            .await?;

        if resp.status() == StatusCode::CONFLICT {
            tracing::info!("Signup rejected: account already exists");
            return Err(CheckoutError::AccountExists {
                email: request.email.to_string(),
                login_page: self.config.login_page.clone(),
            });
        }
        if !resp.status().is_success() {
            return Err(server_error(resp, "Failed to create account").await);
        }
        Ok(())
    }

    async fn create_setup_intent(
        &self,
        request: &SetupIntentRequest<'_>,
        session: Option<&AuthSession>,
    ) -> Result<SetupIntent, CheckoutError> {
        let resp = self
            .post("setup_intent", &self.config.setup_intent_path, request, session)
            .await?;

        if !resp.status().is_success() {
            return Err(server_error(resp, "Failed to create payment setup").await);
        }

        let wire: SetupIntentWire = resp
            .json()
            .await
            .map_err(|e| transport("setup_intent", e))?;
        Ok(wire.into())
    }

    async fn confirm_subscription(
        &self,
        request: &ConfirmSubscriptionRequest<'_>,
        session: Option<&AuthSession>,
    ) -> Result<(), CheckoutError> {
        let resp = self
            .post(
                "confirm_subscription",
                &self.config.confirm_subscription_path,
                request,
                session,
            )
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = error_message(&body).unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                error = %reason,
                "Subscription confirmation rejected"
            );
            return Err(CheckoutError::SubscriptionFailed);
        }

        let parsed: ConfirmSubscriptionResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Unreadable subscription confirmation response: {}", e);
                return Err(CheckoutError::SubscriptionFailed);
            }
        };
        if !parsed.success {
            return Err(CheckoutError::SubscriptionFailed);
        }
        Ok(())
    }

    async fn sign_in(&self, request: &SignInRequest<'_>) -> Result<(), CheckoutError> {
        let resp = self
            .post("sign_in", &self.config.signin_path, request, None)
            .await?;
        if !resp.status().is_success() {
            return Err(server_error(resp, "Failed to sign in").await);
        }
        Ok(())
    }
}

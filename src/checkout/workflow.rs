//! Subscription checkout workflow.
//!
//! One submission runs these steps strictly in order, each gated on the
//! previous one succeeding:
//!
//! 1. validate the form (no request on failure)
//! 2. create an account, guests only
//! 3. create a setup intent
//! 4. confirm the card with the payment network
//! 5. confirm the subscription
//! 6. sign the new account in, guests only; failure here is logged and ignored
//!
//! Nothing is retried and nothing is rolled back. An account created in step 2
//! stays created if a later step fails.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::watch;
use tracing::Instrument;

use super::api::CheckoutApi;
use super::model::{
    AuthSession, CardInput, CheckoutForm, CheckoutOutcome, ConfirmSubscriptionRequest,
    CustomerDetails, PlanSelection, SetupIntentRequest, SetupIntentStatus, SignInRequest,
    SignupRequest,
};
use super::payment::CardSetupConfirmer;
use super::state::{CheckoutPhase, CheckoutRun};
use super::validation::validate_form;
use crate::config::CheckoutConfig;
use crate::error::CheckoutError;

/// Called once per successful submission, after the outcome is built.
pub type SuccessCallback = Arc<dyn Fn(&CheckoutOutcome) + Send + Sync>;

/// Drives a checkout submission against the backend and the payment network.
pub struct CheckoutWorkflow {
    api: Arc<dyn CheckoutApi>,
    card_confirmer: Arc<dyn CardSetupConfirmer>,
    success_redirect: String,
    min_password_length: usize,
    on_success: Option<SuccessCallback>,
    progress: watch::Sender<CheckoutPhase>,
}

impl CheckoutWorkflow {
    pub fn new(
        api: Arc<dyn CheckoutApi>,
        card_confirmer: Arc<dyn CardSetupConfirmer>,
        config: &CheckoutConfig,
    ) -> Self {
        let (progress, _rx) = watch::channel(CheckoutPhase::Idle);
        Self {
            api,
            card_confirmer,
            success_redirect: config.success_redirect.clone(),
            min_password_length: config.min_password_length,
            on_success: None,
            progress,
        }
    }

    /// Register the completion callback.
    pub fn with_on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&CheckoutOutcome) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Watch the current phase, e.g. to show a busy indicator.
    pub fn subscribe(&self) -> watch::Receiver<CheckoutPhase> {
        self.progress.subscribe()
    }

    /// Run one submission and return its outcome.
    ///
    /// `session` is the signed-in buyer, if any. Without one, an account is
    /// created from the form's email and password.
    pub async fn submit(
        &self,
        selection: &PlanSelection,
        form: &CheckoutForm,
        session: Option<&AuthSession>,
        card: &CardInput,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.run(selection, form, session, card).await.1
    }

    /// Like `submit`, but also returns the run record with its phase history.
    pub async fn run(
        &self,
        selection: &PlanSelection,
        form: &CheckoutForm,
        session: Option<&AuthSession>,
        card: &CardInput,
    ) -> (CheckoutRun, Result<CheckoutOutcome, CheckoutError>) {
        let mut run = CheckoutRun::new();
        let span = tracing::info_span!(
            "checkout",
            run_id = %run.run_id,
            plan = %selection.plan_id,
            cycle = %selection.billing_cycle,
            guest = session.is_none()
        );

        let result = self
            .execute(&mut run, selection, form, session, card)
            .instrument(span)
            .await;
        (run, result)
    }

    async fn execute(
        &self,
        run: &mut CheckoutRun,
        selection: &PlanSelection,
        form: &CheckoutForm,
        session: Option<&AuthSession>,
        card: &CardInput,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        self.advance(run, CheckoutPhase::Validating);
        if let Err(e) = validate_form(form, session.is_some(), self.min_password_length) {
            return Err(self.fail(run, e));
        }

        let name = form.name.trim();
        let email = form.email.trim();
        let password = form.password.expose_secret();

        let mut account_created = false;
        if session.is_none() {
            self.advance(run, CheckoutPhase::ProvisioningAccount);
            let request = SignupRequest {
                email,
                password,
                full_name: name,
                plan_id: &selection.plan_id,
                billing_cycle: selection.billing_cycle,
            };
            if let Err(e) = self.api.signup(&request).await {
                return Err(self.fail(run, e));
            }
            account_created = true;
            tracing::info!("Account created");
        } else if let Some(session) = session {
            tracing::info!(user_id = %session.user_id, "Checking out as signed-in member");
        }

        self.advance(run, CheckoutPhase::CreatingSetupIntent);
        let request = SetupIntentRequest {
            plan_id: &selection.plan_id,
            billing_cycle: selection.billing_cycle,
            customer_details: CustomerDetails { name, email },
        };
        let intent = match self.api.create_setup_intent(&request, session).await {
            Ok(intent) => intent,
            Err(e) => return Err(self.fail(run, e)),
        };
        tracing::info!(
            customer_id = %intent.customer_id,
            setup_intent_id = %intent.setup_intent_id,
            "Setup intent created"
        );

        self.advance(run, CheckoutPhase::ConfirmingCard);
        let setup = match self
            .card_confirmer
            .confirm_card_setup(&intent.client_secret, card)
            .await
        {
            Ok(setup) => setup,
            Err(e) => return Err(self.fail(run, e)),
        };
        if setup.status != SetupIntentStatus::Succeeded {
            let err = CheckoutError::CardNotConfirmed {
                status: setup.status.to_string(),
            };
            return Err(self.fail(run, err));
        }

        self.advance(run, CheckoutPhase::ConfirmingSubscription);
        let request = ConfirmSubscriptionRequest {
            setup_intent_id: &intent.setup_intent_id,
            customer_id: &intent.customer_id,
            plan_id: &selection.plan_id,
            billing_cycle: selection.billing_cycle,
        };
        if let Err(e) = self.api.confirm_subscription(&request, session).await {
            return Err(self.fail(run, e));
        }
        tracing::info!("Subscription confirmed");

        let mut signed_in = false;
        if account_created {
            self.advance(run, CheckoutPhase::SigningIn);
            match self.api.sign_in(&SignInRequest { email, password }).await {
                Ok(()) => signed_in = true,
                Err(e) => {
                    // The subscription is already active; the buyer can sign in later.
                    tracing::warn!(error = %e, "Auto sign-in after checkout failed");
                }
            }
        }

        self.advance(run, CheckoutPhase::Done);
        let outcome = CheckoutOutcome {
            run_id: run.run_id,
            plan: selection.clone(),
            customer_id: intent.customer_id,
            setup_intent_id: intent.setup_intent_id,
            account_created,
            signed_in,
            redirect_to: self.success_redirect.clone(),
        };
        tracing::info!(
            account_created,
            signed_in,
            redirect_to = %outcome.redirect_to,
            "Checkout complete"
        );

        if let Some(ref callback) = self.on_success {
            callback(&outcome);
        }
        Ok(outcome)
    }

    fn advance(&self, run: &mut CheckoutRun, phase: CheckoutPhase) {
        if let Err(e) = run.transition_to(phase, None) {
            tracing::error!("Checkout state error: {}", e);
            return;
        }
        tracing::debug!(%phase, "Checkout phase");
        self.progress.send_replace(phase);
    }

    fn fail(&self, run: &mut CheckoutRun, err: CheckoutError) -> CheckoutError {
        let at = run.phase;
        if let Err(e) = run.transition_to(CheckoutPhase::Failed, Some(err.to_string())) {
            tracing::error!("Checkout state error: {}", e);
        }
        tracing::warn!(
            phase = %at,
            recoverable = err.is_recoverable(),
            error = %err,
            "Checkout failed"
        );
        self.progress.send_replace(CheckoutPhase::Failed);
        err
    }
}

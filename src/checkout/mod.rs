//! Premium subscription checkout.
//!
//! The buyer picks a plan, fills in the dialog and submits. The workflow then
//! provisions an account (guests only), registers the card with the payment
//! network, confirms the subscription and signs the new account in.

pub mod api;
pub mod dialog;
pub mod model;
pub mod payment;
pub mod state;
pub mod validation;
pub mod workflow;

pub use api::{CheckoutApi, HttpCheckoutApi};
pub use dialog::CheckoutDialog;
pub use model::{
    AuthSession, BillingCycle, CardInput, CardSetupResult, CheckoutForm, CheckoutOutcome,
    PlanSelection, SetupIntent, SetupIntentStatus,
};
pub use payment::{CardSetupConfirmer, StripeCardConfirmer};
pub use state::{CheckoutPhase, CheckoutRun};
pub use validation::validate_form;
pub use workflow::{CheckoutWorkflow, SuccessCallback};

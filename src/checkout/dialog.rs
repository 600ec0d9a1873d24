//! Checkout dialog state: form data, the processing flag and the error box.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::model::{AuthSession, CardInput, CheckoutForm, CheckoutOutcome, PlanSelection};
use super::workflow::CheckoutWorkflow;
use crate::error::CheckoutError;

#[derive(Debug, Default)]
struct DialogState {
    selection: Option<PlanSelection>,
    form: Option<CheckoutForm>,
    processing: bool,
    error: Option<String>,
}

/// One open checkout dialog.
///
/// Only one submission runs at a time. Once a submission starts it cannot be
/// cancelled; `cancel` only works while nothing is in flight.
pub struct CheckoutDialog {
    workflow: Arc<CheckoutWorkflow>,
    session: Option<AuthSession>,
    state: RwLock<DialogState>,
}

impl CheckoutDialog {
    pub fn new(workflow: Arc<CheckoutWorkflow>, session: Option<AuthSession>) -> Self {
        Self {
            workflow,
            session,
            state: RwLock::new(DialogState::default()),
        }
    }

    /// Open the dialog for a plan. Signed-in buyers get their email prefilled.
    pub async fn open(&self, selection: PlanSelection) {
        let mut form = CheckoutForm::empty();
        if let Some(ref session) = self.session {
            form.email = session.email.clone();
        }

        let mut state = self.state.write().await;
        state.selection = Some(selection);
        state.form = Some(form);
        state.error = None;
    }

    pub async fn is_open(&self) -> bool {
        self.state.read().await.form.is_some()
    }

    pub async fn is_processing(&self) -> bool {
        self.state.read().await.processing
    }

    /// The message currently shown in the error box.
    pub async fn error_message(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn form(&self) -> Option<CheckoutForm> {
        self.state.read().await.form.clone()
    }

    /// Edit the form. Rejected while a submission is running.
    pub async fn update_form<F>(&self, edit: F) -> Result<(), CheckoutError>
    where
        F: FnOnce(&mut CheckoutForm),
    {
        let mut state = self.state.write().await;
        if state.processing {
            return Err(CheckoutError::InProgress);
        }
        let form = state.form.as_mut().ok_or(CheckoutError::NotOpen)?;
        edit(form);
        Ok(())
    }

    /// Submit the form. On success the dialog closes; on failure it stays open
    /// with the error message set so the buyer can fix things and resubmit.
    pub async fn submit(&self, card: &CardInput) -> Result<CheckoutOutcome, CheckoutError> {
        let (selection, form) = {
            let mut state = self.state.write().await;
            if state.processing {
                return Err(CheckoutError::InProgress);
            }
            let (Some(selection), Some(form)) = (state.selection.clone(), state.form.clone())
            else {
                return Err(CheckoutError::NotOpen);
            };
            state.processing = true;
            state.error = None;
            (selection, form)
        };

        let result = self
            .workflow
            .submit(&selection, &form, self.session.as_ref(), card)
            .await;

        let mut state = self.state.write().await;
        state.processing = false;
        match &result {
            Ok(_) => {
                state.selection = None;
                state.form = None;
            }
            Err(e) => {
                state.error = Some(e.user_message());
            }
        }
        result
    }

    /// Close the dialog and drop the form. Not possible mid-submission.
    pub async fn cancel(&self) -> Result<(), CheckoutError> {
        let mut state = self.state.write().await;
        if state.processing {
            return Err(CheckoutError::InProgress);
        }
        *state = DialogState::default();
        Ok(())
    }
}

//! Client-side form validation. Runs before any request is sent.

use secrecy::ExposeSecret;

use super::model::CheckoutForm;
use crate::error::CheckoutError;

/// Validate the form.
///
/// Name and email are always required. Guests (no session) also need a
/// password of at least `min_password_length` characters that matches the
/// confirmation field. Members' password fields are ignored.
pub fn validate_form(
    form: &CheckoutForm,
    authenticated: bool,
    min_password_length: usize,
) -> Result<(), CheckoutError> {
    if form.name.trim().is_empty() || form.email.trim().is_empty() {
        return Err(CheckoutError::Validation(
            "Please fill in all required fields".to_string(),
        ));
    }

    if authenticated {
        return Ok(());
    }

    let password = form.password.expose_secret();
    if password != form.confirm_password.expose_secret() {
        return Err(CheckoutError::Validation(
            "Passwords do not match".to_string(),
        ));
    }

    if password.chars().count() < min_password_length {
        return Err(CheckoutError::Validation(format!(
            "Password must be at least {min_password_length} characters"
        )));
    }

    Ok(())
}

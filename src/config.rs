//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Backend endpoints and workflow settings for checkout.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Base URL of the HoopMetrix backend, without a trailing slash.
    pub api_base_url: String,
    pub signup_path: String,
    pub setup_intent_path: String,
    pub confirm_subscription_path: String,
    pub signin_path: String,
    /// Login page suggested when the email already has an account.
    pub login_page: String,
    /// Where the buyer lands after a successful checkout.
    pub success_redirect: String,
    /// Minimum guest password length.
    pub min_password_length: usize,
    /// Per-request HTTP timeout. `None` leaves the client default (no timeout).
    pub request_timeout: Option<Duration>,
    /// Payment network settings. `None` when no publishable key is configured.
    pub payment: Option<PaymentConfig>,
}

/// Payment network (Stripe) settings used for card confirmation.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub publishable_key: SecretString,
    pub api_base: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            signup_path: "/api/auth/signup".to_string(),
            setup_intent_path: "/api/stripe/create-setup-intent".to_string(),
            confirm_subscription_path: "/api/stripe/confirm-subscription".to_string(),
            signin_path: "/api/auth/signin".to_string(),
            login_page: "/login".to_string(),
            success_redirect: "/membership/success".to_string(),
            min_password_length: 6,
            request_timeout: None,
            payment: None,
        }
    }
}

impl CheckoutConfig {
    /// Load configuration from `HOOPMETRIX_*` and `STRIPE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let min_password_length = match lookup("HOOPMETRIX_MIN_PASSWORD_LEN") {
            Some(raw) => positive("HOOPMETRIX_MIN_PASSWORD_LEN", &raw)? as usize,
            None => defaults.min_password_length,
        };

        let request_timeout = lookup("HOOPMETRIX_REQUEST_TIMEOUT_SECS")
            .map(|raw| positive("HOOPMETRIX_REQUEST_TIMEOUT_SECS", &raw))
            .transpose()?
            .map(Duration::from_secs);

        let payment = lookup("STRIPE_PUBLISHABLE_KEY")
            .filter(|k| !k.trim().is_empty())
            .map(|key| PaymentConfig {
                publishable_key: SecretString::from(key.trim().to_string()),
                api_base: var("STRIPE_API_BASE", "https://api.stripe.com".to_string())
                    .trim_end_matches('/')
                    .to_string(),
            });

        Ok(Self {
            api_base_url: var("HOOPMETRIX_API_BASE_URL", defaults.api_base_url)
                .trim_end_matches('/')
                .to_string(),
            signup_path: var("HOOPMETRIX_SIGNUP_PATH", defaults.signup_path),
            setup_intent_path: var("HOOPMETRIX_SETUP_INTENT_PATH", defaults.setup_intent_path),
            confirm_subscription_path: var(
                "HOOPMETRIX_CONFIRM_SUBSCRIPTION_PATH",
                defaults.confirm_subscription_path,
            ),
            signin_path: var("HOOPMETRIX_SIGNIN_PATH", defaults.signin_path),
            login_page: var("HOOPMETRIX_LOGIN_PAGE", defaults.login_page),
            success_redirect: var("HOOPMETRIX_SUCCESS_REDIRECT", defaults.success_redirect),
            min_password_length,
            request_timeout,
            payment,
        })
    }

    /// Payment settings, or an error naming the missing key.
    pub fn require_payment(&self) -> Result<&PaymentConfig, ConfigError> {
        self.payment
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("STRIPE_PUBLISHABLE_KEY".to_string()))
    }

    /// Absolute URL for a backend path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

/// Parse a whole number that must be at least 1.
fn positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(invalid("must be greater than zero".to_string())),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(e.to_string())),
    }
}

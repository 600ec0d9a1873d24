//! Error types for HoopMetrix checkout.

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Why a checkout submission stopped.
///
/// Callers branch on the variant; `user_message` is only for display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    /// Client-side validation failed. No request was sent.
    #[error("{0}")]
    Validation(String),

    /// The signup endpoint answered 409.
    #[error("An account with {email} already exists")]
    AccountExists { email: String, login_page: String },

    /// Any other non-OK backend response. `message` is the body's `error` text.
    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    /// The payment network rejected the card setup.
    #[error("Payment network error: {message}")]
    PaymentNetwork { message: String, code: Option<String> },

    /// Card setup returned without an error but did not reach `succeeded`.
    #[error("Card setup did not complete (status: {status})")]
    CardNotConfirmed { status: String },

    /// Subscription confirmation answered non-OK or `success: false`.
    #[error("Subscription confirmation failed")]
    SubscriptionFailed,

    /// The request never produced a usable response.
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    /// A submission is already running for this dialog.
    #[error("A checkout is already in progress")]
    InProgress,

    /// The dialog has no plan selected, either never opened or already closed.
    #[error("Checkout dialog is not open")]
    NotOpen,
}

impl CheckoutError {
    /// Whether the buyer can fix this by editing the form and resubmitting.
    ///
    /// Terminal failures come from the backend or the network and are not
    /// something the buyer's input can change.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::AccountExists { .. }
                | Self::PaymentNetwork { .. }
                | Self::CardNotConfirmed { .. }
                | Self::InProgress
                | Self::NotOpen
        )
    }

    /// Text shown in the dialog's error box.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::AccountExists { .. } => {
                "An account with this email already exists. Please sign in instead to subscribe."
                    .to_string()
            }
            Self::Server { message, .. } => message.clone(),
            Self::PaymentNetwork { message, .. } => message.clone(),
            Self::CardNotConfirmed { .. } => {
                "Your card could not be confirmed. Please try another card.".to_string()
            }
            Self::SubscriptionFailed => {
                "Failed to confirm subscription. Please try again.".to_string()
            }
            Self::Transport { .. } => {
                "Could not reach the server. Please check your connection and try again."
                    .to_string()
            }
            Self::InProgress => "Your payment is already being processed.".to_string(),
            Self::NotOpen => "Please choose a plan to continue".to_string(),
        }
    }
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

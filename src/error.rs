use thiserror::Error;

pub type Result<T> = std::result::Result<T, CheckoutError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Checkout script '{script_id}' failed to load: {reason}")]
    ScriptLoad { script_id: String, reason: String },
    #[error("Checkout SDK is not available after script load")]
    SdkUnavailable,
    #[error("Checkout SDK failed to launch: {0}")]
    Launch(String),
    #[error("Payment cancelled by user")]
    UserCancelled,
    #[error("Payment verification timed out")]
    VerificationTimeout,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid payment session: {0}")]
    InvalidSession(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl CheckoutError {
    /// Text the hosting dialog shows for a terminal outcome.
    pub fn user_message(&self) -> &'static str {
        match self {
            CheckoutError::ScriptLoad { .. }
            | CheckoutError::SdkUnavailable
            | CheckoutError::Launch(_) => "Payment provider unavailable, please try again later.",
            CheckoutError::UserCancelled => "Payment was cancelled.",
            CheckoutError::VerificationTimeout => {
                "We could not confirm your payment yet. It may still be processing, please check back later."
            }
            CheckoutError::Transport(_) => "Network problem while contacting the payment service.",
            CheckoutError::InvalidSession(_) | CheckoutError::Config(_) | CheckoutError::Io(_) => {
                "Payment could not be started."
            }
        }
    }

    /// Whether the charge may still have gone through.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, CheckoutError::VerificationTimeout)
    }
}

impl From<std::io::Error> for CheckoutError {
    fn from(err: std::io::Error) -> Self {
        CheckoutError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for CheckoutError {
    fn from(err: reqwest::Error) -> Self {
        CheckoutError::Transport(err.to_string())
    }
}

use crate::error::CheckoutError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A strictly positive amount charged for one payment attempt.
///
/// Wraps `rust_decimal::Decimal` so that a zero or negative charge can never
/// reach the checkout surface.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, CheckoutError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(CheckoutError::InvalidSession(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = CheckoutError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Everything the caller prepares before an attempt starts.
///
/// Immutable for the life of one attempt; a retry needs a fresh session.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession {
    payment_url: String,
    payment_id: String,
    amount: Amount,
}

impl PaymentSession {
    pub fn new(
        payment_url: impl Into<String>,
        payment_id: impl Into<String>,
        amount: Decimal,
    ) -> Result<Self, CheckoutError> {
        let payment_url = payment_url.into();
        let payment_id = payment_id.into();
        if payment_url.trim().is_empty() {
            return Err(CheckoutError::InvalidSession(
                "Payment URL must not be empty".to_string(),
            ));
        }
        if payment_id.trim().is_empty() {
            return Err(CheckoutError::InvalidSession(
                "Payment id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            payment_url,
            payment_id,
            amount: Amount::new(amount)?,
        })
    }

    /// Single-use URL handed to the checkout SDK.
    pub fn payment_url(&self) -> &str {
        &self.payment_url
    }

    /// Identifier the verification endpoint is queried with.
    pub fn payment_id(&self) -> &str {
        &self.payment_id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

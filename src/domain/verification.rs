use serde::Deserialize;

/// Outcome of a single verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// The payment has definitively settled.
    Confirmed,
    /// Not settled yet, or no record exists yet.
    Pending,
}

#[derive(Debug, Deserialize)]
struct VerificationBody {
    status: String,
}

impl VerificationStatus {
    /// Reads a verification response body. Anything other than an explicit
    /// confirmed status counts as pending.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<VerificationBody>(body) {
            Ok(parsed) => Self::from_status(&parsed.status),
            Err(_) => VerificationStatus::Pending,
        }
    }

    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "confirmed" | "success" | "succeeded" | "paid" => VerificationStatus::Confirmed,
            _ => VerificationStatus::Pending,
        }
    }

    pub fn is_confirmed(self) -> bool {
        self == VerificationStatus::Confirmed
    }
}

use crate::domain::ports::{HostDocument, VerificationGateway};
use crate::domain::verification::VerificationStatus;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queries `GET {base}/verification?paymentId=<id>`.
///
/// A 2xx with a confirmed status body is a confirmation. Every other answer,
/// including a 404 for a record that does not exist yet, is pending. The
/// client has no per-request timeout; the poll deadline bounds the wait.
pub struct HttpVerificationGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpVerificationGateway {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CheckoutError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn url(&self) -> String {
        format!("{}/verification", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl VerificationGateway for HttpVerificationGateway {
    async fn check(&self, payment_id: &str) -> Result<VerificationStatus> {
        let response = self
            .client
            .get(self.url())
            .query(&[("paymentId", payment_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(payment_id, %status, "verification not available yet");
            return Ok(VerificationStatus::Pending);
        }
        let body = response.bytes().await?;
        Ok(VerificationStatus::from_body(&body))
    }
}

/// A headless document: loading a script means fetching it over HTTP.
/// Mount points are only tracked in memory.
pub struct HttpDocument {
    client: reqwest::Client,
    scripts: Mutex<HashSet<String>>,
    containers: Mutex<HashSet<String>>,
}

impl HttpDocument {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CheckoutError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            scripts: Mutex::new(HashSet::new()),
            containers: Mutex::new(HashSet::new()),
        })
    }
}

#[async_trait]
impl HostDocument for HttpDocument {
    fn has_script(&self, script_id: &str) -> bool {
        lock(&self.scripts).contains(script_id)
    }

    /// The script only counts as present once its body was fetched.
    async fn load_script(&self, script_id: &str, script_url: &str) -> Result<()> {
        let failure = |reason: String| CheckoutError::ScriptLoad {
            script_id: script_id.to_string(),
            reason,
        };

        let response = self
            .client
            .get(script_url)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("HTTP {status}")));
        }
        response
            .bytes()
            .await
            .map_err(|e| failure(e.to_string()))?;
        lock(&self.scripts).insert(script_id.to_string());
        Ok(())
    }

    fn remove_script(&self, script_id: &str) {
        lock(&self.scripts).remove(script_id);
    }

    fn mount_container(&self, container_id: &str) {
        lock(&self.containers).insert(container_id.to_string());
    }

    fn unmount_container(&self, container_id: &str) {
        lock(&self.containers).remove(container_id);
    }

    fn is_mounted(&self, container_id: &str) -> bool {
        lock(&self.containers).contains(container_id)
    }
}

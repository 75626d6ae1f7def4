use super::signal::{TerminalCallback, TransactRequest};
use super::verification::VerificationStatus;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The page hosting the checkout: its script tags and mount points.
#[async_trait]
pub trait HostDocument: Send + Sync {
    fn has_script(&self, script_id: &str) -> bool;
    /// Inserts a script tag and resolves once it has loaded.
    async fn load_script(&self, script_id: &str, script_url: &str) -> Result<()>;
    fn remove_script(&self, script_id: &str);
    fn mount_container(&self, container_id: &str);
    fn unmount_container(&self, container_id: &str);
    fn is_mounted(&self, container_id: &str) -> bool;
}

/// Adapter over the third-party checkout SDK global.
pub trait CheckoutSdk: Send + Sync {
    fn is_available(&self) -> bool;
    /// Renders the payment surface. Returns an error only if the SDK throws
    /// synchronously; the outcome arrives later through `callback`.
    fn transact(&self, request: TransactRequest, callback: TerminalCallback) -> Result<()>;
    fn close_page(&self);
}

/// Backend lookup of the true payment outcome.
#[async_trait]
pub trait VerificationGateway: Send + Sync {
    async fn check(&self, payment_id: &str) -> Result<VerificationStatus>;
}

pub type HostDocumentRef = Arc<dyn HostDocument>;
pub type CheckoutSdkRef = Arc<dyn CheckoutSdk>;
pub type VerificationGatewayRef = Arc<dyn VerificationGateway>;

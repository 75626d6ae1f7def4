use crate::domain::ports::{CheckoutSdkRef, HostDocumentRef};
use crate::domain::signal::{SurfaceType, TerminalCallback, TerminalReceiver, TransactRequest};
use crate::error::{CheckoutError, Result};

/// Hands control to the third-party checkout surface.
pub struct CheckoutLauncher {
    sdk: CheckoutSdkRef,
    document: HostDocumentRef,
}

impl CheckoutLauncher {
    pub fn new(sdk: CheckoutSdkRef, document: HostDocumentRef) -> Self {
        Self { sdk, document }
    }

    /// Renders the payment surface into `container_id`.
    ///
    /// Returns as soon as the SDK accepted the request. The returned receiver
    /// yields the terminal signal once the user is done, which may take
    /// minutes.
    pub async fn launch(&self, payment_url: &str, container_id: &str) -> Result<TerminalReceiver> {
        self.document.mount_container(container_id);
        // The SDK resolves the container by id; give the mount a tick to land.
        tokio::task::yield_now().await;

        if !self.sdk.is_available() {
            self.release_container(container_id);
            return Err(CheckoutError::SdkUnavailable);
        }

        let (callback, receiver) = TerminalCallback::channel();
        let request = TransactRequest {
            payment_url: payment_url.to_string(),
            surface: SurfaceType::Iframe,
            container_id: container_id.to_string(),
        };
        tracing::info!(container_id, "launching checkout surface");
        if let Err(err) = self.sdk.transact(request, callback) {
            self.release_container(container_id);
            return Err(match err {
                CheckoutError::Launch(_) => err,
                other => CheckoutError::Launch(other.to_string()),
            });
        }
        Ok(receiver)
    }

    /// Tells the SDK to close its surface and releases the container.
    ///
    /// Only valid once `launch` succeeded.
    pub fn close_surface(&self, container_id: &str) {
        self.sdk.close_page();
        self.release_container(container_id);
    }

    /// Unmounts the container without talking to the SDK.
    pub fn release_container(&self, container_id: &str) {
        self.document.unmount_container(container_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::HostDocument;
    use crate::domain::signal::TerminalSignal;
    use crate::infrastructure::in_memory::{InMemoryDocument, ScriptedSdk};
    use std::sync::Arc;

    fn launcher() -> (CheckoutLauncher, Arc<ScriptedSdk>, Arc<InMemoryDocument>) {
        let document = Arc::new(InMemoryDocument::new());
        let sdk = Arc::new(ScriptedSdk::manual().with_document(document.clone()));
        (
            CheckoutLauncher::new(sdk.clone(), document.clone()),
            sdk,
            document,
        )
    }

    #[tokio::test]
    async fn test_launch_mounts_container_before_transact() {
        let (launcher, sdk, document) = launcher();

        let receiver = launcher.launch("https://pay.example/s/1", "frame").await.unwrap();
        assert!(document.is_mounted("frame"));
        assert_eq!(sdk.transact_count(), 1);
        assert_eq!(sdk.requests()[0].surface, SurfaceType::Iframe);

        sdk.fire(TerminalSignal::Concluded);
        assert_eq!(receiver.await.unwrap(), TerminalSignal::Concluded);
    }

    #[tokio::test]
    async fn test_missing_sdk() {
        let (launcher, sdk, document) = launcher();
        sdk.set_available(false);

        let result = launcher.launch("https://pay.example/s/1", "frame").await;
        assert!(matches!(result, Err(CheckoutError::SdkUnavailable)));
        assert_eq!(sdk.transact_count(), 0);
        assert_eq!(sdk.close_count(), 0);
        assert!(!document.is_mounted("frame"));
    }

    #[tokio::test]
    async fn test_sdk_throwing_is_a_launch_error() {
        let (launcher, sdk, document) = launcher();
        sdk.fail_transact("invalid payment url");

        let result = launcher.launch("https://pay.example/s/1", "frame").await;
        assert_eq!(
            result.unwrap_err(),
            CheckoutError::Launch("invalid payment url".to_string())
        );
        assert!(!document.is_mounted("frame"));
    }

    #[tokio::test]
    async fn test_close_surface() {
        let (launcher, sdk, document) = launcher();
        let _receiver = launcher.launch("https://pay.example/s/1", "frame").await.unwrap();

        launcher.close_surface("frame");
        assert_eq!(sdk.close_count(), 1);
        assert!(!document.is_mounted("frame"));
        assert!(!sdk.fire(TerminalSignal::Concluded));
    }
}

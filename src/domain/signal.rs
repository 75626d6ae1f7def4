use crate::error::CheckoutError;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// One-shot value the checkout SDK reports when its surface finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalSignal {
    UserCancel,
    /// The user finished interacting. Says nothing about whether money moved.
    Concluded,
}

/// How the SDK should present the payment surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurfaceType {
    Iframe,
}

/// Arguments for the SDK's `transact` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactRequest {
    pub payment_url: String,
    #[serde(rename = "type")]
    pub surface: SurfaceType,
    pub container_id: String,
}

/// Callback handed to the SDK. Invoking it consumes it, so the terminal
/// signal can be delivered at most once per launch.
#[derive(Debug)]
pub struct TerminalCallback(oneshot::Sender<TerminalSignal>);

pub type TerminalReceiver = oneshot::Receiver<TerminalSignal>;

impl TerminalCallback {
    pub fn channel() -> (Self, TerminalReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Delivers the signal. A detached receiver (attempt already closed)
    /// silently drops it.
    pub fn invoke(self, signal: TerminalSignal) {
        if self.0.send(signal).is_err() {
            tracing::debug!(?signal, "terminal signal arrived after attempt was detached");
        }
    }

    pub fn is_detached(&self) -> bool {
        self.0.is_closed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalAction {
    /// Close the surface and fail the attempt without polling.
    Abort(CheckoutError),
    /// Close the surface and hand over to the status poller.
    Verify,
}

pub fn interpret(signal: TerminalSignal) -> TerminalAction {
    match signal {
        TerminalSignal::UserCancel => TerminalAction::Abort(CheckoutError::UserCancelled),
        TerminalSignal::Concluded => TerminalAction::Verify,
    }
}

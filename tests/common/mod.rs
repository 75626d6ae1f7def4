#![allow(dead_code)]

use checkout_orchestrator::application::orchestrator::{CheckoutOrchestrator, PaymentListener};
use checkout_orchestrator::config::OrchestratorConfig;
use checkout_orchestrator::domain::session::PaymentSession;
use checkout_orchestrator::domain::signal::TerminalSignal;
use checkout_orchestrator::domain::state::{AttemptId, LifecycleState};
use checkout_orchestrator::domain::verification::VerificationStatus;
use checkout_orchestrator::error::CheckoutError;
use checkout_orchestrator::infrastructure::in_memory::{
    InMemoryDocument, InMemoryVerificationGateway, ScriptedSdk,
};
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex, OnceLock};

/// Records everything the orchestrator reports.
#[derive(Default)]
pub struct RecordingListener {
    states: Mutex<Vec<LifecycleState>>,
    successes: Mutex<usize>,
    failures: Mutex<Vec<CheckoutError>>,
}

impl RecordingListener {
    pub fn states(&self) -> Vec<LifecycleState> {
        self.states.lock().unwrap().clone()
    }

    pub fn successes(&self) -> usize {
        *self.successes.lock().unwrap()
    }

    pub fn failures(&self) -> Vec<CheckoutError> {
        self.failures.lock().unwrap().clone()
    }
}

impl PaymentListener for RecordingListener {
    fn on_state_change(&self, _attempt: AttemptId, state: LifecycleState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_payment_success(&self) {
        *self.successes.lock().unwrap() += 1;
    }

    fn on_payment_failure(&self, reason: &CheckoutError) {
        self.failures.lock().unwrap().push(reason.clone());
    }
}

/// Closes the orchestrator from inside its own outcome callbacks, the way a
/// hosting dialog dismisses itself.
#[derive(Default)]
pub struct ClosingListener {
    pub orchestrator: OnceLock<CheckoutOrchestrator>,
    pub inner: RecordingListener,
}

impl ClosingListener {
    fn close(&self) {
        if let Some(orchestrator) = self.orchestrator.get() {
            orchestrator.close();
        }
    }
}

impl PaymentListener for ClosingListener {
    fn on_state_change(&self, attempt: AttemptId, state: LifecycleState) {
        self.inner.on_state_change(attempt, state);
    }

    fn on_payment_success(&self) {
        self.inner.on_payment_success();
        self.close();
    }

    fn on_payment_failure(&self, reason: &CheckoutError) {
        self.inner.on_payment_failure(reason);
        self.close();
    }
}

pub struct Harness {
    pub orchestrator: CheckoutOrchestrator,
    pub document: Arc<InMemoryDocument>,
    pub sdk: Arc<ScriptedSdk>,
    pub gateway: Arc<InMemoryVerificationGateway>,
    pub listener: Arc<RecordingListener>,
}

impl Harness {
    /// Manual SDK, pending gateway, reference timings.
    pub fn new() -> Self {
        Self::with_document(InMemoryDocument::new())
    }

    pub fn with_document(document: InMemoryDocument) -> Self {
        Self::build(
            document,
            InMemoryVerificationGateway::new(VerificationStatus::Pending),
        )
    }

    pub fn with_gateway(gateway: InMemoryVerificationGateway) -> Self {
        Self::build(InMemoryDocument::new(), gateway)
    }

    pub fn build(document: InMemoryDocument, gateway: InMemoryVerificationGateway) -> Self {
        let document = Arc::new(document);
        let sdk = Arc::new(ScriptedSdk::manual().with_document(document.clone()));
        let gateway = Arc::new(gateway);
        let orchestrator = CheckoutOrchestrator::new(
            OrchestratorConfig::default(),
            document.clone(),
            sdk.clone(),
            gateway.clone(),
        );
        Self {
            orchestrator,
            document,
            sdk,
            gateway,
            listener: Arc::new(RecordingListener::default()),
        }
    }

    pub fn open(&self) -> AttemptId {
        self.orchestrator.open(session(), self.listener.clone())
    }

    /// Opens an attempt whose listener closes the orchestrator on any outcome.
    pub fn open_closing(&self) -> Arc<ClosingListener> {
        let listener = Arc::new(ClosingListener::default());
        let _ = listener.orchestrator.set(self.orchestrator.clone());
        self.orchestrator.open(session(), listener.clone());
        listener
    }

    /// Lets spawned tasks run until the orchestrator reaches `state`.
    pub async fn wait_for(&self, state: LifecycleState) {
        let mut rx = self.orchestrator.subscribe();
        rx.wait_for(|current| *current == state).await.unwrap();
    }

    /// Delivers a terminal signal once the surface has been launched.
    pub async fn fire(&self, signal: TerminalSignal) {
        for _ in 0..1_000 {
            if self.sdk.fire(signal) {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("checkout surface was never launched");
    }
}

pub fn session() -> PaymentSession {
    PaymentSession::new("https://pay.example/session/abc", "pay_123", dec!(25.00)).unwrap()
}

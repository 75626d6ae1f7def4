use super::launcher::CheckoutLauncher;
use super::poller::{PollHandle, PollOutcome, PollOutcomeReceiver, StatusPoller};
use super::script_loader::ScriptLoader;
use crate::config::OrchestratorConfig;
use crate::domain::ports::{CheckoutSdkRef, HostDocumentRef, VerificationGatewayRef};
use crate::domain::session::PaymentSession;
use crate::domain::signal::{TerminalAction, TerminalSignal, interpret};
use crate::domain::state::{AttemptId, LifecycleState};
use crate::error::CheckoutError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Receives the outcome of an attempt.
///
/// Callbacks run after the orchestrator released its state lock, so a
/// listener may call `close` or `open` from inside any of them. Once an
/// attempt has been reset its listener only hears the final `Idle`.
pub trait PaymentListener: Send + Sync {
    fn on_state_change(&self, _attempt: AttemptId, _state: LifecycleState) {}

    /// Called once, after the success display delay.
    fn on_payment_success(&self);

    /// Called once when the attempt ends in `Failed`.
    fn on_payment_failure(&self, reason: &CheckoutError);
}

pub type PaymentListenerRef = Arc<dyn PaymentListener>;

struct Attempt {
    id: AttemptId,
    listener: PaymentListenerRef,
    driver: Option<JoinHandle<()>>,
    poll: Option<PollHandle>,
    /// Set once the SDK accepted `transact`; only then may `close_page` run.
    surface_open: bool,
}

enum Notice {
    State(LifecycleState),
    Success,
    Failure(CheckoutError),
    /// The attempt was reset. Delivered even though it is no longer current.
    Closed,
}

/// A listener call queued under the lock and made after it is released.
struct Notification {
    id: AttemptId,
    listener: PaymentListenerRef,
    notice: Notice,
}

#[derive(Default)]
struct Inner {
    state: LifecycleState,
    attempt: Option<Attempt>,
    last_attempt: u64,
    outbox: Vec<Notification>,
}

impl Inner {
    fn notify(&mut self, notice: Notice) {
        if let Some(attempt) = self.attempt.as_ref() {
            self.outbox.push(Notification {
                id: attempt.id,
                listener: attempt.listener.clone(),
                notice,
            });
        }
    }
}

struct Shared {
    config: OrchestratorConfig,
    loader: ScriptLoader,
    launcher: CheckoutLauncher,
    poller: StatusPoller,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<LifecycleState>,
}

/// Drives one checkout attempt at a time from script load to a verified
/// outcome.
///
/// Every state change goes through a single lock and is checked against the
/// current attempt id, so a task left over from a closed attempt can never
/// touch a newer one.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    shared: Arc<Shared>,
}

impl CheckoutOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        document: HostDocumentRef,
        sdk: CheckoutSdkRef,
        gateway: VerificationGatewayRef,
    ) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Idle);
        Self {
            shared: Arc::new(Shared {
                config,
                loader: ScriptLoader::new(document.clone()),
                launcher: CheckoutLauncher::new(sdk, document),
                poller: StatusPoller::new(gateway),
                inner: Mutex::new(Inner::default()),
                state_tx,
            }),
        }
    }

    /// Starts a new attempt, closing whatever attempt was running.
    pub fn open(&self, session: PaymentSession, listener: PaymentListenerRef) -> AttemptId {
        let shared = &self.shared;
        shared.with_inner(|inner| {
            shared.reset(inner);

            inner.last_attempt += 1;
            let id = AttemptId(inner.last_attempt);
            tracing::info!(attempt = %id, payment_id = session.payment_id(), amount = %session.amount(), "opening checkout");
            inner.attempt = Some(Attempt {
                id,
                listener,
                driver: None,
                poll: None,
                surface_open: false,
            });
            shared.transition(inner, id, LifecycleState::LoadingScript);

            let driver = tokio::spawn(drive(shared.clone(), id, session));
            if let Some(attempt) = inner.attempt.as_mut() {
                attempt.driver = Some(driver);
            }
            id
        })
    }

    /// Cancels the running attempt from any state and returns to `Idle`.
    pub fn close(&self) {
        self.shared.with_inner(|inner| self.shared.reset(inner));
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.lock().state
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.shared.lock().attempt.as_ref().map(|attempt| attempt.id)
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.shared.state_tx.subscribe()
    }

    pub fn active_poll_loops(&self) -> usize {
        self.shared.poller.active_loops()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the state lock, then delivers whatever it queued for
    /// listeners with the lock released.
    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let (result, outbox) = {
            let mut inner = self.lock();
            let result = f(&mut inner);
            (result, std::mem::take(&mut inner.outbox))
        };
        self.deliver(outbox);
        result
    }

    fn deliver(&self, outbox: Vec<Notification>) {
        for Notification {
            id,
            listener,
            notice,
        } in outbox
        {
            // A listener earlier in the batch may have closed the attempt.
            if !matches!(notice, Notice::Closed) && !Self::is_current(&self.lock(), id) {
                tracing::debug!(attempt = %id, "dropping notification for closed attempt");
                continue;
            }
            match notice {
                Notice::State(state) => listener.on_state_change(id, state),
                Notice::Success => listener.on_payment_success(),
                Notice::Failure(reason) => listener.on_payment_failure(&reason),
                Notice::Closed => listener.on_state_change(id, LifecycleState::Idle),
            }
        }
    }

    fn is_current(inner: &Inner, id: AttemptId) -> bool {
        inner.attempt.as_ref().is_some_and(|attempt| attempt.id == id)
    }

    fn transition(&self, inner: &mut Inner, id: AttemptId, next: LifecycleState) -> bool {
        if !Self::is_current(inner, id) {
            tracing::debug!(attempt = %id, %next, "ignoring transition from stale attempt");
            return false;
        }
        if !inner.state.can_transition_to(next) {
            tracing::warn!(attempt = %id, from = %inner.state, to = %next, "illegal transition ignored");
            return false;
        }
        tracing::info!(attempt = %id, from = %inner.state, to = %next, "checkout state changed");
        inner.state = next;
        self.state_tx.send_replace(next);
        inner.notify(Notice::State(next));
        true
    }

    fn clear_poll(inner: &mut Inner) {
        if let Some(poll) = inner.attempt.as_mut().and_then(|attempt| attempt.poll.take()) {
            poll.clear();
        }
    }

    /// Closes the SDK surface if `transact` was accepted, otherwise only
    /// releases the container.
    fn teardown_surface(&self, inner: &mut Inner) {
        let Some(attempt) = inner.attempt.as_mut() else {
            return;
        };
        if std::mem::take(&mut attempt.surface_open) {
            self.launcher.close_surface(&self.config.container_id);
        } else {
            self.launcher.release_container(&self.config.container_id);
        }
    }

    /// Tears down the current attempt: timers, SDK surface, driver task.
    fn reset(&self, inner: &mut Inner) {
        if inner.attempt.is_none() {
            return;
        }
        if inner.state == LifecycleState::RenderingSurface {
            self.teardown_surface(inner);
        }
        let Some(attempt) = inner.attempt.take() else {
            return;
        };
        if let Some(poll) = attempt.poll {
            poll.clear();
        }
        if let Some(driver) = attempt.driver {
            driver.abort();
        }

        let previous = inner.state;
        inner.state = LifecycleState::Idle;
        self.state_tx.send_replace(LifecycleState::Idle);
        tracing::info!(attempt = %attempt.id, from = %previous, "checkout closed");
        if previous != LifecycleState::Idle {
            inner.outbox.push(Notification {
                id: attempt.id,
                listener: attempt.listener,
                notice: Notice::Closed,
            });
        }
    }

    fn advance(&self, id: AttemptId, next: LifecycleState) -> bool {
        self.with_inner(|inner| self.transition(inner, id, next))
    }

    fn fail(&self, id: AttemptId, reason: CheckoutError) {
        self.with_inner(|inner| self.fail_locked(inner, id, reason));
    }

    fn fail_locked(&self, inner: &mut Inner, id: AttemptId, reason: CheckoutError) {
        if !Self::is_current(inner, id) || !inner.state.can_transition_to(LifecycleState::Failed) {
            return;
        }
        if inner.state == LifecycleState::RenderingSurface {
            self.teardown_surface(inner);
        }
        self.transition(inner, id, LifecycleState::Failed);
        Self::clear_poll(inner);
        tracing::warn!(attempt = %id, error = %reason, "checkout failed");
        inner.notify(Notice::Failure(reason));
    }

    /// Records that the SDK accepted the surface. Returns false when the
    /// attempt was closed meanwhile, in which case the caller owns the
    /// teardown.
    fn surface_opened(&self, id: AttemptId) -> bool {
        let mut inner = self.lock();
        match inner.attempt.as_mut() {
            Some(attempt) if attempt.id == id => {
                attempt.surface_open = true;
                true
            }
            _ => false,
        }
    }

    /// Acts on the SDK's terminal signal. Returns the poll outcome receiver
    /// when verification started.
    fn conclude_surface(
        &self,
        id: AttemptId,
        signal: TerminalSignal,
        payment_id: &str,
    ) -> Option<PollOutcomeReceiver> {
        self.with_inner(|inner| {
            if !Self::is_current(inner, id) || inner.state != LifecycleState::RenderingSurface {
                return None;
            }
            tracing::info!(attempt = %id, ?signal, "checkout surface finished");

            match interpret(signal) {
                TerminalAction::Abort(reason) => {
                    self.fail_locked(inner, id, reason);
                    None
                }
                TerminalAction::Verify => {
                    self.teardown_surface(inner);
                    if !self.transition(inner, id, LifecycleState::PollingStatus) {
                        return None;
                    }
                    // One loop per attempt.
                    Self::clear_poll(inner);
                    let (handle, outcome) = self.poller.poll(
                        payment_id,
                        self.config.poll_interval(),
                        self.config.poll_timeout(),
                    );
                    inner.attempt.as_mut()?.poll = Some(handle);
                    Some(outcome)
                }
            }
        })
    }

    fn succeed(&self, id: AttemptId) -> bool {
        self.with_inner(|inner| {
            if !self.transition(inner, id, LifecycleState::Success) {
                return false;
            }
            Self::clear_poll(inner);
            true
        })
    }

    fn time_out(&self, id: AttemptId) {
        self.with_inner(|inner| {
            if self.transition(inner, id, LifecycleState::TimedOut) {
                Self::clear_poll(inner);
                tracing::warn!(
                    attempt = %id,
                    "{}",
                    CheckoutError::VerificationTimeout.user_message()
                );
            }
        });
    }

    /// Reports success after the display delay and closes the attempt.
    fn finish_success(&self, id: AttemptId) {
        let reported = self.with_inner(|inner| {
            if !Self::is_current(inner, id) || inner.state != LifecycleState::Success {
                return false;
            }
            inner.notify(Notice::Success);
            true
        });
        // The success callback may already have closed the attempt.
        if reported {
            self.with_inner(|inner| {
                if Self::is_current(inner, id) {
                    self.reset(inner);
                }
            });
        }
    }
}

async fn drive(shared: Arc<Shared>, id: AttemptId, session: PaymentSession) {
    let config = &shared.config;
    if let Err(err) = shared
        .loader
        .ensure_loaded(&config.script_id, &config.script_url)
        .await
    {
        shared.fail(id, err);
        return;
    }

    if !shared.advance(id, LifecycleState::RenderingSurface) {
        return;
    }
    let receiver = match shared
        .launcher
        .launch(session.payment_url(), &config.container_id)
        .await
    {
        Ok(receiver) => receiver,
        Err(err) => {
            shared.fail(id, err);
            return;
        }
    };
    if !shared.surface_opened(id) {
        shared.launcher.close_surface(&config.container_id);
        return;
    }
    let signal = match receiver.await {
        Ok(signal) => signal,
        Err(_) => {
            shared.fail(
                id,
                CheckoutError::Launch("checkout surface went away without an outcome".to_string()),
            );
            return;
        }
    };

    let Some(outcome) = shared.conclude_surface(id, signal, session.payment_id()) else {
        return;
    };
    match outcome.await {
        Ok(PollOutcome::Confirmed) => {
            if shared.succeed(id) {
                tokio::time::sleep(config.success_display_delay()).await;
                shared.finish_success(id);
            }
        }
        Ok(PollOutcome::TimedOut) => shared.time_out(id),
        // Handle cleared by a close.
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verification::VerificationStatus;
    use crate::infrastructure::in_memory::{
        InMemoryDocument, InMemoryVerificationGateway, ScriptedSdk,
    };
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Silent;

    impl PaymentListener for Silent {
        fn on_payment_success(&self) {}
        fn on_payment_failure(&self, _reason: &CheckoutError) {}
    }

    fn orchestrator(signal: TerminalSignal) -> CheckoutOrchestrator {
        let document = Arc::new(InMemoryDocument::new());
        let sdk = Arc::new(
            ScriptedSdk::answering(signal, Duration::from_secs(30)).with_document(document.clone()),
        );
        let gateway = Arc::new(InMemoryVerificationGateway::new(VerificationStatus::Confirmed));
        CheckoutOrchestrator::new(OrchestratorConfig::default(), document, sdk, gateway)
    }

    fn session() -> PaymentSession {
        PaymentSession::new("https://pay.example/s/1", "pay_1", dec!(10)).unwrap()
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let orchestrator = orchestrator(TerminalSignal::Concluded);
        assert_eq!(orchestrator.state(), LifecycleState::Idle);
        assert_eq!(*orchestrator.subscribe().borrow(), LifecycleState::Idle);
        assert_eq!(orchestrator.current_attempt(), None);
    }

    #[tokio::test]
    async fn test_open_enters_loading_and_issues_new_ids() {
        let orchestrator = orchestrator(TerminalSignal::Concluded);
        let first = orchestrator.open(session(), Arc::new(Silent));
        assert_eq!(orchestrator.state(), LifecycleState::LoadingScript);

        let second = orchestrator.open(session(), Arc::new(Silent));
        assert_eq!(second, AttemptId(first.0 + 1));
        assert_eq!(orchestrator.current_attempt(), Some(second));

        orchestrator.close();
        assert_eq!(orchestrator.state(), LifecycleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_user_then_confirmed() {
        let orchestrator = orchestrator(TerminalSignal::Concluded);
        let mut states = orchestrator.subscribe();
        orchestrator.open(session(), Arc::new(Silent));

        states
            .wait_for(|state| *state == LifecycleState::Success)
            .await
            .unwrap();
        states
            .wait_for(|state| *state == LifecycleState::Idle)
            .await
            .unwrap();
        assert_eq!(orchestrator.current_attempt(), None);
    }

    #[tokio::test]
    async fn test_stale_attempt_cannot_transition() {
        let orchestrator = orchestrator(TerminalSignal::Concluded);
        let stale = orchestrator.open(session(), Arc::new(Silent));
        orchestrator.open(session(), Arc::new(Silent));

        let shared = &orchestrator.shared;
        assert!(!shared.advance(stale, LifecycleState::RenderingSurface));
        shared.fail(stale, CheckoutError::UserCancelled);
        assert_eq!(orchestrator.state(), LifecycleState::LoadingScript);
    }
}

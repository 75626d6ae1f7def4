use crate::domain::ports::{CheckoutSdk, HostDocument, HostDocumentRef, VerificationGateway};
use crate::domain::signal::{TerminalCallback, TerminalSignal, TransactRequest};
use crate::domain::verification::VerificationStatus;
use crate::error::{CheckoutError, Result};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A document kept entirely in memory.
///
/// Script loads succeed after `load_delay` unless the document is set to fail.
/// Counts every tag it inserts so callers can assert nothing was fetched twice.
#[derive(Default)]
pub struct InMemoryDocument {
    scripts: Mutex<HashSet<String>>,
    containers: Mutex<HashSet<String>>,
    injected: AtomicUsize,
    fail_loads: AtomicBool,
    load_delay: Duration,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_delay(load_delay: Duration) -> Self {
        Self {
            load_delay,
            ..Self::default()
        }
    }

    /// A document whose script loads always fail, as on a network error.
    pub fn failing() -> Self {
        let document = Self::default();
        document.set_failing(true);
        document
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_loads.store(failing, Ordering::SeqCst);
    }

    /// Number of script tags ever inserted.
    pub fn injected_count(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    /// Number of script tags currently present.
    pub fn script_count(&self) -> usize {
        lock(&self.scripts).len()
    }

    /// Adds a tag as if some other part of the page had inserted it.
    pub fn preload_script(&self, script_id: &str) {
        lock(&self.scripts).insert(script_id.to_string());
    }
}

#[async_trait]
impl HostDocument for InMemoryDocument {
    fn has_script(&self, script_id: &str) -> bool {
        lock(&self.scripts).contains(script_id)
    }

    async fn load_script(&self, script_id: &str, script_url: &str) -> Result<()> {
        lock(&self.scripts).insert(script_id.to_string());
        self.injected.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(CheckoutError::ScriptLoad {
                script_id: script_id.to_string(),
                reason: format!("failed to fetch {script_url}"),
            });
        }
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

/// Stand-in for the third-party checkout SDK.
///
/// With a configured signal it reports that signal `signal_delay` after
/// `transact`. Without one it holds the callback until [`ScriptedSdk::fire`].
/// When given a document it refuses to render into a container that is not
/// mounted, like the real SDK looking the container up by id.
pub struct ScriptedSdk {
    available: AtomicBool,
    signal: Option<TerminalSignal>,
    signal_delay: Duration,
    transact_error: Mutex<Option<String>>,
    document: Option<HostDocumentRef>,
    pending: Mutex<Option<TerminalCallback>>,
    requests: Mutex<Vec<TransactRequest>>,
    close_calls: AtomicUsize,
}

impl ScriptedSdk {
    /// An SDK that waits for [`ScriptedSdk::fire`].
    pub fn manual() -> Self {
        Self {
            available: AtomicBool::new(true),
            signal: None,
            signal_delay: Duration::ZERO,
            transact_error: Mutex::new(None),
            document: None,
            pending: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
        }
    }

    pub fn answering(signal: TerminalSignal, signal_delay: Duration) -> Self {
        Self {
            signal: Some(signal),
            signal_delay,
            ..Self::manual()
        }
    }

    pub fn with_document(mut self, document: HostDocumentRef) -> Self {
        self.document = Some(document);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes the next `transact` calls throw with `message`.
    pub fn fail_transact(&self, message: impl Into<String>) {
        *lock(&self.transact_error) = Some(message.into());
    }

    /// Delivers `signal` to the held callback. Returns `false` if there is
    /// none, either because nothing was launched or it already fired.
    pub fn fire(&self, signal: TerminalSignal) -> bool {
        match lock(&self.pending).take() {
            Some(callback) => {
                callback.invoke(signal);
                true
            }
            None => false,
        }
    }

    pub fn transact_count(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn requests(&self) -> Vec<TransactRequest> {
        lock(&self.requests).clone()
    }

    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl CheckoutSdk for ScriptedSdk {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn transact(&self, request: TransactRequest, callback: TerminalCallback) -> Result<()> {
        if let Some(message) = lock(&self.transact_error).clone() {
            return Err(CheckoutError::Launch(message));
        }
        if let Some(document) = &self.document
            && !document.is_mounted(&request.container_id)
        {
            return Err(CheckoutError::Launch(format!(
                "container '{}' not found",
                request.container_id
            )));
        }
        lock(&self.requests).push(request);

        match self.signal {
            Some(signal) => {
                let delay = self.signal_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    callback.invoke(signal);
                });
            }
            None => *lock(&self.pending) = Some(callback),
        }
        Ok(())
    }

    fn close_page(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.pending).take();
    }
}

/// Verification backend answering from a script of responses.
///
/// Each `check` pops the next scripted response; once the script runs dry it
/// answers with the fallback status. Every response is delayed by
/// `response_delay`.
pub struct InMemoryVerificationGateway {
    script: Mutex<VecDeque<Result<VerificationStatus>>>,
    fallback: Mutex<VerificationStatus>,
    response_delay: Duration,
    calls: AtomicUsize,
}

impl InMemoryVerificationGateway {
    pub fn new(fallback: VerificationStatus) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            response_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_response_delay(mut self, response_delay: Duration) -> Self {
        self.response_delay = response_delay;
        self
    }

    pub fn push_response(&self, response: Result<VerificationStatus>) {
        lock(&self.script).push_back(response);
    }

    pub fn set_fallback(&self, status: VerificationStatus) {
        *lock(&self.fallback) = status;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerificationGateway for InMemoryVerificationGateway {
    async fn check(&self, _payment_id: &str) -> Result<VerificationStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = lock(&self.script).pop_front();
        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }
        match response {
            Some(response) => response,
            None => Ok(*lock(&self.fallback)),
        }
    }
}

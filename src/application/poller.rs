use crate::domain::ports::VerificationGatewayRef;
use crate::domain::verification::VerificationStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Confirmed,
    /// The deadline passed without a confirmation. The payment may still
    /// settle server-side.
    TimedOut,
}

pub type PollOutcomeReceiver = oneshot::Receiver<PollOutcome>;

/// Owns one running poll loop.
///
/// The interval and the deadline live in the same task, so clearing the
/// handle stops both at once. Dropping the handle clears it too.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn clear(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Decrements the live-loop counter however the loop ends, abort included.
struct LoopGuard(Arc<AtomicUsize>);

impl LoopGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Asks the verification backend for the real outcome of a payment until it
/// is confirmed or a deadline passes.
pub struct StatusPoller {
    gateway: VerificationGatewayRef,
    active: Arc<AtomicUsize>,
}

impl StatusPoller {
    pub fn new(gateway: VerificationGatewayRef) -> Self {
        Self {
            gateway,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of poll loops currently running.
    pub fn active_loops(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Starts polling right away and then every `interval`, for at most
    /// `timeout`. The receiver resolves exactly once with the outcome, or is
    /// dropped without a value if the handle is cleared first.
    pub fn poll(
        &self,
        payment_id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> (PollHandle, PollOutcomeReceiver) {
        let (tx, rx) = oneshot::channel();
        let guard = LoopGuard::enter(&self.active);
        let task = tokio::spawn(run_loop(
            self.gateway.clone(),
            payment_id.to_string(),
            interval,
            timeout,
            tx,
            guard,
        ));
        (PollHandle { task }, rx)
    }
}

async fn run_loop(
    gateway: VerificationGatewayRef,
    payment_id: String,
    interval: Duration,
    timeout: Duration,
    tx: oneshot::Sender<PollOutcome>,
    _guard: LoopGuard,
) {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = JoinSet::new();
    let mut sent = 0u32;

    let outcome = loop {
        tokio::select! {
            // Deadline first: a confirmation racing the deadline loses.
            biased;
            _ = &mut deadline => break PollOutcome::TimedOut,
            Some(joined) = in_flight.join_next() => match joined {
                Ok(Ok(VerificationStatus::Confirmed)) => break PollOutcome::Confirmed,
                Ok(Ok(VerificationStatus::Pending)) => {
                    tracing::debug!(payment_id = %payment_id, "payment still pending");
                }
                Ok(Err(err)) => {
                    tracing::warn!(payment_id = %payment_id, error = %err, "verification request failed, retrying on next tick");
                }
                Err(err) => {
                    tracing::warn!(payment_id = %payment_id, error = %err, "verification request aborted");
                }
            },
            _ = ticker.tick() => {
                sent += 1;
                let gateway = gateway.clone();
                let payment_id = payment_id.clone();
                in_flight.spawn(async move { gateway.check(&payment_id).await });
            }
        }
    };

    // Late responses must not outlive the loop.
    in_flight.abort_all();
    tracing::info!(payment_id = %payment_id, ?outcome, requests = sent, "polling finished");
    let _ = tx.send(outcome);
}

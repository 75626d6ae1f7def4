use checkout_orchestrator::application::orchestrator::{CheckoutOrchestrator, PaymentListener};
use checkout_orchestrator::config::OrchestratorConfig;
use checkout_orchestrator::domain::session::PaymentSession;
use checkout_orchestrator::domain::signal::TerminalSignal;
use checkout_orchestrator::domain::state::{AttemptId, LifecycleState};
use checkout_orchestrator::error::CheckoutError;
use checkout_orchestrator::infrastructure::http::{HttpDocument, HttpVerificationGateway};
use checkout_orchestrator::infrastructure::in_memory::ScriptedSdk;
use checkout_orchestrator::logging::init_logging;
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Clone, Copy, ValueEnum)]
enum Signal {
    Concluded,
    Cancel,
}

impl From<Signal> for TerminalSignal {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Concluded => TerminalSignal::Concluded,
            Signal::Cancel => TerminalSignal::UserCancel,
        }
    }
}

/// Runs one embedded-checkout attempt and reports its verified outcome.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Single-use payment session URL
    #[arg(long)]
    payment_url: String,

    /// Payment identifier used for verification
    #[arg(long)]
    payment_id: String,

    /// Amount being charged
    #[arg(long)]
    amount: Decimal,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the verification backend
    #[arg(long)]
    verification_url: Option<String>,

    /// URL of the checkout SDK script
    #[arg(long)]
    script_url: Option<String>,

    /// Terminal signal the simulated checkout surface reports
    #[arg(long, value_enum, default_value = "concluded")]
    signal: Signal,

    /// How long the simulated user spends in the checkout surface
    #[arg(long, default_value_t = 0)]
    signal_delay_ms: u64,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    #[arg(long)]
    poll_timeout_ms: Option<u64>,

    #[arg(long)]
    display_delay_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<OrchestratorConfig> {
        let mut config = match &self.config {
            Some(path) => OrchestratorConfig::from_path(path).into_diagnostic()?,
            None => OrchestratorConfig::default(),
        };
        if let Some(url) = &self.verification_url {
            config.verification_base_url = url.clone();
        }
        if let Some(url) = &self.script_url {
            config.script_url = url.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.poll_timeout_ms {
            config.poll_timeout_ms = ms;
        }
        if let Some(ms) = self.display_delay_ms {
            config.success_display_delay_ms = ms;
        }
        if self.json_logs {
            config.log.json = true;
        }
        config.validate().into_diagnostic()?;
        Ok(config)
    }
}

enum Outcome {
    Success,
    Failed(CheckoutError),
    TimedOut,
}

/// Hands the first terminal outcome back to `main`.
struct CliListener {
    tx: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl CliListener {
    fn report(&self, outcome: Outcome) {
        if let Some(tx) = self.tx.lock().ok().and_then(|mut tx| tx.take()) {
            let _ = tx.send(outcome);
        }
    }
}

impl PaymentListener for CliListener {
    fn on_state_change(&self, _attempt: AttemptId, state: LifecycleState) {
        if state == LifecycleState::TimedOut {
            self.report(Outcome::TimedOut);
        }
    }

    fn on_payment_success(&self) {
        self.report(Outcome::Success);
    }

    fn on_payment_failure(&self, reason: &CheckoutError) {
        self.report(Outcome::Failed(reason.clone()));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    init_logging(&config.log).into_diagnostic()?;

    let session =
        PaymentSession::new(&cli.payment_url, &cli.payment_id, cli.amount).into_diagnostic()?;

    let document = Arc::new(HttpDocument::new().into_diagnostic()?);
    let sdk = Arc::new(
        ScriptedSdk::answering(cli.signal.into(), Duration::from_millis(cli.signal_delay_ms))
            .with_document(document.clone()),
    );
    let gateway =
        Arc::new(HttpVerificationGateway::new(&config.verification_base_url).into_diagnostic()?);

    let (tx, rx) = oneshot::channel();
    let listener = Arc::new(CliListener {
        tx: Mutex::new(Some(tx)),
    });

    let orchestrator = CheckoutOrchestrator::new(config, document, sdk, gateway);
    orchestrator.open(session, listener);

    let outcome = rx.await.into_diagnostic()?;
    orchestrator.close();

    match outcome {
        Outcome::Success => println!("outcome: success"),
        Outcome::Failed(reason) => println!("outcome: failed ({})", reason.user_message()),
        Outcome::TimedOut => println!(
            "outcome: timed out ({})",
            CheckoutError::VerificationTimeout.user_message()
        ),
    }
    Ok(())
}

//! Application layer sequencing a checkout attempt.
//!
//! `CheckoutOrchestrator` owns the lifecycle state and drives the script
//! loader, the checkout launcher and the status poller. Each component only
//! talks to the outside world through the ports in `domain::ports`.

pub mod launcher;
pub mod orchestrator;
pub mod poller;
pub mod script_loader;

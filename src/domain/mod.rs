//! Domain types for a checkout attempt and the ports the orchestrator
//! talks to. Nothing in here touches the network or the clock.

pub mod ports;
pub mod session;
pub mod signal;
pub mod state;
pub mod verification;

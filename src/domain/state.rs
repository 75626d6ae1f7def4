use serde::Serialize;
use std::fmt;

/// Lifecycle of one checkout attempt.
///
/// Exactly one state is active at a time. Transitions only move forward,
/// except the reset back to `Idle` when the hosting surface closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    #[default]
    Idle,
    LoadingScript,
    RenderingSurface,
    PollingStatus,
    Success,
    Failed,
    TimedOut,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LifecycleState::Success | LifecycleState::Failed | LifecycleState::TimedOut
        )
    }

    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (_, Idle) => true,
            (Idle, LoadingScript) => true,
            (LoadingScript, RenderingSurface) | (LoadingScript, Failed) => true,
            (RenderingSurface, Failed) | (RenderingSurface, PollingStatus) => true,
            (PollingStatus, Success) | (PollingStatus, TimedOut) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "IDLE",
            LifecycleState::LoadingScript => "LOADING_SCRIPT",
            LifecycleState::RenderingSurface => "RENDERING_SURFACE",
            LifecycleState::PollingStatus => "POLLING_STATUS",
            LifecycleState::Success => "SUCCESS",
            LifecycleState::Failed => "FAILED",
            LifecycleState::TimedOut => "TIMED_OUT",
        };
        f.write_str(name)
    }
}

/// Identifies one attempt; a new one is issued every time the orchestrator
/// opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//! Pipeline state machine

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Routing,
    Governing,
    Synthesizing,
    Auditing,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Routing => "routing",
            PipelineState::Governing => "governing",
            PipelineState::Synthesizing => "synthesizing",
            PipelineState::Auditing => "auditing",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        }
    }

    /// `failed` is reachable from the three processing states; a panic may
    /// also fail a run from `idle` or `auditing`.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Routing)
                | (Routing, Governing)
                | (Governing, Synthesizing)
                | (Synthesizing, Auditing)
                | (Auditing, Completed)
                | (Idle | Routing | Governing | Synthesizing | Auditing, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run state tracker recording every transition
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Move to `next`, refusing illegal transitions
    pub fn transition(&mut self, next: PipelineState) -> Result<(), String> {
        if !self.current.can_transition_to(next) {
            return Err(format!(
                "illegal pipeline transition {} -> {}",
                self.current, next
            ));
        }
        tracing::trace!(from = %self.current, to = %next, "Pipeline transition");
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut sm = StateMachine::new();
        for next in [
            PipelineState::Routing,
            PipelineState::Governing,
            PipelineState::Synthesizing,
            PipelineState::Auditing,
            PipelineState::Completed,
        ] {
            sm.transition(next).unwrap();
        }
        assert!(sm.current().is_terminal());
        assert_eq!(sm.history().len(), 6);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut sm = StateMachine::new();
        assert!(sm.transition(PipelineState::Governing).is_err());
        assert!(sm.transition(PipelineState::Completed).is_err());
        assert_eq!(sm.current(), PipelineState::Idle);

        sm.transition(PipelineState::Routing).unwrap();
        sm.transition(PipelineState::Failed).unwrap();
        assert!(sm.transition(PipelineState::Routing).is_err());
        assert!(sm.transition(PipelineState::Failed).is_err());
    }

    #[test]
    fn test_failed_reachable_from_processing_states() {
        for state in [
            PipelineState::Routing,
            PipelineState::Governing,
            PipelineState::Synthesizing,
        ] {
            assert!(state.can_transition_to(PipelineState::Failed));
        }
        assert!(!PipelineState::Completed.can_transition_to(PipelineState::Failed));
    }
}

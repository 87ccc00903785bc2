use serde::{Deserialize, Serialize};

use crate::warehouse::error::EtlError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Received,
    Validating,
    Invalid,
    DateResolved,
    ReconcilingEntities,
    FactsWritten,
    SummaryRecomputed,
    Committed,
    RolledBack,
}

impl BatchState {
    pub fn can_advance_to(self, next: BatchState) -> bool {
        use BatchState::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Validating, Invalid)
                | (Validating, DateResolved)
                | (DateResolved, ReconcilingEntities)
                | (ReconcilingEntities, FactsWritten)
                | (FactsWritten, SummaryRecomputed)
                | (SummaryRecomputed, Committed)
                | (
                    Validating | DateResolved | ReconcilingEntities | FactsWritten | SummaryRecomputed,
                    RolledBack
                )
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchState::Invalid | BatchState::Committed | BatchState::RolledBack
        )
    }
}

#[derive(Debug)]
pub struct BatchLifecycle {
    state: BatchState,
}

impl BatchLifecycle {
    pub fn new() -> Self {
        Self {
            state: BatchState::Received,
        }
    }

    /// A received batch whose envelope is being checked.
    pub fn validating() -> Self {
        tracing::debug!(from = %BatchState::Received, to = %BatchState::Validating, "batch state");
        Self {
            state: BatchState::Validating,
        }
    }

    /// Ends a batch whose envelope failed validation. Only valid while
    /// `VALIDATING`; later failures go through [Self::roll_back].
    pub fn reject(&mut self) {
        debug_assert!(
            self.state.can_advance_to(BatchState::Invalid),
            "batch rejected from {}",
            self.state
        );
        tracing::debug!(from = %self.state, to = %BatchState::Invalid, "batch state");
        self.state = BatchState::Invalid;
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn advance(&mut self, next: BatchState) -> Result<(), EtlError> {
        if !self.state.can_advance_to(next) {
            return Err(EtlError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = %self.state, to = %next, "batch state");
        self.state = next;
        Ok(())
    }

    /// Moves any non-terminal batch to `ROLLED_BACK`.
    pub fn roll_back(&mut self) {
        if !self.state.is_terminal() {
            tracing::debug!(from = %self.state, "batch rolled back");
            self.state = BatchState::RolledBack;
        }
    }
}

impl Default for BatchLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let mut lifecycle = BatchLifecycle::new();
        for next in [
            BatchState::Validating,
            BatchState::DateResolved,
            BatchState::ReconcilingEntities,
            BatchState::FactsWritten,
            BatchState::SummaryRecomputed,
            BatchState::Committed,
        ] {
            lifecycle.advance(next).unwrap();
        }
        assert_eq!(lifecycle.state(), BatchState::Committed);
        lifecycle.roll_back();
        assert_eq!(lifecycle.state(), BatchState::Committed);
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut lifecycle = BatchLifecycle::new();
        lifecycle.advance(BatchState::Validating).unwrap();
        assert!(matches!(
            lifecycle.advance(BatchState::FactsWritten),
            Err(EtlError::InvalidTransition {
                from: BatchState::Validating,
                to: BatchState::FactsWritten
            })
        ));
        lifecycle.advance(BatchState::Invalid).unwrap();
        assert!(lifecycle.advance(BatchState::RolledBack).is_err());
    }

    #[test]
    fn rejected_batches_are_invalid() {
        let mut lifecycle = BatchLifecycle::validating();
        assert_eq!(lifecycle.state(), BatchState::Validating);
        lifecycle.reject();
        assert_eq!(lifecycle.state(), BatchState::Invalid);
        lifecycle.roll_back();
        assert_eq!(lifecycle.state(), BatchState::Invalid);

        let mut lifecycle = BatchLifecycle::validating();
        lifecycle.advance(BatchState::DateResolved).unwrap();
    }

    #[test]
    #[should_panic(expected = "batch rejected from DATE_RESOLVED")]
    #[cfg(debug_assertions)]
    fn rejecting_after_validation_is_a_bug() {
        let mut lifecycle = BatchLifecycle::validating();
        lifecycle.advance(BatchState::DateResolved).unwrap();
        lifecycle.reject();
    }

    #[test]
    fn serialises_screaming_snake_case() {
        assert_eq!(
            serde_json::to_value(BatchState::SummaryRecomputed).unwrap(),
            serde_json::json!("SUMMARY_RECOMPUTED")
        );
        assert_eq!(BatchState::RolledBack.to_string(), "ROLLED_BACK");
    }
}

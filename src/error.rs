//! Error taxonomy for the supercut pipeline.

use thiserror::Error;

/// Errors raised by the candidate, selection and planning stages and by the
/// segmenter/classifier backends that feed them.
#[derive(Error, Debug)]
pub enum SupercutError {
    /// A collaborator handed over data of the wrong shape. Aborts the run.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("scene segmentation failed for {source_id}: {reason}")]
    Segmentation { source_id: String, reason: String },

    #[error("classification failed for {source_id} [{start:.2}s-{end:.2}s]: {reason}")]
    Classification {
        source_id: String,
        start: f64,
        end: f64,
        reason: String,
    },

    #[error(
        "no eligible segments among {candidates} candidates \
         (min_confidence={min_confidence}, duration {min_duration}s-{max_duration}s)"
    )]
    NoEligibleSegments {
        candidates: usize,
        min_confidence: f64,
        min_duration: f64,
        max_duration: f64,
    },

    #[error("no selection possible from {eligible} eligible segments (target_duration={target_duration}s)")]
    NoSelectionPossible { eligible: usize, target_duration: f64 },

    #[error("cannot build an assembly plan from an empty selection")]
    EmptyPlan,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("run cancelled during {0}")]
    Cancelled(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SupercutError {
    /// Programmer errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SupercutError::ContractViolation(_))
    }

    /// Errors confined to a single source; the run continues without it.
    pub fn is_source_local(&self) -> bool {
        matches!(
            self,
            SupercutError::Segmentation { .. } | SupercutError::Classification { .. }
        )
    }

    /// Terminal for the run but not the process: the caller may relax the
    /// constraints and try again.
    pub fn is_reported_outcome(&self) -> bool {
        matches!(
            self,
            SupercutError::NoEligibleSegments { .. }
                | SupercutError::NoSelectionPossible { .. }
                | SupercutError::EmptyPlan
        )
    }
}

pub type Result<T> = std::result::Result<T, SupercutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(SupercutError::ContractViolation("x".into()).is_fatal());
        assert!(!SupercutError::EmptyPlan.is_fatal());

        let seg = SupercutError::Segmentation {
            source_id: "a.mp4".into(),
            reason: "unreadable".into(),
        };
        assert!(seg.is_source_local());
        assert!(!seg.is_reported_outcome());

        let outcome = SupercutError::NoSelectionPossible {
            eligible: 0,
            target_duration: 0.0,
        };
        assert!(outcome.is_reported_outcome());
        assert!(!outcome.is_source_local());
    }

    #[test]
    fn test_no_eligible_message_carries_constraints() {
        let err = SupercutError::NoEligibleSegments {
            candidates: 4,
            min_confidence: 0.5,
            min_duration: 3.0,
            max_duration: 60.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("min_confidence=0.5"));
        assert!(msg.contains("4 candidates"));
    }
}

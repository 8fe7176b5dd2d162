//! Recovery trace: the complete, ordered record of one evaluation pass.
//!
//! The trace is built incrementally (append-only evaluations) during one
//! orchestration pass, finalized once, and then mutable only through
//! [`RecoveryTrace::report_outcome`], the single late write made after the
//! caller has executed the chosen suggestion. The outcome is intentionally
//! not wired back into strategy selection; the trace exists so a future
//! learning layer is possible.

use serde::{Deserialize, Serialize};

use super::{Applicability, Situation, StrategyResult};

/// Verdict record for one strategy within a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEvaluation {
    pub strategy_id: String,
    pub level: u8,
    pub applicability: Applicability,
    /// `None` when the strategy was skipped without a full evaluation.
    pub result: Option<StrategyResult>,
    pub evaluation_time_ms: f64,
}

/// How the executed suggestion ultimately performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceOutcome {
    Success,
    Partial,
    Failed,
    Pending,
    Unknown,
}

/// One contingency evaluation pass, end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryTrace {
    /// Unique id of this pass.
    pub id: String,
    /// Milliseconds since UNIX epoch when the pass started.
    pub timestamp_ms: u64,
    /// The situation that was evaluated.
    pub situation: Situation,
    /// Per-strategy verdicts, in evaluation order. Replaying this list
    /// reproduces the decision path exactly.
    pub evaluations: Vec<StrategyEvaluation>,
    /// Ranked, truncated suggestions.
    pub selected: Vec<StrategyResult>,
    /// Human-readable summary of the selection.
    pub selection_reason: String,
    /// Wall-clock duration of the whole pass.
    pub total_evaluation_time_ms: f64,
    /// Starts [`TraceOutcome::Pending`]; written once via `report_outcome`.
    pub outcome: TraceOutcome,
}

impl RecoveryTrace {
    /// Record how the chosen suggestion performed. Only the first report
    /// lands; later calls are ignored with a warning.
    pub fn report_outcome(&mut self, outcome: TraceOutcome) {
        if self.outcome != TraceOutcome::Pending {
            tracing::warn!(
                trace = %self.id,
                current = ?self.outcome,
                ignored = ?outcome,
                "trace outcome already reported, ignoring"
            );
            return;
        }
        self.outcome = outcome;
    }

    /// The winning suggestion, if any strategy produced one.
    pub fn best_suggestion(&self) -> Option<&StrategyResult> {
        self.selected.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contingency::SituationKind;

    fn trace() -> RecoveryTrace {
        RecoveryTrace {
            id: "trace-1".into(),
            timestamp_ms: 0,
            situation: Situation::builder(SituationKind::Failure, "t").build(),
            evaluations: vec![],
            selected: vec![],
            selection_reason: "No applicable strategies found (evaluated 0)".into(),
            total_evaluation_time_ms: 0.0,
            outcome: TraceOutcome::Pending,
        }
    }

    #[test]
    fn outcome_written_once() {
        let mut t = trace();
        t.report_outcome(TraceOutcome::Success);
        assert_eq!(t.outcome, TraceOutcome::Success);
        // A second report does not overwrite.
        t.report_outcome(TraceOutcome::Failed);
        assert_eq!(t.outcome, TraceOutcome::Success);
    }

    #[test]
    fn empty_trace_has_no_best_suggestion() {
        assert!(trace().best_suggestion().is_none());
    }
}

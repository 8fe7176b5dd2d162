//! Drives one evaluation pass over the registered strategies.
//!
//! There is no explicit state machine; the sorted strategy list drives the
//! pass. One misbehaving strategy cannot abort the pass: its error becomes a
//! synthetic `NoHelp(EvaluationFailed)` and evaluation continues.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::context::ContingencyContext;
use super::registry::{
    ContingencyConfig, EscalationPolicy, StrategyRegistry, effective_level, LAST_RESORT_SENTINEL,
};
use super::trace::{RecoveryTrace, StrategyEvaluation, TraceOutcome};
use super::{Applicability, NoHelpReason, Situation, StrategyResult};

static TRACE_COUNTER: AtomicU64 = AtomicU64::new(1);

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Evaluates strategies in escalation order and produces a ranked,
/// fully-traced recovery recommendation.
#[derive(Debug)]
pub struct Orchestrator {
    registry: StrategyRegistry,
    config: ContingencyConfig,
}

impl Orchestrator {
    pub fn new(registry: StrategyRegistry, config: ContingencyConfig) -> Self {
        Self { registry, config }
    }

    /// The built-in ladder under the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(StrategyRegistry::with_defaults(), ContingencyConfig::default())
    }

    pub fn config(&self) -> &ContingencyConfig {
        &self.config
    }

    /// One full evaluation pass. Always returns a trace, even when nothing
    /// applied; the trace outcome starts [`TraceOutcome::Pending`].
    pub fn evaluate_with_trace(
        &self,
        situation: &Situation,
        context: &ContingencyContext,
    ) -> RecoveryTrace {
        let pass_start = Instant::now();
        let ordered = self.registry.ordered_for_evaluation(&self.config);
        tracing::debug!(
            strategies = ordered.len(),
            kind = ?situation.kind,
            trigger = %situation.trigger,
            "contingency pass started"
        );

        let mut evaluations: Vec<StrategyEvaluation> = Vec::new();
        let mut suggestions: Vec<StrategyResult> = Vec::new();
        let mut considered = 0usize;
        let mut prev_level: Option<u8> = None;
        let mut suggestion_at_prev_level = false;

        for strategy in ordered {
            let level = strategy.escalation_level();
            let sort_level = effective_level(level);

            // Level boundary: under the sequential policy a productive
            // non-fallback level ends the pass.
            if let Some(prev) = prev_level
                && sort_level != prev
            {
                if self.config.policy() == EscalationPolicy::Sequential
                    && prev != LAST_RESORT_SENTINEL
                    && suggestion_at_prev_level
                {
                    tracing::debug!(level = prev, "level yielded suggestions, stopping escalation");
                    break;
                }
                suggestion_at_prev_level = false;
            }
            prev_level = Some(sort_level);
            considered += 1;

            let strategy_start = Instant::now();
            let applicability = strategy.applies_to(situation, context);

            let result = match applicability {
                Applicability::NotApplicable => None,
                Applicability::Applicable | Applicability::Unknown => {
                    match strategy.evaluate(situation, context) {
                        Ok(result) => Some(result),
                        Err(err) => {
                            tracing::warn!(
                                strategy = %strategy.id(),
                                error = %err,
                                "strategy evaluation failed"
                            );
                            Some(StrategyResult::no_help(
                                strategy.id(),
                                NoHelpReason::EvaluationFailed,
                                err.to_string(),
                            ))
                        }
                    }
                }
            };

            if let Some(result) = &result
                && result.is_suggestion()
            {
                suggestions.push(result.clone());
                suggestion_at_prev_level = true;
            }

            if self.config.trace_enabled() {
                evaluations.push(StrategyEvaluation {
                    strategy_id: strategy.id().to_string(),
                    level,
                    applicability,
                    result,
                    evaluation_time_ms: strategy_start.elapsed().as_secs_f64() * 1000.0,
                });
            }
        }

        // Rank by confidence alone, descending.
        suggestions.sort_by(|a, b| {
            b.confidence()
                .unwrap_or(0.0)
                .total_cmp(&a.confidence().unwrap_or(0.0))
        });
        let candidates = suggestions.len();
        suggestions.truncate(self.config.max_suggestions());

        let selection_reason = match suggestions.first() {
            Some(StrategyResult::Suggestion {
                strategy_id,
                action_type,
                confidence,
                ..
            }) => format!(
                "Selected \"{strategy_id}\" ({action_type}, confidence {confidence:.2}) \
                 out of {candidates} candidate suggestion(s)"
            ),
            _ => format!("No applicable strategies found (evaluated {considered})"),
        };
        tracing::info!(
            candidates,
            selected = suggestions.len(),
            reason = %selection_reason,
            "contingency pass finished"
        );

        RecoveryTrace {
            id: format!("trace-{}", TRACE_COUNTER.fetch_add(1, Ordering::Relaxed)),
            timestamp_ms: now_ms(),
            situation: situation.clone(),
            evaluations,
            selected: suggestions,
            selection_reason,
            total_evaluation_time_ms: pass_start.elapsed().as_secs_f64() * 1000.0,
            outcome: TraceOutcome::Pending,
        }
    }
}

//! Contingency recovery engine.
//!
//! Given a structured description of a stuck/failed situation, evaluates a
//! registry of pluggable strategies in escalation order and produces a ranked
//! list of suggestions plus a full execution trace.

pub mod context;
pub mod orchestrator;
pub mod registry;
pub mod strategy;
pub mod trace;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::matcher::OpportunisticResult;

/// What kind of problem the agent is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SituationKind {
    /// An action failed outright.
    Failure,
    /// No failure, but no way forward either.
    Stuck,
    /// The agent cannot decide between options.
    Uncertainty,
    /// Nothing is wrong; the agent is looking for improvements.
    Proactive,
}

/// Immutable description of a problem requiring contingency recovery.
///
/// Built once per invocation and passed by reference into every strategy
/// evaluation during one orchestration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Situation {
    pub kind: SituationKind,
    /// What raised this situation (free text, e.g. "navigation dead end").
    pub trigger: String,
    /// Where the agent currently is, if known.
    pub current_resource: Option<String>,
    /// Where the agent was trying to get, if known.
    pub target_resource: Option<String>,
    /// The action that failed, if any.
    pub failed_action: Option<String>,
    /// Structured error detail (e.g. "http_status" → "503").
    pub error_info: HashMap<String, String>,
    /// Ordered record of strategy attempts already made for this situation.
    /// Entries are strategy ids, possibly suffixed: `"backtrack:<uri>"`
    /// counts toward `"backtrack"`.
    pub attempted_strategies: Vec<String>,
}

impl Situation {
    /// Start building a situation.
    pub fn builder(kind: SituationKind, trigger: impl Into<String>) -> SituationBuilder {
        SituationBuilder {
            situation: Situation {
                kind,
                trigger: trigger.into(),
                current_resource: None,
                target_resource: None,
                failed_action: None,
                error_info: HashMap::new(),
                attempted_strategies: Vec::new(),
            },
        }
    }

    /// How many prior attempts count toward the given strategy id:
    /// exact matches plus `"{id}:..."` prefixed entries.
    pub fn attempt_count(&self, strategy_id: &str) -> usize {
        let prefix = format!("{strategy_id}:");
        self.attempted_strategies
            .iter()
            .filter(|a| *a == strategy_id || a.starts_with(&prefix))
            .count()
    }

    /// How many prior attempts match the exact entry (e.g. a specific
    /// `"backtrack:<uri>"` key).
    pub fn exact_attempt_count(&self, entry: &str) -> usize {
        self.attempted_strategies
            .iter()
            .filter(|a| *a == entry)
            .count()
    }

    /// Number of distinct base strategy ids attempted (the part before any `:`).
    pub fn distinct_attempted(&self) -> usize {
        let mut bases: Vec<&str> = self
            .attempted_strategies
            .iter()
            .map(|a| a.split(':').next().unwrap_or(a))
            .collect();
        bases.sort_unstable();
        bases.dedup();
        bases.len()
    }
}

/// Fluent builder for [`Situation`].
#[derive(Debug)]
pub struct SituationBuilder {
    situation: Situation,
}

impl SituationBuilder {
    pub fn current_resource(mut self, uri: impl Into<String>) -> Self {
        self.situation.current_resource = Some(uri.into());
        self
    }

    pub fn target_resource(mut self, uri: impl Into<String>) -> Self {
        self.situation.target_resource = Some(uri.into());
        self
    }

    pub fn failed_action(mut self, action: impl Into<String>) -> Self {
        self.situation.failed_action = Some(action.into());
        self
    }

    pub fn error(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.situation.error_info.insert(key.into(), value.into());
        self
    }

    pub fn attempted(mut self, strategy_id: impl Into<String>) -> Self {
        self.situation.attempted_strategies.push(strategy_id.into());
        self
    }

    pub fn build(self) -> Situation {
        self.situation
    }
}

/// Verdict of a cheap applicability prefilter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Applicability {
    Applicable,
    NotApplicable,
    /// The strategy cannot tell without a full evaluation.
    Unknown,
}

/// Why a strategy declined to help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoHelpReason {
    NotApplicable,
    PreconditionMissing,
    InsufficientContext,
    AlreadyAttempted,
    EvaluationFailed,
}

/// A strategy's verdict: an actionable suggestion, or a reasoned decline.
/// Created once per evaluation and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrategyResult {
    Suggestion {
        /// Attempt-tracking key; may be checkpoint-specific
        /// (e.g. `"backtrack:<uri>"`).
        strategy_id: String,
        /// What to do (e.g. "retry", "backtrack", "stop").
        action_type: String,
        /// What to do it to, if the action has a target.
        action_target: Option<String>,
        /// Confidence in [0.0, 1.0].
        confidence: f64,
        /// Estimated cost in [0.0, 1.0].
        estimated_cost: f64,
        /// Human-readable justification.
        rationale: String,
        /// Action parameters as key/value pairs.
        params: Vec<(String, String)>,
        /// Mental notes for the opportunistic scoring layer.
        opportunistic_guidance: Vec<OpportunisticResult>,
    },
    NoHelp {
        strategy_id: String,
        reason: NoHelpReason,
        explanation: String,
    },
}

impl StrategyResult {
    /// Shorthand for a decline.
    pub fn no_help(
        strategy_id: impl Into<String>,
        reason: NoHelpReason,
        explanation: impl Into<String>,
    ) -> Self {
        Self::NoHelp {
            strategy_id: strategy_id.into(),
            reason,
            explanation: explanation.into(),
        }
    }

    pub fn is_suggestion(&self) -> bool {
        matches!(self, Self::Suggestion { .. })
    }

    /// The confidence, if this is a suggestion.
    pub fn confidence(&self) -> Option<f64> {
        match self {
            Self::Suggestion { confidence, .. } => Some(*confidence),
            Self::NoHelp { .. } => None,
        }
    }

    /// The attempt-tracking key of the producing strategy.
    pub fn strategy_id(&self) -> &str {
        match self {
            Self::Suggestion { strategy_id, .. } | Self::NoHelp { strategy_id, .. } => strategy_id,
        }
    }
}

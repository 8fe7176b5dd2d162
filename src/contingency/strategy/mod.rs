//! The strategy interface and the built-in escalation ladder.
//!
//! Strategies are trait objects registered by value into the
//! [`StrategyRegistry`](crate::contingency::registry::StrategyRegistry):
//! the strategy set is intentionally open for extension, unlike the
//! vocabulary's closed pattern shapes.

pub mod backtrack;
pub mod consultation;
pub mod prediction;
pub mod retry;
pub mod stop;

use serde::{Deserialize, Serialize};

use crate::error::ContingencyError;

use super::context::ContingencyContext;
use super::{Applicability, Situation, StrategyResult};

pub use backtrack::{BacktrackConfig, BacktrackStrategy};
pub use consultation::{ConsultationConfig, ConsultationStrategy};
pub use prediction::{PredictionConfig, PredictionStrategy, PromptBuilder};
pub use retry::{RetryConfig, RetryStrategy};
pub use stop::{StopConfig, StopStrategy};

/// Which sphere a strategy operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyCategory {
    /// Pure self-directed reasoning.
    Internal,
    /// Acts on or re-reads the environment.
    Environment,
    /// Involves other agents or people.
    Social,
    /// Governed by normative/policy concerns.
    Norm,
}

/// A pluggable recovery behavior at a fixed escalation level.
///
/// Levels 1–4 order strategies from cheapest to most socially costly;
/// level 0 is the distinguished last resort, always evaluated after 1–4.
pub trait Strategy: Send + Sync {
    /// Stable registry id.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn category(&self) -> StrategyCategory;

    /// Escalation level in {0, 1, 2, 3, 4}; 0 is the last-resort fallback.
    fn escalation_level(&self) -> u8;

    /// Cheap, side-effect-free prefilter. `evaluate` is only invoked for
    /// `Applicable` or `Unknown` verdicts.
    fn applies_to(&self, situation: &Situation, context: &ContingencyContext) -> Applicability;

    /// Full evaluation. Internal failures surface as `Err` and are converted
    /// by the orchestrator into `NoHelp(EvaluationFailed)`.
    fn evaluate(
        &self,
        situation: &Situation,
        context: &ContingencyContext,
    ) -> Result<StrategyResult, ContingencyError>;
}

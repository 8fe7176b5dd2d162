//! Retry: the cheapest recovery, re-issuing a failed action after backoff.

use std::collections::HashSet;

use crate::contingency::context::ContingencyContext;
use crate::contingency::{
    Applicability, NoHelpReason, Situation, SituationKind, StrategyResult,
};
use crate::error::ContingencyError;

use super::{Strategy, StrategyCategory};

/// Tuning knobs for [`RetryStrategy`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retry attempts allowed per situation.
    pub max_attempts: usize,
    /// Backoff base delay.
    pub initial_delay_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Error signals worth retrying (HTTP status or error-type strings).
    pub retriable: HashSet<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            retriable: [
                "500",
                "502",
                "503",
                "504",
                "timeout",
                "connection_reset",
                "connection_refused",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Level-1 internal strategy: retry the failed action with exponential backoff.
#[derive(Debug, Clone, Default)]
pub struct RetryStrategy {
    config: RetryConfig,
}

impl RetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// The error signal: HTTP status if present, else the error-type string.
    fn error_signal(situation: &Situation) -> Option<&str> {
        situation
            .error_info
            .get("http_status")
            .or_else(|| situation.error_info.get("error_type"))
            .map(String::as_str)
    }

    fn is_retriable(&self, situation: &Situation) -> bool {
        Self::error_signal(situation).is_some_and(|s| self.config.retriable.contains(s))
    }

    fn base_confidence(signal: &str) -> f64 {
        match signal {
            // Service-unavailable is usually transient; plain 500 often is not.
            "503" => 0.8,
            "500" => 0.5,
            _ => 0.7,
        }
    }
}

impl Strategy for RetryStrategy {
    fn id(&self) -> &str {
        "retry"
    }

    fn name(&self) -> &str {
        "Retry with backoff"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Internal
    }

    fn escalation_level(&self) -> u8 {
        1
    }

    fn applies_to(&self, situation: &Situation, _context: &ContingencyContext) -> Applicability {
        let preconditions = situation.kind == SituationKind::Failure
            && situation.failed_action.is_some()
            && situation.target_resource.is_some()
            && self.is_retriable(situation)
            && situation.attempt_count("retry") < self.config.max_attempts;
        if preconditions {
            Applicability::Applicable
        } else {
            Applicability::NotApplicable
        }
    }

    fn evaluate(
        &self,
        situation: &Situation,
        _context: &ContingencyContext,
    ) -> Result<StrategyResult, ContingencyError> {
        if situation.kind != SituationKind::Failure {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::NotApplicable,
                "retry only recovers from outright failures",
            ));
        }
        let (Some(action), Some(target)) = (
            situation.failed_action.as_deref(),
            situation.target_resource.as_deref(),
        ) else {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::PreconditionMissing,
                "retry needs both a failed action and a target resource",
            ));
        };
        let Some(signal) = Self::error_signal(situation) else {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::InsufficientContext,
                "no error signal to judge retriability",
            ));
        };
        if !self.config.retriable.contains(signal) {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::NotApplicable,
                format!("error signal \"{signal}\" is not retriable"),
            ));
        }

        let attempts = situation.attempt_count("retry");
        if attempts >= self.config.max_attempts {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::AlreadyAttempted,
                format!("retry budget of {} exhausted", self.config.max_attempts),
            ));
        }

        let delay_ms = (self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempts as i32)) as u64;
        let confidence = Self::base_confidence(signal) * 0.8f64.powi(attempts as i32);

        Ok(StrategyResult::Suggestion {
            strategy_id: self.id().to_string(),
            action_type: "retry".into(),
            action_target: Some(target.to_string()),
            confidence,
            estimated_cost: 0.1,
            rationale: format!(
                "error \"{signal}\" is typically transient; re-issue {action} after {delay_ms}ms \
                 (attempt {} of {})",
                attempts + 1,
                self.config.max_attempts
            ),
            params: vec![
                ("delay_ms".into(), delay_ms.to_string()),
                ("attempt".into(), (attempts + 1).to_string()),
                ("error_signal".into(), signal.to_string()),
                ("action".into(), action.to_string()),
            ],
            opportunistic_guidance: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InteractionLog;
    use crate::store::MemoryFactStore;
    use std::sync::Arc;

    fn ctx() -> ContingencyContext {
        ContingencyContext::new(
            Arc::new(MemoryFactStore::new()),
            Arc::new(InteractionLog::new(8).unwrap()),
            "agent",
        )
    }

    fn failure(status: &str) -> Situation {
        Situation::builder(SituationKind::Failure, "http error")
            .failed_action("GET")
            .target_resource("http://a")
            .error("http_status", status)
            .build()
    }

    #[test]
    fn retriable_failure_is_applicable() {
        let retry = RetryStrategy::default();
        assert_eq!(
            retry.applies_to(&failure("503"), &ctx()),
            Applicability::Applicable
        );
    }

    #[test]
    fn non_retriable_status_declines() {
        let retry = RetryStrategy::default();
        assert_eq!(
            retry.applies_to(&failure("404"), &ctx()),
            Applicability::NotApplicable
        );
    }

    #[test]
    fn first_attempt_on_503() {
        let retry = RetryStrategy::default();
        let result = retry.evaluate(&failure("503"), &ctx()).unwrap();
        let StrategyResult::Suggestion {
            action_type,
            confidence,
            estimated_cost,
            params,
            ..
        } = result
        else {
            panic!("expected a suggestion");
        };
        assert_eq!(action_type, "retry");
        assert!((confidence - 0.8).abs() < 1e-12);
        assert!((estimated_cost - 0.1).abs() < 1e-12);
        assert!(params.contains(&("delay_ms".into(), "1000".into())));
    }

    #[test]
    fn backoff_and_confidence_decay() {
        let retry = RetryStrategy::default();
        let mut situation = failure("503");
        situation.attempted_strategies = vec!["retry".into(), "retry".into()];

        let result = retry.evaluate(&situation, &ctx()).unwrap();
        let StrategyResult::Suggestion {
            confidence, params, ..
        } = result
        else {
            panic!("expected a suggestion");
        };
        // 1000 * 2^2 and 0.8 * 0.8^2.
        assert!(params.contains(&("delay_ms".into(), "4000".into())));
        assert!((confidence - 0.8 * 0.64).abs() < 1e-12);
    }

    #[test]
    fn exhaustion_makes_it_not_applicable() {
        let retry = RetryStrategy::default();
        let mut situation = failure("503");
        situation.attempted_strategies = vec!["retry".into(); 3];

        assert_eq!(
            retry.applies_to(&situation, &ctx()),
            Applicability::NotApplicable
        );
        let result = retry.evaluate(&situation, &ctx()).unwrap();
        assert!(matches!(
            result,
            StrategyResult::NoHelp {
                reason: NoHelpReason::AlreadyAttempted,
                ..
            }
        ));
    }

    #[test]
    fn error_type_string_also_counts() {
        let retry = RetryStrategy::default();
        let situation = Situation::builder(SituationKind::Failure, "net")
            .failed_action("GET")
            .target_resource("http://a")
            .error("error_type", "timeout")
            .build();
        assert_eq!(
            retry.applies_to(&situation, &ctx()),
            Applicability::Applicable
        );
        let result = retry.evaluate(&situation, &ctx()).unwrap();
        // Default base confidence for non-5xx signals.
        assert!((result.confidence().unwrap() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn missing_action_is_a_precondition_failure() {
        let retry = RetryStrategy::default();
        let situation = Situation::builder(SituationKind::Failure, "x")
            .target_resource("http://a")
            .error("http_status", "503")
            .build();
        assert_eq!(
            retry.applies_to(&situation, &ctx()),
            Applicability::NotApplicable
        );
        let result = retry.evaluate(&situation, &ctx()).unwrap();
        assert!(matches!(
            result,
            StrategyResult::NoHelp {
                reason: NoHelpReason::PreconditionMissing,
                ..
            }
        ));
    }
}

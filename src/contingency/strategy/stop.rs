//! Stop: the level-0 last resort, giving up with a reasoned summary.

use crate::contingency::context::ContingencyContext;
use crate::contingency::{Applicability, Situation, StrategyResult};
use crate::error::ContingencyError;

use super::{Strategy, StrategyCategory};

/// Tuning knobs for [`StopStrategy`].
#[derive(Debug, Clone)]
pub struct StopConfig {
    /// Distinct strategies that must have been attempted before stopping.
    pub exhaustion_threshold: usize,
    /// When false, stop is always applicable (immediate-stop variant).
    pub require_exhaustion: bool,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            exhaustion_threshold: 2,
            require_exhaustion: true,
        }
    }
}

/// Level-0 internal strategy: stop trying.
///
/// Always sorted last by the registry (level 0 maps to the sentinel), and
/// only applicable once enough distinct strategies have been exhausted,
/// unless built via [`StopStrategy::immediate`].
#[derive(Debug, Clone, Default)]
pub struct StopStrategy {
    config: StopConfig,
}

impl StopStrategy {
    pub fn new(config: StopConfig) -> Self {
        Self { config }
    }

    /// Variant that stops without requiring exhaustion first.
    pub fn immediate() -> Self {
        Self::new(StopConfig {
            require_exhaustion: false,
            ..StopConfig::default()
        })
    }

    /// Classify why the agent is giving up.
    fn stop_reason(&self, situation: &Situation) -> &'static str {
        match situation.error_info.get("http_status").map(String::as_str) {
            Some("401") | Some("403") => "access_denied",
            Some("410") => "resource_gone",
            _ if situation.distinct_attempted() >= self.config.exhaustion_threshold => "exhausted",
            _ => "unrecoverable",
        }
    }

    /// One-line summary of the final error state.
    fn final_error_summary(&self, situation: &Situation) -> String {
        let mut parts = vec![format!("trigger: {}", situation.trigger)];
        if let Some(action) = &situation.failed_action {
            parts.push(format!("failed action: {action}"));
        }
        if !situation.error_info.is_empty() {
            let mut pairs: Vec<String> = situation
                .error_info
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            pairs.sort();
            parts.push(format!("errors: {}", pairs.join(", ")));
        }
        parts.push(format!(
            "{} distinct strategies attempted",
            situation.distinct_attempted()
        ));
        parts.join("; ")
    }
}

impl Strategy for StopStrategy {
    fn id(&self) -> &str {
        "stop"
    }

    fn name(&self) -> &str {
        "Stop trying"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Internal
    }

    fn escalation_level(&self) -> u8 {
        0
    }

    fn applies_to(&self, situation: &Situation, _context: &ContingencyContext) -> Applicability {
        if self.config.require_exhaustion
            && situation.distinct_attempted() < self.config.exhaustion_threshold
        {
            return Applicability::NotApplicable;
        }
        Applicability::Applicable
    }

    fn evaluate(
        &self,
        situation: &Situation,
        _context: &ContingencyContext,
    ) -> Result<StrategyResult, ContingencyError> {
        let reason = self.stop_reason(situation);
        tracing::info!(reason, "recommending stop");

        Ok(StrategyResult::Suggestion {
            strategy_id: self.id().to_string(),
            action_type: "stop".into(),
            action_target: situation
                .target_resource
                .clone()
                .or_else(|| situation.current_resource.clone()),
            confidence: 1.0,
            estimated_cost: 1.0,
            rationale: self.final_error_summary(situation),
            params: vec![
                ("reason".into(), reason.to_string()),
                (
                    "attempted".into(),
                    situation.attempted_strategies.join(","),
                ),
            ],
            opportunistic_guidance: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contingency::SituationKind;
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

    #[test]
    fn requires_exhaustion_by_default() {
        let stop = StopStrategy::default();
        let fresh = Situation::builder(SituationKind::Failure, "t").build();
        assert_eq!(stop.applies_to(&fresh, &ctx()), Applicability::NotApplicable);

        let one = Situation::builder(SituationKind::Failure, "t")
            .attempted("retry")
            .attempted("retry")
            .build();
        // Two retry attempts are one distinct strategy.
        assert_eq!(stop.applies_to(&one, &ctx()), Applicability::NotApplicable);

        let two = Situation::builder(SituationKind::Failure, "t")
            .attempted("retry")
            .attempted("backtrack:http://a")
            .build();
        assert_eq!(stop.applies_to(&two, &ctx()), Applicability::Applicable);
    }

    #[test]
    fn immediate_variant_always_applies() {
        let stop = StopStrategy::immediate();
        let fresh = Situation::builder(SituationKind::Failure, "t").build();
        assert_eq!(stop.applies_to(&fresh, &ctx()), Applicability::Applicable);
    }

    #[test]
    fn reason_classification() {
        let stop = StopStrategy::default();
        let denied = Situation::builder(SituationKind::Failure, "t")
            .error("http_status", "403")
            .build();
        assert_eq!(stop.stop_reason(&denied), "access_denied");

        let gone = Situation::builder(SituationKind::Failure, "t")
            .error("http_status", "410")
            .build();
        assert_eq!(stop.stop_reason(&gone), "resource_gone");

        let exhausted = Situation::builder(SituationKind::Failure, "t")
            .attempted("retry")
            .attempted("prediction")
            .build();
        assert_eq!(stop.stop_reason(&exhausted), "exhausted");

        let hopeless = Situation::builder(SituationKind::Failure, "t").build();
        assert_eq!(stop.stop_reason(&hopeless), "unrecoverable");
    }

    #[test]
    fn maximum_confidence_and_cost() {
        let stop = StopStrategy::default();
        let situation = Situation::builder(SituationKind::Failure, "http error")
            .target_resource("http://a")
            .failed_action("GET")
            .error("http_status", "403")
            .attempted("retry")
            .attempted("prediction")
            .build();
        let result = stop.evaluate(&situation, &ctx()).unwrap();
        let StrategyResult::Suggestion {
            action_type,
            action_target,
            confidence,
            estimated_cost,
            params,
            rationale,
            ..
        } = result
        else {
            panic!("expected a suggestion");
        };
        assert_eq!(action_type, "stop");
        assert_eq!(action_target.as_deref(), Some("http://a"));
        assert_eq!(confidence, 1.0);
        assert_eq!(estimated_cost, 1.0);
        assert!(params.contains(&("reason".into(), "access_denied".into())));
        assert!(rationale.contains("http error"));
    }
}

//! Consultation: ask for outside help, admitting what already failed.
//!
//! Deliberately marked [`Applicability::Unknown`] when nothing has been
//! attempted yet: social escalation should not be the first resort, but the
//! orchestrator may still evaluate it when nothing cheaper applied.

use crate::contingency::context::ContingencyContext;
use crate::contingency::{Applicability, NoHelpReason, Situation, StrategyResult};
use crate::error::ContingencyError;

use super::{Strategy, StrategyCategory};

/// Tuning knobs for [`ConsultationStrategy`].
#[derive(Debug, Clone)]
pub struct ConsultationConfig {
    /// Consultations allowed per situation.
    pub max_consultations: usize,
    /// Confidence assigned when the channel reports none.
    pub base_confidence: f64,
    /// How many recent interactions the narrative mentions.
    pub max_interactions: usize,
    /// Neighborhood bound for the structured context block.
    pub max_neighborhood: usize,
}

impl Default for ConsultationConfig {
    fn default() -> Self {
        Self {
            max_consultations: 1,
            base_confidence: 0.5,
            max_interactions: 5,
            max_neighborhood: 20,
        }
    }
}

/// Level-4 social strategy: consult an external helper over the
/// text-generation channel.
#[derive(Debug, Clone, Default)]
pub struct ConsultationStrategy {
    config: ConsultationConfig,
}

impl ConsultationStrategy {
    pub fn new(config: ConsultationConfig) -> Self {
        Self { config }
    }

    /// First-person help request. Unlike prediction's neutral framing this
    /// admits prior failures up front.
    fn build_narrative(
        &self,
        situation: &Situation,
        context: &ContingencyContext,
    ) -> String {
        let mut narrative = String::from("I need help. ");
        narrative.push_str(&format!(
            "I ran into trouble ({}) and my own recovery attempts have not worked. ",
            situation.trigger
        ));
        if !situation.attempted_strategies.is_empty() {
            narrative.push_str(&format!(
                "I already tried the following without success: {}. ",
                situation.attempted_strategies.join(", ")
            ));
        }
        if let Some(current) = context.resolve_current_resource(situation) {
            narrative.push_str(&format!("I am currently at {current}. "));
            let neighborhood = context.neighborhood(&current, self.config.max_neighborhood);
            narrative.push_str(&format!(
                "I can see {} related fact(s) around it. ",
                neighborhood.len()
            ));
        }
        if let Some(target) = &situation.target_resource {
            narrative.push_str(&format!("I was trying to reach {target}. "));
        }
        if let Some(action) = &situation.failed_action {
            narrative.push_str(&format!("The action that failed was {action}. "));
        }

        let interactions = context.format_recent_interactions(self.config.max_interactions);
        if !interactions.is_empty() {
            narrative.push_str("\n\nMy recent steps were:\n");
            narrative.push_str(&interactions.join("\n"));
        }

        narrative.push_str(
            "\n\nWhat should I do? Answer with tagged lines:\n\
             ACTION: <verb>\n\
             TARGET: <resource uri, if any>\n\
             EXPLANATION: <one sentence>\n\
             CONFIDENCE: <0.0-1.0>\n",
        );
        narrative
    }
}

impl Strategy for ConsultationStrategy {
    fn id(&self) -> &str {
        "consultation"
    }

    fn name(&self) -> &str {
        "Consult external helper"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Social
    }

    fn escalation_level(&self) -> u8 {
        4
    }

    fn applies_to(&self, situation: &Situation, context: &ContingencyContext) -> Applicability {
        let Some(channel) = context.text_generation() else {
            return Applicability::NotApplicable;
        };
        if situation.attempt_count("consultation") >= self.config.max_consultations {
            return Applicability::NotApplicable;
        }
        if !channel.is_available() {
            return Applicability::NotApplicable;
        }
        // Never the first resort.
        if situation.attempted_strategies.is_empty() {
            return Applicability::Unknown;
        }
        Applicability::Applicable
    }

    fn evaluate(
        &self,
        situation: &Situation,
        context: &ContingencyContext,
    ) -> Result<StrategyResult, ContingencyError> {
        let Some(channel) = context.text_generation() else {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::PreconditionMissing,
                "no consultation channel configured",
            ));
        };
        if situation.attempt_count("consultation") >= self.config.max_consultations {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::AlreadyAttempted,
                format!(
                    "consultation limit of {} reached",
                    self.config.max_consultations
                ),
            ));
        }

        let narrative = self.build_narrative(situation, context);
        tracing::debug!(narrative_chars = narrative.len(), "consulting external helper");

        let raw = channel.complete(&narrative)?;

        let parsed = match context.parser().parse(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "consultation reply did not parse");
                return Ok(StrategyResult::no_help(
                    self.id(),
                    NoHelpReason::EvaluationFailed,
                    format!("helper reply did not parse: {err}"),
                ));
            }
        };

        Ok(StrategyResult::Suggestion {
            strategy_id: self.id().to_string(),
            action_type: parsed.action,
            action_target: parsed.target,
            confidence: parsed.confidence.unwrap_or(self.config.base_confidence),
            estimated_cost: 0.6,
            rationale: parsed
                .explanation
                .unwrap_or_else(|| "externally suggested recovery".into()),
            params: vec![(
                "prior_attempts".into(),
                situation.attempted_strategies.len().to_string(),
            )],
            opportunistic_guidance: vec![],
        })
    }
}

//! Prediction: ask the text-generation client what to do next.
//!
//! The strategy owns the context bounding (last few interactions, a small
//! graph neighborhood) so prompt size stays fixed regardless of how much the
//! agent has seen. Prompt wording is pluggable through [`PromptBuilder`];
//! output structure is imposed by the context's
//! [`ResponseParser`](crate::llm::ResponseParser).

use crate::contingency::context::ContingencyContext;
use crate::contingency::{
    Applicability, NoHelpReason, Situation, SituationKind, StrategyResult,
};
use crate::error::ContingencyError;

use super::{Strategy, StrategyCategory};

/// Tuning knobs for [`PredictionStrategy`].
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Confidence assigned when the model reports none.
    pub base_confidence: f64,
    /// How many recent interactions to include in the prompt.
    pub max_interactions: usize,
    /// How many neighborhood triples to include in the prompt.
    pub max_neighborhood: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_confidence: 0.6,
            max_interactions: 5,
            max_neighborhood: 20,
        }
    }
}

/// Turns the bounded context sections into a prompt string.
pub trait PromptBuilder: Send + Sync {
    /// `sections` is an ordered list of labelled context blocks.
    fn build(&self, sections: &[(String, String)]) -> String;
}

/// Default prompt: first-person, neutral "what would I do next" framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextActionPrompt;

impl PromptBuilder for NextActionPrompt {
    fn build(&self, sections: &[(String, String)]) -> String {
        let mut prompt = String::from(
            "I am an agent navigating linked resources and I am unsure what to do next.\n\
             Given my situation below, what would I do next?\n\n",
        );
        for (label, body) in sections {
            prompt.push_str(label);
            prompt.push_str(":\n");
            prompt.push_str(body);
            prompt.push_str("\n\n");
        }
        prompt.push_str(
            "Answer with tagged lines:\n\
             ACTION: <verb>\n\
             TARGET: <resource uri, if any>\n\
             EXPLANATION: <one sentence>\n\
             CONFIDENCE: <0.0-1.0>\n",
        );
        prompt
    }
}

/// Level-2 internal strategy: one-shot next-action prediction via the
/// text-generation client.
pub struct PredictionStrategy {
    config: PredictionConfig,
    prompt_builder: Box<dyn PromptBuilder>,
}

impl Default for PredictionStrategy {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

impl PredictionStrategy {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            config,
            prompt_builder: Box::new(NextActionPrompt),
        }
    }

    /// Swap in a different prompt wording.
    pub fn with_prompt_builder(mut self, builder: Box<dyn PromptBuilder>) -> Self {
        self.prompt_builder = builder;
        self
    }

    /// The bounded context map handed to the prompt builder.
    fn context_sections(
        &self,
        situation: &Situation,
        context: &ContingencyContext,
        current: &str,
    ) -> Vec<(String, String)> {
        let mut sections = Vec::new();

        let kind = match situation.kind {
            SituationKind::Failure => "an action failed",
            SituationKind::Stuck => "I am stuck with no way forward",
            SituationKind::Uncertainty => "I cannot decide between options",
            SituationKind::Proactive => "I am looking for improvements",
        };
        sections.push(("Situation".into(), format!("{kind} ({})", situation.trigger)));
        sections.push(("Current resource".into(), current.to_string()));
        if let Some(target) = &situation.target_resource {
            sections.push(("Target resource".into(), target.clone()));
        }
        if let Some(action) = &situation.failed_action {
            sections.push(("Failed action".into(), action.clone()));
        }
        if !situation.error_info.is_empty() {
            let mut pairs: Vec<String> = situation
                .error_info
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            pairs.sort();
            sections.push(("Error detail".into(), pairs.join(", ")));
        }
        if !situation.attempted_strategies.is_empty() {
            sections.push((
                "Already attempted".into(),
                situation.attempted_strategies.join(", "),
            ));
        }

        let interactions = context.format_recent_interactions(self.config.max_interactions);
        if !interactions.is_empty() {
            sections.push(("Recent interactions".into(), interactions.join("\n")));
        }

        let neighborhood = context.neighborhood(current, self.config.max_neighborhood);
        if !neighborhood.is_empty() {
            let triples: Vec<String> = neighborhood.iter().map(|t| t.to_string()).collect();
            sections.push(("Nearby facts".into(), triples.join("\n")));
        }

        sections
    }
}

impl Strategy for PredictionStrategy {
    fn id(&self) -> &str {
        "prediction"
    }

    fn name(&self) -> &str {
        "Next-action prediction"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Internal
    }

    fn escalation_level(&self) -> u8 {
        2
    }

    fn applies_to(&self, situation: &Situation, context: &ContingencyContext) -> Applicability {
        let Some(text_gen) = context.text_generation() else {
            return Applicability::NotApplicable;
        };
        if situation.attempt_count("prediction") > 0 {
            return Applicability::NotApplicable;
        }
        if context.resolve_current_resource(situation).is_none() {
            return Applicability::NotApplicable;
        }
        if !text_gen.is_available() {
            return Applicability::NotApplicable;
        }
        Applicability::Applicable
    }

    fn evaluate(
        &self,
        situation: &Situation,
        context: &ContingencyContext,
    ) -> Result<StrategyResult, ContingencyError> {
        let Some(text_gen) = context.text_generation() else {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::PreconditionMissing,
                "no text-generation client configured",
            ));
        };
        if situation.attempt_count("prediction") > 0 {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::AlreadyAttempted,
                "prediction already attempted for this situation",
            ));
        }
        let Some(current) = context.resolve_current_resource(situation) else {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::InsufficientContext,
                "no current resource resolvable",
            ));
        };

        let sections = self.context_sections(situation, context, &current);
        let prompt = self.prompt_builder.build(&sections);
        tracing::debug!(prompt_chars = prompt.len(), "requesting next-action prediction");

        // Client-level failures propagate; the orchestrator converts them.
        let raw = text_gen.complete(&prompt)?;

        let parsed = match context.parser().parse(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "prediction output did not parse");
                return Ok(StrategyResult::no_help(
                    self.id(),
                    NoHelpReason::EvaluationFailed,
                    format!("model output did not parse: {err}"),
                ));
            }
        };

        let confidence = parsed.confidence.unwrap_or(self.config.base_confidence);
        let mut params: Vec<(String, String)> = parsed
            .metadata
            .into_iter()
            .collect();
        params.sort();
        params.push(("prompt_chars".into(), prompt.len().to_string()));

        Ok(StrategyResult::Suggestion {
            strategy_id: self.id().to_string(),
            action_type: parsed.action,
            action_target: parsed.target,
            confidence,
            estimated_cost: 0.4,
            rationale: parsed
                .explanation
                .unwrap_or_else(|| "model-suggested next action".into()),
            params,
            opportunistic_guidance: vec![],
        })
    }
}

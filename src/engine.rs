//! Engine facade: top-level API for the wayfarer system.
//!
//! The `Engine` owns both reasoning halves, the opportunistic matcher and
//! the contingency orchestrator, plus the shared fact store and interaction
//! log they read. Construction is explicit; there are no globals and no
//! background work. One engine serves one agent.

use std::collections::HashMap;
use std::sync::Arc;

use crate::contingency::context::ContingencyContext;
use crate::contingency::orchestrator::Orchestrator;
use crate::contingency::registry::{ContingencyConfig, StrategyRegistry};
use crate::contingency::trace::{RecoveryTrace, TraceOutcome};
use crate::contingency::Situation;
use crate::error::{EngineError, WayfarerResult};
use crate::history::{Interaction, InteractionLog};
use crate::llm::TextGeneration;
use crate::matcher::scoring::SaturatingScoring;
use crate::matcher::{OpportunisticMatcher, OpportunisticResult};
use crate::store::{FactStore, MemoryFactStore};
use crate::triple::Triple;
use crate::vocabulary::Vocabulary;

/// Configuration for the wayfarer engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Identity this engine logs and recovers under.
    pub agent_id: String,
    /// Ring-buffer capacity of the per-agent interaction log.
    pub history_capacity: usize,
    /// Contingency orchestration settings.
    pub contingency: ContingencyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            agent_id: "wayfarer".into(),
            history_capacity: 256,
            contingency: ContingencyConfig::default(),
        }
    }
}

/// The wayfarer agent brain.
///
/// Owns all subsystems: vocabulary-driven matcher, strategy orchestrator,
/// fact store, and interaction log.
pub struct Engine {
    config: EngineConfig,
    matcher: OpportunisticMatcher,
    orchestrator: Orchestrator,
    facts: Arc<MemoryFactStore>,
    history: Arc<InteractionLog>,
    text_gen: Option<Arc<dyn TextGeneration>>,
}

impl Engine {
    /// Create an engine over a compiled vocabulary with the built-in
    /// strategy ladder.
    pub fn new(vocabulary: Vocabulary, config: EngineConfig) -> WayfarerResult<Self> {
        Self::with_registry(vocabulary, StrategyRegistry::with_defaults(), config)
    }

    /// Create an engine with a caller-assembled strategy registry.
    pub fn with_registry(
        vocabulary: Vocabulary,
        registry: StrategyRegistry,
        config: EngineConfig,
    ) -> WayfarerResult<Self> {
        if config.agent_id.is_empty() {
            return Err(EngineError::InvalidConfig {
                message: "agent_id must not be empty".into(),
            }
            .into());
        }
        let history = InteractionLog::new(config.history_capacity).map_err(|_| {
            EngineError::InvalidConfig {
                message: "history_capacity must be > 0".into(),
            }
        })?;

        tracing::info!(
            agent = %config.agent_id,
            patterns = vocabulary.len(),
            strategies = registry.len(),
            "initializing wayfarer engine"
        );

        let matcher = OpportunisticMatcher::new(
            Arc::new(vocabulary),
            Arc::new(SaturatingScoring::default()),
        );
        let orchestrator = Orchestrator::new(registry, config.contingency.clone());

        Ok(Self {
            config,
            matcher,
            orchestrator,
            facts: Arc::new(MemoryFactStore::new()),
            history: Arc::new(history),
            text_gen: None,
        })
    }

    /// Attach a text-generation client; enables the prediction and
    /// consultation strategies.
    pub fn with_text_generation(mut self, text_gen: Arc<dyn TextGeneration>) -> Self {
        self.text_gen = Some(text_gen);
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.config.agent_id
    }

    pub fn facts(&self) -> &MemoryFactStore {
        &self.facts
    }

    pub fn history(&self) -> &InteractionLog {
        &self.history
    }

    /// Ingest a perception batch: facts land in the store, then the whole
    /// batch is scanned against the vocabulary in one cycle.
    pub fn perceive(
        &self,
        triples: &[Triple],
        context: &HashMap<String, String>,
    ) -> Vec<OpportunisticResult> {
        self.facts.insert_all(triples.iter().cloned());
        self.matcher.scan_all(triples, context)
    }

    /// Log an interaction under this engine's agent id. Any perceived state
    /// carried by the interaction also lands in the fact store, keeping
    /// graph evidence and history evidence in step.
    pub fn record_interaction(&self, interaction: Interaction) {
        self.facts
            .insert_all(interaction.perceived_state.iter().cloned());
        self.history.record(&self.config.agent_id, interaction);
    }

    /// One contingency pass over the given situation.
    pub fn recover(&self, situation: &Situation) -> RecoveryTrace {
        let mut context = ContingencyContext::new(
            Arc::clone(&self.facts) as Arc<dyn FactStore>,
            Arc::clone(&self.history),
            self.config.agent_id.clone(),
        );
        if let Some(text_gen) = &self.text_gen {
            context = context.with_text_generation(Arc::clone(text_gen));
        }
        self.orchestrator.evaluate_with_trace(situation, &context)
    }

    /// Report how the chosen suggestion performed (first report wins).
    pub fn report_outcome(&self, trace: &mut RecoveryTrace, outcome: TraceOutcome) {
        trace.report_outcome(outcome);
    }

    /// A point-in-time snapshot of engine state.
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            agent_id: self.config.agent_id.clone(),
            patterns: self.matcher.vocabulary().len(),
            facts: self.facts.len(),
            interactions: self.history.len(&self.config.agent_id),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("agent_id", &self.config.agent_id)
            .field("patterns", &self.matcher.vocabulary().len())
            .field("text_gen", &self.text_gen.is_some())
            .finish()
    }
}

/// Snapshot of engine state for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub agent_id: String,
    pub patterns: usize,
    pub facts: usize,
    pub interactions: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "wayfarer[{}]: {} pattern(s), {} fact(s), {} interaction(s)",
            self.agent_id, self.patterns, self.facts, self.interactions
        )
    }
}

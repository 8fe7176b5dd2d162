//! Strategy registry and orchestration configuration.
//!
//! The registry is insertion-ordered; insertion order is the deterministic
//! tie-break within an escalation level. Level 0 maps to a sentinel so the
//! last resort always sorts behind levels 1–4; that is the only special-cased
//! ordering rule in the system.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::ContingencyError;

use super::strategy::{
    BacktrackStrategy, ConsultationStrategy, PredictionStrategy, RetryStrategy, StopStrategy,
    Strategy, StrategyCategory,
};

/// Sort key for the last-resort level.
pub(crate) const LAST_RESORT_SENTINEL: u8 = 100;

pub(crate) fn effective_level(level: u8) -> u8 {
    if level == 0 { LAST_RESORT_SENTINEL } else { level }
}

/// How the orchestrator walks escalation levels.
///
/// Only [`Sequential`](EscalationPolicy::Sequential) has distinct behavior
/// today (stop at the first level that yields a suggestion); the other two
/// are declared extension points and currently evaluate everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscalationPolicy {
    #[default]
    Sequential,
    BestPerLevel,
    Parallel,
}

/// Immutable orchestration configuration, built once via
/// [`ContingencyConfig::builder`].
#[derive(Debug, Clone)]
pub struct ContingencyConfig {
    /// Explicit whitelist; empty means "all registered".
    enabled: HashSet<String>,
    /// Blacklist; wins over the whitelist.
    disabled: HashSet<String>,
    /// Category whitelist; `None` means all categories.
    categories: Option<HashSet<StrategyCategory>>,
    policy: EscalationPolicy,
    max_escalation_level: u8,
    max_suggestions: usize,
    trace_enabled: bool,
}

impl Default for ContingencyConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ContingencyConfig {
    pub fn builder() -> ContingencyConfigBuilder {
        ContingencyConfigBuilder {
            config: ContingencyConfig {
                enabled: HashSet::new(),
                disabled: HashSet::new(),
                categories: None,
                policy: EscalationPolicy::Sequential,
                max_escalation_level: 4,
                max_suggestions: 3,
                trace_enabled: true,
            },
        }
    }

    pub fn policy(&self) -> EscalationPolicy {
        self.policy
    }

    pub fn max_suggestions(&self) -> usize {
        self.max_suggestions
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    /// Whether a strategy passes the enable/disable/category/level filters.
    fn admits(&self, strategy: &dyn Strategy) -> bool {
        if self.disabled.contains(strategy.id()) {
            return false;
        }
        if !self.enabled.is_empty() && !self.enabled.contains(strategy.id()) {
            return false;
        }
        if let Some(categories) = &self.categories
            && !categories.contains(&strategy.category())
        {
            return false;
        }
        // Level 0 is the fallback, not an escalation tier: exempt from the cap.
        let level = strategy.escalation_level();
        level == 0 || level <= self.max_escalation_level
    }
}

/// Builder for [`ContingencyConfig`].
#[derive(Debug)]
pub struct ContingencyConfigBuilder {
    config: ContingencyConfig,
}

impl ContingencyConfigBuilder {
    pub fn enable(mut self, id: impl Into<String>) -> Self {
        self.config.enabled.insert(id.into());
        self
    }

    pub fn disable(mut self, id: impl Into<String>) -> Self {
        self.config.disabled.insert(id.into());
        self
    }

    pub fn category(mut self, category: StrategyCategory) -> Self {
        self.config
            .categories
            .get_or_insert_with(HashSet::new)
            .insert(category);
        self
    }

    pub fn policy(mut self, policy: EscalationPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn max_escalation_level(mut self, level: u8) -> Self {
        self.config.max_escalation_level = level;
        self
    }

    pub fn max_suggestions(mut self, n: usize) -> Self {
        self.config.max_suggestions = n;
        self
    }

    pub fn trace_enabled(mut self, enabled: bool) -> Self {
        self.config.trace_enabled = enabled;
        self
    }

    pub fn build(self) -> ContingencyConfig {
        self.config
    }
}

/// Insertion-ordered collection of recovery strategies.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
    ids: HashSet<String>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in escalation ladder: retry, backtrack, prediction,
    /// consultation, stop.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for strategy in [
            Arc::new(RetryStrategy::default()) as Arc<dyn Strategy>,
            Arc::new(BacktrackStrategy::default()),
            Arc::new(PredictionStrategy::default()),
            Arc::new(ConsultationStrategy::default()),
            Arc::new(StopStrategy::default()),
        ] {
            // Built-in ids are distinct; registration cannot fail here.
            let id = strategy.id().to_string();
            registry.strategies.push(strategy);
            registry.ids.insert(id);
        }
        registry
    }

    /// Register a strategy. Duplicate ids fail fast rather than silently
    /// overwriting.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) -> Result<(), ContingencyError> {
        let id = strategy.id().to_string();
        if !self.ids.insert(id.clone()) {
            return Err(ContingencyError::DuplicateStrategy { strategy_id: id });
        }
        tracing::debug!(
            strategy = %strategy.id(),
            level = strategy.escalation_level(),
            "strategy registered"
        );
        self.strategies.push(strategy);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// The strategies admitted by `config`, sorted for evaluation:
    /// escalation level ascending with level 0 last, insertion order within
    /// a level.
    pub fn ordered_for_evaluation(&self, config: &ContingencyConfig) -> Vec<Arc<dyn Strategy>> {
        let mut admitted: Vec<Arc<dyn Strategy>> = self
            .strategies
            .iter()
            .filter(|s| config.admits(s.as_ref()))
            .cloned()
            .collect();
        admitted.sort_by_key(|s| effective_level(s.escalation_level()));
        admitted
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.strategies.iter().map(|s| s.id()).collect();
        f.debug_struct("StrategyRegistry")
            .field("strategies", &ids)
            .finish()
    }
}

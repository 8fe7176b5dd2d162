//! Read-only facade over the collaborators strategies consult.
//!
//! Strategies never touch the fact store, history log, or text-generation
//! client directly; everything flows through this context, constructed
//! explicitly and passed down the call chain (no global lookup).

use std::sync::Arc;

use crate::history::{Interaction, InteractionLog};
use crate::llm::{LineTaggedParser, ResponseParser, TextGeneration};
use crate::store::FactStore;
use crate::triple::Triple;

use super::Situation;

/// Everything a strategy may read while deciding how to recover.
pub struct ContingencyContext {
    facts: Arc<dyn FactStore>,
    history: Arc<InteractionLog>,
    agent_id: String,
    text_gen: Option<Arc<dyn TextGeneration>>,
    parser: Arc<dyn ResponseParser>,
}

impl ContingencyContext {
    pub fn new(
        facts: Arc<dyn FactStore>,
        history: Arc<InteractionLog>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            facts,
            history,
            agent_id: agent_id.into(),
            text_gen: None,
            parser: Arc::new(LineTaggedParser::new()),
        }
    }

    /// Attach a text-generation client (enables Prediction/Consultation).
    pub fn with_text_generation(mut self, text_gen: Arc<dyn TextGeneration>) -> Self {
        self.text_gen = Some(text_gen);
        self
    }

    /// Override the response parser.
    pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn facts(&self) -> &dyn FactStore {
        self.facts.as_ref()
    }

    pub fn history(&self) -> &InteractionLog {
        &self.history
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn text_generation(&self) -> Option<&dyn TextGeneration> {
        self.text_gen.as_deref()
    }

    pub fn parser(&self) -> &dyn ResponseParser {
        self.parser.as_ref()
    }

    /// Where the agent currently is: the situation's own field, falling back
    /// to the most recent interaction's request URI.
    pub fn resolve_current_resource(&self, situation: &Situation) -> Option<String> {
        situation
            .current_resource
            .clone()
            .or_else(|| self.history.last(&self.agent_id).map(|i| i.request_uri))
    }

    /// A bounded graph neighborhood of `resource`: outgoing triples first,
    /// then incoming, truncated to `limit`. Explicitly not the full graph.
    pub fn neighborhood(&self, resource: &str, limit: usize) -> Vec<Triple> {
        let mut triples = self.facts.query(Some(resource), None, None);
        triples.extend(self.facts.query(None, None, Some(resource)));
        triples.dedup();
        triples.truncate(limit);
        triples
    }

    /// The most recent `n` interactions for this agent, newest first.
    pub fn recent_interactions(&self, n: usize) -> Vec<Interaction> {
        self.history.recent(&self.agent_id, n)
    }

    /// The most recent `n` interactions formatted as `"METHOD uri -> OUTCOME"`.
    pub fn format_recent_interactions(&self, n: usize) -> Vec<String> {
        self.recent_interactions(n)
            .iter()
            .map(|i| format!("{} {} -> {}", i.method, i.request_uri, i.outcome))
            .collect()
    }
}

impl std::fmt::Debug for ContingencyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContingencyContext")
            .field("agent_id", &self.agent_id)
            .field("text_gen", &self.text_gen.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contingency::SituationKind;
    use crate::history::InteractionOutcome;
    use crate::store::MemoryFactStore;

    fn ctx() -> ContingencyContext {
        let facts = Arc::new(MemoryFactStore::new());
        facts.insert(Triple::new("a", "linksTo", "b"));
        facts.insert(Triple::new("c", "linksTo", "a"));
        facts.insert(Triple::new("a", "type", "Page"));
        let history = Arc::new(InteractionLog::new(16).unwrap());
        ContingencyContext::new(facts, history, "agent")
    }

    #[test]
    fn current_resource_prefers_situation_field() {
        let context = ctx();
        context.history().record(
            "agent",
            Interaction::new("GET", "http://last", InteractionOutcome::Success),
        );
        let with_field = Situation::builder(SituationKind::Stuck, "t")
            .current_resource("http://explicit")
            .build();
        let without_field = Situation::builder(SituationKind::Stuck, "t").build();

        assert_eq!(
            context.resolve_current_resource(&with_field).as_deref(),
            Some("http://explicit")
        );
        assert_eq!(
            context.resolve_current_resource(&without_field).as_deref(),
            Some("http://last")
        );
    }

    #[test]
    fn no_resource_resolvable_without_history() {
        let context = ctx();
        let situation = Situation::builder(SituationKind::Stuck, "t").build();
        assert!(context.resolve_current_resource(&situation).is_none());
    }

    #[test]
    fn neighborhood_is_bounded() {
        let context = ctx();
        let hood = context.neighborhood("a", 2);
        assert_eq!(hood.len(), 2);
        let full = context.neighborhood("a", 10);
        assert_eq!(full.len(), 3);
    }

    #[test]
    fn interaction_formatting() {
        let context = ctx();
        context.history().record(
            "agent",
            Interaction::new("GET", "http://x", InteractionOutcome::ServerFailure),
        );
        let lines = context.format_recent_interactions(5);
        assert_eq!(lines, vec!["GET http://x -> SERVER_FAILURE"]);
    }
}

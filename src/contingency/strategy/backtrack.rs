//! Backtrack: return to a prior decision point that still has unexplored
//! alternatives.
//!
//! Checkpoint candidates come from two independent evidence sources: graph
//! topology (who links to where the agent is stuck) and traversal history
//! (who was successfully visited and led here). Candidates found in both
//! merge with combined evidence. Each candidate's outgoing links are
//! classified unexplored vs. exhausted, candidates are validated and ranked,
//! and the concrete backtrack path is recovered as a suffix of the
//! navigation history rather than a fresh graph search.

use crate::contingency::context::ContingencyContext;
use crate::contingency::{
    Applicability, NoHelpReason, Situation, SituationKind, StrategyResult,
};
use crate::error::ContingencyError;
use crate::history::Interaction;
use crate::matcher::OpportunisticResult;

use super::{Strategy, StrategyCategory};

/// Tuning knobs for [`BacktrackStrategy`].
#[derive(Debug, Clone)]
pub struct BacktrackConfig {
    /// Backtrack attempts allowed per situation (across all checkpoints).
    pub max_depth: usize,
    /// Maximum temporal distance (interactions since last visit) a
    /// checkpoint may have.
    pub max_distance: usize,
}

impl Default for BacktrackConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_distance: 20,
        }
    }
}

/// A validated checkpoint candidate.
#[derive(Debug, Clone)]
struct Checkpoint {
    uri: String,
    from_graph: bool,
    from_history: bool,
    unexplored: Vec<String>,
    exhausted: Vec<String>,
    validation_score: f64,
    /// Interactions since the checkpoint was last visited; history length if
    /// it was never visited at all (graph-only evidence).
    temporal_distance: usize,
    /// Timestamp of the last visit, 0 if never visited.
    last_visit_ms: u64,
}

/// Level-2 internal strategy: structured backtracking over traversal history.
#[derive(Debug, Clone, Default)]
pub struct BacktrackStrategy {
    config: BacktrackConfig,
}

impl BacktrackStrategy {
    pub fn new(config: BacktrackConfig) -> Self {
        Self { config }
    }

    /// Step 1: collect checkpoint candidates from graph topology and history.
    fn collect_candidates(
        &self,
        current: &str,
        context: &ContingencyContext,
        history: &[Interaction],
    ) -> Vec<(String, bool, bool)> {
        let mut candidates: Vec<(String, bool, bool)> = Vec::new();

        let mut add = |uri: &str, from_graph: bool, from_history: bool| {
            if uri == current {
                return;
            }
            match candidates.iter_mut().find(|(u, _, _)| u == uri) {
                Some((_, g, h)) => {
                    *g |= from_graph;
                    *h |= from_history;
                }
                None => candidates.push((uri.to_string(), from_graph, from_history)),
            }
        };

        for subject in context.facts().incoming_links(current) {
            add(&subject, true, false);
        }

        for interaction in history {
            if !interaction.succeeded() || interaction.request_uri == current {
                continue;
            }
            let links_here = interaction
                .perceived_state
                .iter()
                .any(|t| t.object == current && !t.is_self_loop());
            if links_here {
                add(&interaction.request_uri, false, true);
            }
        }

        candidates
    }

    /// Steps 2–4: classify alternatives, validate, and measure distance.
    fn validate_checkpoint(
        &self,
        uri: String,
        from_graph: bool,
        from_history: bool,
        current: &str,
        context: &ContingencyContext,
        history: &[Interaction],
    ) -> Option<Checkpoint> {
        let outgoing = context.facts().outgoing_links(&uri);

        // A checkpoint without outgoing links is no decision point at all.
        if outgoing.is_empty() {
            return None;
        }

        let predecessors = context.facts().incoming_links(&uri);

        let mut unexplored = Vec::new();
        let mut exhausted = Vec::new();
        for link in outgoing.iter() {
            if self.is_exhausted(link, &uri, &predecessors, current, history) {
                exhausted.push(link.clone());
            } else {
                unexplored.push(link.clone());
            }
        }

        // Every alternative exhausted: validation score forced to 0, reject.
        if unexplored.is_empty() {
            return None;
        }

        let visited = history.iter().position(|i| i.request_uri == uri);
        let mut score = 0.4; // unexplored alternatives exist
        if visited.is_some() {
            score += 0.3;
        }
        if outgoing.len() > 1 {
            score += 0.3;
        }

        let temporal_distance = visited.unwrap_or(history.len());
        if temporal_distance > self.config.max_distance {
            return None;
        }
        let last_visit_ms = visited
            .map(|i| history[i].response_timestamp_ms)
            .unwrap_or(0);

        Some(Checkpoint {
            uri,
            from_graph,
            from_history,
            unexplored,
            exhausted,
            validation_score: score,
            temporal_distance,
            last_visit_ms,
        })
    }

    /// A link is exhausted when visiting it failed, or when it succeeded but
    /// the agent later came back to the checkpoint or one of its
    /// predecessors, a structural proxy for "led to a dead end".
    fn is_exhausted(
        &self,
        link: &str,
        checkpoint: &str,
        predecessors: &[String],
        current: &str,
        history: &[Interaction],
    ) -> bool {
        // The resource the agent is stuck at is by definition not viable.
        if link == current {
            return true;
        }
        // History is newest-first; position() finds the most recent visit.
        let Some(visit_idx) = history.iter().position(|i| i.request_uri == link) else {
            return false; // never visited: unexplored
        };
        if !history[visit_idx].succeeded() {
            return true;
        }
        // Returned to the checkpoint (or a predecessor) after the visit?
        history[..visit_idx].iter().any(|later| {
            later.request_uri == checkpoint
                || predecessors.iter().any(|p| p == &later.request_uri)
        })
    }

    /// Step 6: the backtrack path is a suffix of navigation history walked
    /// back from "now" to the checkpoint.
    fn path_to(&self, current: &str, checkpoint: &str, history: &[Interaction]) -> Vec<String> {
        let mut path = vec![current.to_string()];
        for interaction in history {
            let uri = &interaction.request_uri;
            if path.last().map(String::as_str) != Some(uri.as_str()) {
                path.push(uri.clone());
            }
            if uri == checkpoint {
                return path;
            }
        }
        // Checkpoint known only from graph topology: direct hop.
        path.truncate(1);
        path.push(checkpoint.to_string());
        path
    }
}

impl Strategy for BacktrackStrategy {
    fn id(&self) -> &str {
        "backtrack"
    }

    fn name(&self) -> &str {
        "Backtrack to checkpoint"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Internal
    }

    fn escalation_level(&self) -> u8 {
        2
    }

    fn applies_to(&self, situation: &Situation, context: &ContingencyContext) -> Applicability {
        if !matches!(situation.kind, SituationKind::Stuck | SituationKind::Failure) {
            return Applicability::NotApplicable;
        }
        if situation.attempt_count("backtrack") >= self.config.max_depth {
            return Applicability::NotApplicable;
        }
        let Some(current) = context.resolve_current_resource(situation) else {
            return Applicability::NotApplicable;
        };
        // Cheap evidence probe: with no incoming links and no history there
        // can be no checkpoint candidates.
        let has_graph_evidence = !context.facts().incoming_links(&current).is_empty();
        if !has_graph_evidence && context.history().is_empty(context.agent_id()) {
            return Applicability::NotApplicable;
        }
        Applicability::Applicable
    }

    fn evaluate(
        &self,
        situation: &Situation,
        context: &ContingencyContext,
    ) -> Result<StrategyResult, ContingencyError> {
        let Some(current) = context.resolve_current_resource(situation) else {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::InsufficientContext,
                "no current resource resolvable",
            ));
        };
        if situation.attempt_count("backtrack") >= self.config.max_depth {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::AlreadyAttempted,
                format!("backtrack depth budget of {} exhausted", self.config.max_depth),
            ));
        }

        let history = context.recent_interactions(context.history().capacity());

        let mut checkpoints: Vec<Checkpoint> = self
            .collect_candidates(&current, context, &history)
            .into_iter()
            .filter_map(|(uri, g, h)| {
                self.validate_checkpoint(uri, g, h, &current, context, &history)
            })
            .collect();

        if checkpoints.is_empty() {
            return Ok(StrategyResult::no_help(
                self.id(),
                NoHelpReason::InsufficientContext,
                "no checkpoint with unexplored alternatives found",
            ));
        }

        // Step 5: unexplored count desc, temporal distance asc, recency desc,
        // validation score desc.
        checkpoints.sort_by(|a, b| {
            b.unexplored
                .len()
                .cmp(&a.unexplored.len())
                .then(a.temporal_distance.cmp(&b.temporal_distance))
                .then(b.last_visit_ms.cmp(&a.last_visit_ms))
                .then(b.validation_score.total_cmp(&a.validation_score))
        });

        let all_candidates: Vec<String> = checkpoints.iter().map(|c| c.uri.clone()).collect();
        let best = &checkpoints[0];
        let path = self.path_to(&current, &best.uri, &history);

        let key = format!("backtrack:{}", best.uri);
        let prior_here = situation.exact_attempt_count(&key);
        let confidence = (0.4 + 0.1 * (best.unexplored.len().min(4) as f64)
            - 0.02 * (best.temporal_distance.min(10) as f64))
            .clamp(0.05, 0.95)
            * 0.95f64.powi(prior_here as i32);

        let mut guidance: Vec<OpportunisticResult> = best
            .unexplored
            .iter()
            .map(|alt| note(alt, "viable_alternative", 0.2, &best.uri))
            .collect();
        guidance.push(note(&current, "dead_end", -0.9, &best.uri));
        for alt in &best.exhausted {
            guidance.push(note(alt, "dead_end", -0.9, &best.uri));
        }

        tracing::debug!(
            checkpoint = %best.uri,
            unexplored = best.unexplored.len(),
            distance = best.temporal_distance,
            candidates = all_candidates.len(),
            "backtrack checkpoint selected"
        );

        Ok(StrategyResult::Suggestion {
            strategy_id: key,
            action_type: "backtrack".into(),
            action_target: Some(best.uri.clone()),
            confidence,
            estimated_cost: 0.3,
            rationale: format!(
                "checkpoint {} offers {} unexplored alternative(s), {} interaction(s) back \
                 (evidence: {}{})",
                best.uri,
                best.unexplored.len(),
                best.temporal_distance,
                if best.from_graph { "graph" } else { "" },
                match (best.from_graph, best.from_history) {
                    (true, true) => "+history",
                    (false, true) => "history",
                    _ => "",
                },
            ),
            params: vec![
                ("checkpoint".into(), best.uri.clone()),
                ("path".into(), path.join(" -> ")),
                ("unexplored".into(), best.unexplored.join(",")),
                ("exhausted".into(), best.exhausted.join(",")),
                ("temporal_distance".into(), best.temporal_distance.to_string()),
                ("validation_score".into(), format!("{:.2}", best.validation_score)),
                ("candidates".into(), all_candidates.join(",")),
            ],
            opportunistic_guidance: guidance,
        })
    }
}

fn note(target: &str, kind: &str, utility: f64, checkpoint: &str) -> OpportunisticResult {
    let mut metadata = std::collections::HashMap::new();
    metadata.insert("checkpoint".to_string(), checkpoint.to_string());
    metadata.insert("origin".to_string(), "contingency".to_string());
    OpportunisticResult {
        result_type: kind.to_string(),
        target: target.to_string(),
        pattern_id: "backtrack".to_string(),
        utility,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{InteractionLog, InteractionOutcome};
    use crate::store::MemoryFactStore;
    use crate::triple::Triple;
    use std::sync::Arc;

    fn stuck_at(uri: &str) -> Situation {
        Situation::builder(SituationKind::Stuck, "dead end")
            .current_resource(uri)
            .build()
    }

    fn visit(uri: &str) -> Interaction {
        Interaction::new("GET", uri, InteractionOutcome::Success)
    }

    /// Graph: hub -> {x, alt1, alt2}; agent walked hub -> x and is stuck at x.
    fn hub_world() -> (Arc<MemoryFactStore>, Arc<InteractionLog>) {
        let facts = Arc::new(MemoryFactStore::new());
        facts.insert(Triple::new("hub", "linksTo", "x"));
        facts.insert(Triple::new("hub", "linksTo", "alt1"));
        facts.insert(Triple::new("hub", "linksTo", "alt2"));
        let log = Arc::new(InteractionLog::new(32).unwrap());
        log.record(
            "agent",
            visit("hub").with_perceived_state(vec![Triple::new("hub", "linksTo", "x")]),
        );
        log.record("agent", visit("x"));
        (facts, log)
    }

    #[test]
    fn not_applicable_without_any_evidence() {
        let facts = Arc::new(MemoryFactStore::new());
        let log = Arc::new(InteractionLog::new(8).unwrap());
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();
        assert_eq!(bt.applies_to(&stuck_at("x"), &ctx), Applicability::NotApplicable);
    }

    #[test]
    fn selects_hub_with_unexplored_alternatives() {
        let (facts, log) = hub_world();
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();
        let situation = stuck_at("x");

        assert_eq!(bt.applies_to(&situation, &ctx), Applicability::Applicable);
        let result = bt.evaluate(&situation, &ctx).unwrap();
        let StrategyResult::Suggestion {
            strategy_id,
            action_target,
            params,
            opportunistic_guidance,
            estimated_cost,
            ..
        } = result
        else {
            panic!("expected a suggestion");
        };
        assert_eq!(strategy_id, "backtrack:hub");
        assert_eq!(action_target.as_deref(), Some("hub"));
        assert!((estimated_cost - 0.3).abs() < 1e-12);

        let unexplored = params
            .iter()
            .find(|(k, _)| k == "unexplored")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(unexplored.contains("alt1") && unexplored.contains("alt2"));
        // x is where we are stuck, so it must be classified exhausted.
        let exhausted = params
            .iter()
            .find(|(k, _)| k == "exhausted")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(exhausted, "x");

        // Guidance: positive notes for alternatives, strong negatives for dead ends.
        assert!(
            opportunistic_guidance
                .iter()
                .any(|g| g.target == "alt1" && g.utility == 0.2)
        );
        assert!(
            opportunistic_guidance
                .iter()
                .any(|g| g.target == "x" && g.utility == -0.9)
        );
    }

    #[test]
    fn fully_exhausted_checkpoint_is_rejected() {
        let facts = Arc::new(MemoryFactStore::new());
        facts.insert(Triple::new("hub", "linksTo", "x"));
        let log = Arc::new(InteractionLog::new(32).unwrap());
        log.record("agent", visit("hub"));
        log.record("agent", visit("x"));
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();

        // hub's only link is x, where the agent is stuck: every alternative
        // exhausted, so hub must never appear in the ranked list.
        let result = bt.evaluate(&stuck_at("x"), &ctx).unwrap();
        assert!(matches!(
            result,
            StrategyResult::NoHelp {
                reason: NoHelpReason::InsufficientContext,
                ..
            }
        ));
    }

    #[test]
    fn failed_visits_count_as_exhausted() {
        let facts = Arc::new(MemoryFactStore::new());
        facts.insert(Triple::new("hub", "linksTo", "x"));
        facts.insert(Triple::new("hub", "linksTo", "broken"));
        facts.insert(Triple::new("hub", "linksTo", "fresh"));
        let log = Arc::new(InteractionLog::new(32).unwrap());
        log.record("agent", visit("hub"));
        log.record(
            "agent",
            Interaction::new("GET", "broken", InteractionOutcome::ServerFailure),
        );
        log.record("agent", visit("x"));
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();

        let result = bt.evaluate(&stuck_at("x"), &ctx).unwrap();
        let StrategyResult::Suggestion { params, .. } = result else {
            panic!("expected a suggestion");
        };
        let unexplored = params
            .iter()
            .find(|(k, _)| k == "unexplored")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(unexplored, "fresh");
    }

    #[test]
    fn successful_visit_with_later_return_is_exhausted() {
        let facts = Arc::new(MemoryFactStore::new());
        facts.insert(Triple::new("hub", "linksTo", "tried"));
        facts.insert(Triple::new("hub", "linksTo", "fresh"));
        facts.insert(Triple::new("hub", "linksTo", "x"));
        let log = Arc::new(InteractionLog::new(32).unwrap());
        // hub -> tried -> hub (returned: dead end) -> x (stuck).
        log.record("agent", visit("hub"));
        log.record("agent", visit("tried"));
        log.record("agent", visit("hub"));
        log.record("agent", visit("x"));
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();

        let result = bt.evaluate(&stuck_at("x"), &ctx).unwrap();
        let StrategyResult::Suggestion { params, .. } = result else {
            panic!("expected a suggestion");
        };
        let exhausted = params
            .iter()
            .find(|(k, _)| k == "exhausted")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(exhausted.contains("tried"));
        assert!(exhausted.contains("x"));
        let unexplored = params
            .iter()
            .find(|(k, _)| k == "unexplored")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(unexplored, "fresh");
    }

    #[test]
    fn path_walks_history_suffix() {
        let (facts, log) = hub_world();
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();
        let result = bt.evaluate(&stuck_at("x"), &ctx).unwrap();
        let StrategyResult::Suggestion { params, .. } = result else {
            panic!("expected a suggestion");
        };
        let path = params
            .iter()
            .find(|(k, _)| k == "path")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert_eq!(path, "x -> hub");
    }

    #[test]
    fn checkpoint_specific_attempts_decay_confidence() {
        let (facts, log) = hub_world();
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();

        let fresh = bt.evaluate(&stuck_at("x"), &ctx).unwrap();
        let mut attempted = stuck_at("x");
        attempted.attempted_strategies = vec!["backtrack:hub".into()];
        let decayed = bt.evaluate(&attempted, &ctx).unwrap();

        let (c0, c1) = (fresh.confidence().unwrap(), decayed.confidence().unwrap());
        assert!((c1 - c0 * 0.95).abs() < 1e-12);
    }

    #[test]
    fn depth_budget_exhaustion() {
        let (facts, log) = hub_world();
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();
        let mut situation = stuck_at("x");
        situation.attempted_strategies = (0..5).map(|i| format!("backtrack:cp{i}")).collect();
        assert_eq!(bt.applies_to(&situation, &ctx), Applicability::NotApplicable);
    }

    #[test]
    fn self_loops_never_produce_candidates() {
        let facts = Arc::new(MemoryFactStore::new());
        facts.insert(Triple::new("x", "linksTo", "x"));
        let log = Arc::new(InteractionLog::new(8).unwrap());
        let ctx = ContingencyContext::new(facts, log, "agent");
        let bt = BacktrackStrategy::default();
        assert_eq!(bt.applies_to(&stuck_at("x"), &ctx), Applicability::NotApplicable);
    }
}

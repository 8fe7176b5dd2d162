//! Opportunistic matcher: the single entry point turning a perception batch
//! into scored results.
//!
//! Structural patterns are evaluated before simple patterns: a cross-triple
//! signal carries more authored meaning than a single-triple tag. Failures in
//! one pattern never abort the batch; a slow-path query error is logged and
//! that pattern's contribution is simply absent for this cycle.

pub mod bgp;
pub mod scoring;
pub mod slow;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::triple::Triple;
use crate::vocabulary::{MatchPath, SimplePattern, TriplePosition, Vocabulary};

use self::bgp::Bindings;
use self::scoring::{RelevanceContext, ScoringStrategy};

/// A scored, typed derived fact produced by matching perceived triples
/// against the vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunisticResult {
    /// Semantic type tag from the producing pattern.
    pub result_type: String,
    /// The resource the result is about.
    pub target: String,
    /// Id of the producing pattern.
    pub pattern_id: String,
    /// Bounded utility in [-1.0, 1.0].
    pub utility: f64,
    /// Scan context plus every other binding variable, for downstream debugging.
    pub metadata: HashMap<String, String>,
}

/// Orchestrates vocabulary lookup, fast/slow dispatch, and scoring.
pub struct OpportunisticMatcher {
    vocabulary: Arc<Vocabulary>,
    scoring: Arc<dyn ScoringStrategy>,
}

impl OpportunisticMatcher {
    pub fn new(vocabulary: Arc<Vocabulary>, scoring: Arc<dyn ScoringStrategy>) -> Self {
        Self {
            vocabulary,
            scoring,
        }
    }

    /// The compiled vocabulary this matcher evaluates.
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Scan a whole perception batch. Structural patterns first, then at most
    /// one simple-pattern result per triple. Never fails: per-pattern errors
    /// are logged and skipped.
    pub fn scan_all(
        &self,
        triples: &[Triple],
        context: &HashMap<String, String>,
    ) -> Vec<OpportunisticResult> {
        if triples.is_empty() {
            return vec![];
        }

        let mut results = Vec::new();

        for pattern in self.vocabulary.structural_patterns() {
            let bindings = match &pattern.path {
                MatchPath::Fast(compiled) => bgp::match_bgp(compiled, triples),
                MatchPath::Slow(sparql) => match slow::query_batch(&pattern.id, sparql, triples) {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::warn!(
                            pattern = %pattern.id,
                            error = %e,
                            "slow-path pattern failed, skipping for this cycle"
                        );
                        continue;
                    }
                },
            };

            for binding in bindings {
                // A match without an identifiable target produces no result;
                // missing bindings are an incomplete neighborhood, not a bug.
                let Some(target) = binding.get(&pattern.target_variable) else {
                    continue;
                };

                let relevance = match &pattern.relevance_variable {
                    None => RelevanceContext::StructuralNoVariable,
                    Some(var) => match binding.get(var) {
                        Some(raw) => RelevanceContext::StructuralPresent(raw.clone()),
                        None => RelevanceContext::StructuralAbsent,
                    },
                };
                let utility = self.scoring.calculate_utility(pattern.priority, &relevance);

                results.push(OpportunisticResult {
                    result_type: pattern.pattern_type.clone(),
                    target: target.clone(),
                    pattern_id: pattern.id.clone(),
                    utility,
                    metadata: binding_metadata(context, &binding, &pattern.target_variable),
                });
            }
        }

        for triple in triples {
            if let Some(result) = self.scan(triple, context) {
                results.push(result);
            }
        }

        tracing::debug!(
            triples = triples.len(),
            results = results.len(),
            "opportunistic scan complete"
        );
        results
    }

    /// O(1) simple-pattern check for a single triple, outside batch cycles.
    /// The first position discovered wins; simple patterns are a fallback
    /// signal and do not compete on the same triple.
    pub fn scan(
        &self,
        triple: &Triple,
        context: &HashMap<String, String>,
    ) -> Option<OpportunisticResult> {
        let probes = [
            (TriplePosition::Subject, triple.subject.as_str()),
            (TriplePosition::Predicate, triple.predicate.as_str()),
            (TriplePosition::Object, triple.object.as_str()),
        ];
        for (position, value) in probes {
            if let Some(pattern) = self.vocabulary.simple_for(value, position) {
                return Some(self.simple_result(pattern, position, triple, context));
            }
        }
        None
    }

    fn simple_result(
        &self,
        pattern: &SimplePattern,
        position: TriplePosition,
        triple: &Triple,
        context: &HashMap<String, String>,
    ) -> OpportunisticResult {
        // The target is the end of the triple the pattern is "about": a
        // subject or predicate match points at the object it carries, an
        // object match points back at the subject holding it.
        let target = match position {
            TriplePosition::Subject | TriplePosition::Predicate => triple.object.clone(),
            TriplePosition::Object => triple.subject.clone(),
        };

        let utility = self
            .scoring
            .calculate_utility(pattern.priority, &RelevanceContext::Simple);

        let mut metadata = context.clone();
        metadata.insert("subject".into(), triple.subject.clone());
        metadata.insert("predicate".into(), triple.predicate.clone());
        metadata.insert("object".into(), triple.object.clone());

        OpportunisticResult {
            result_type: pattern.pattern_type.clone(),
            target,
            pattern_id: pattern.id.clone(),
            utility,
            metadata,
        }
    }
}

/// Scan context plus every binding variable except the target.
fn binding_metadata(
    context: &HashMap<String, String>,
    binding: &Bindings,
    target_variable: &str,
) -> HashMap<String, String> {
    let mut metadata = context.clone();
    for (var, value) in binding {
        if var != target_variable {
            metadata.insert(var.clone(), value.clone());
        }
    }
    metadata
}

impl std::fmt::Debug for OpportunisticMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpportunisticMatcher")
            .field("patterns", &self.vocabulary.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::scoring::SaturatingScoring;
    use super::*;
    use crate::vocabulary::{
        CompiledBgp, StructuralPattern, Term, TriplePattern, VocabularyBuilder,
    };

    fn matcher(builder: VocabularyBuilder) -> OpportunisticMatcher {
        OpportunisticMatcher::new(
            Arc::new(builder.build().unwrap()),
            Arc::new(SaturatingScoring::default()),
        )
    }

    fn marker_pattern() -> SimplePattern {
        SimplePattern {
            id: "p1".into(),
            pattern_type: "marker".into(),
            priority: 0.5,
            position: TriplePosition::Predicate,
            value: "hasMarker".into(),
        }
    }

    fn hub_pattern(relevance: Option<&str>) -> StructuralPattern {
        StructuralPattern {
            id: "hub".into(),
            pattern_type: "hub".into(),
            priority: 0.8,
            target_variable: "x".into(),
            relevance_variable: relevance.map(String::from),
            path: MatchPath::Fast(CompiledBgp::new(vec![
                TriplePattern::new(
                    Term::Var("x".into()),
                    Term::Bound("linksTo".into()),
                    Term::Var("y".into()),
                ),
                TriplePattern::new(
                    Term::Var("x".into()),
                    Term::Bound("linksTo".into()),
                    Term::Var("z".into()),
                ),
            ])),
        }
    }

    #[test]
    fn empty_batch_scans_to_nothing() {
        let m = matcher(Vocabulary::builder().simple(marker_pattern()));
        assert!(m.scan_all(&[], &HashMap::new()).is_empty());
    }

    #[test]
    fn simple_pattern_end_to_end() {
        let m = matcher(Vocabulary::builder().simple(marker_pattern()));
        let results = m.scan_all(&[Triple::new("r1", "hasMarker", "m1")], &HashMap::new());
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.result_type, "marker");
        assert_eq!(r.target, "m1");
        assert_eq!(r.pattern_id, "p1");
        assert!((r.utility - 0.5).abs() < 1e-12);
    }

    #[test]
    fn at_most_one_simple_result_per_triple() {
        let subject_tag = SimplePattern {
            id: "s-tag".into(),
            pattern_type: "origin".into(),
            priority: 0.3,
            position: TriplePosition::Subject,
            value: "r1".into(),
        };
        let m = matcher(
            Vocabulary::builder()
                .simple(subject_tag)
                .simple(marker_pattern()),
        );
        // Subject and predicate both match; subject position is probed first.
        let results = m.scan_all(&[Triple::new("r1", "hasMarker", "m1")], &HashMap::new());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pattern_id, "s-tag");
    }

    #[test]
    fn structural_match_without_relevance_variable() {
        let m = matcher(Vocabulary::builder().structural(hub_pattern(None)));
        let triples = vec![
            Triple::new("a", "linksTo", "b"),
            Triple::new("a", "linksTo", "c"),
        ];
        let results = m.scan_all(&triples, &HashMap::new());
        // Bindings (y,z) range over {b,c}²: four orderings, all targeting "a".
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.target == "a"));
        assert!(results.iter().all(|r| (r.utility - 0.8).abs() < 1e-12));
        // Other bound variables land in metadata.
        assert!(results[0].metadata.contains_key("y"));
    }

    #[test]
    fn absent_relevance_variable_scores_zero() {
        // Relevance variable "w" never appears in the BGP, so it can never
        // bind: the match counts as evidence against engagement.
        let m = matcher(Vocabulary::builder().structural(hub_pattern(Some("w"))));
        let triples = vec![
            Triple::new("a", "linksTo", "b"),
            Triple::new("a", "linksTo", "c"),
        ];
        let results = m.scan_all(&triples, &HashMap::new());
        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.utility == 0.0));
    }

    #[test]
    fn present_relevance_variable_saturates() {
        let pattern = StructuralPattern {
            id: "weighted".into(),
            pattern_type: "weighted".into(),
            priority: 1.0,
            target_variable: "x".into(),
            relevance_variable: Some("n".into()),
            path: MatchPath::Fast(CompiledBgp::new(vec![TriplePattern::new(
                Term::Var("x".into()),
                Term::Bound("linkCount".into()),
                Term::Var("n".into()),
            )])),
        };
        let m = matcher(Vocabulary::builder().structural(pattern));
        let results = m.scan_all(&[Triple::new("a", "linkCount", "1")], &HashMap::new());
        assert_eq!(results.len(), 1);
        assert!((results[0].utility - 0.5).abs() < 1e-12); // 1/(1+1)
    }

    #[test]
    fn slow_path_failure_does_not_abort_batch() {
        let bad = StructuralPattern {
            id: "bad".into(),
            pattern_type: "bad".into(),
            priority: 0.5,
            target_variable: "x".into(),
            relevance_variable: None,
            path: MatchPath::Slow("SELECT WHERE garbage".into()),
        };
        let m = matcher(
            Vocabulary::builder()
                .structural(bad)
                .simple(marker_pattern()),
        );
        let results = m.scan_all(&[Triple::new("r1", "hasMarker", "m1")], &HashMap::new());
        // The broken slow pattern is skipped; the simple pattern still fires.
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pattern_id, "p1");
    }

    #[test]
    fn slow_path_pattern_matches() {
        let roots = StructuralPattern {
            id: "roots".into(),
            pattern_type: "root".into(),
            priority: 0.6,
            target_variable: "x".into(),
            relevance_variable: None,
            path: MatchPath::Slow(
                "SELECT ?x WHERE { ?x <urn:wayfarer:term:linksTo> ?y . \
                 FILTER NOT EXISTS { ?z <urn:wayfarer:term:linksTo> ?x } }"
                    .into(),
            ),
        };
        let m = matcher(Vocabulary::builder().structural(roots));
        let triples = vec![
            Triple::new("a", "linksTo", "b"),
            Triple::new("b", "linksTo", "c"),
        ];
        let results = m.scan_all(&triples, &HashMap::new());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].target, "a");
        assert!((results[0].utility - 0.6).abs() < 1e-12);
    }

    #[test]
    fn scan_context_flows_into_metadata() {
        let m = matcher(Vocabulary::builder().simple(marker_pattern()));
        let mut context = HashMap::new();
        context.insert("cycle".to_string(), "42".to_string());
        let result = m
            .scan(&Triple::new("r1", "hasMarker", "m1"), &context)
            .unwrap();
        assert_eq!(result.metadata.get("cycle").map(String::as_str), Some("42"));
    }
}

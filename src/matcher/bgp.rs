//! Fast-path structural pattern matcher.
//!
//! A pure backtracking search over a small batch of triples: no query-engine
//! state, only hash maps and lists. Constraints are satisfied left to right;
//! candidates come from a subject index when the constraint's subject term
//! resolves to a bound value, otherwise from a full batch scan. BGPs are
//! short (typically 2–4 constraints), so the branching factor stays local.

use std::collections::HashMap;

use crate::triple::Triple;
use crate::vocabulary::{CompiledBgp, Term, TriplePattern};

/// A consistent assignment of variable names to values.
pub type Bindings = HashMap<String, String>;

/// Match a compiled BGP against an unordered batch of triples, producing
/// every globally consistent variable binding.
///
/// No side effects. The result is a set: callers must not read meaning into
/// enumeration order. Self-loop triples in the batch are never candidates.
pub fn match_bgp(pattern: &CompiledBgp, triples: &[Triple]) -> Vec<Bindings> {
    if pattern.constraints.is_empty() || triples.is_empty() {
        return vec![];
    }

    let mut subject_index: HashMap<&str, Vec<&Triple>> = HashMap::new();
    for t in triples {
        if t.is_self_loop() {
            continue;
        }
        subject_index.entry(t.subject.as_str()).or_default().push(t);
    }

    let mut results = Vec::new();
    solve(
        &pattern.constraints,
        0,
        Bindings::new(),
        &subject_index,
        triples,
        &mut results,
    );
    results
}

/// Resolve a term to a concrete value under the current bindings, if any.
fn resolve<'a>(term: &'a Term, bindings: &'a Bindings) -> Option<&'a str> {
    match term {
        Term::Bound(v) => Some(v),
        Term::Var(name) => bindings.get(name).map(String::as_str),
    }
}

/// Extend bindings with `value` for `term`, failing on conflict.
fn extend(term: &Term, value: &str, bindings: &mut Bindings) -> bool {
    match term {
        Term::Bound(v) => v == value,
        Term::Var(name) => match bindings.get(name) {
            Some(existing) => existing == value,
            None => {
                bindings.insert(name.clone(), value.to_string());
                true
            }
        },
    }
}

fn solve(
    constraints: &[TriplePattern],
    index: usize,
    bindings: Bindings,
    subject_index: &HashMap<&str, Vec<&Triple>>,
    triples: &[Triple],
    results: &mut Vec<Bindings>,
) {
    if index == constraints.len() {
        results.push(bindings);
        return;
    }

    let constraint = &constraints[index];

    // Indexed lookup when the subject resolves, full scan otherwise.
    let candidates: Vec<&Triple> = match resolve(&constraint.subject, &bindings) {
        Some(subject) => subject_index.get(subject).cloned().unwrap_or_default(),
        None => triples.iter().filter(|t| !t.is_self_loop()).collect(),
    };

    for candidate in candidates {
        let mut extended = bindings.clone();
        if extend(&constraint.subject, &candidate.subject, &mut extended)
            && extend(&constraint.predicate, &candidate.predicate, &mut extended)
            && extend(&constraint.object, &candidate.object, &mut extended)
        {
            solve(constraints, index + 1, extended, subject_index, triples, results);
        }
    }
}

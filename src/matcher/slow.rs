//! Slow-path pattern evaluation via an embedded SPARQL engine.
//!
//! Patterns needing filters, unions, or optionals cannot run on the fast
//! in-memory matcher, so the vocabulary routes them here: a just-in-time
//! oxigraph store is built from the perception batch and the pattern's
//! SPARQL query runs against it, one solution row per binding.
//!
//! Batch terms that are not absolute IRIs are stored under the
//! `urn:wayfarer:term:` namespace (percent-encoded), so a slow-path query
//! refers to the plain term `linksTo` as `<urn:wayfarer:term:linksTo>`.

use oxigraph::model::{GraphNameRef, NamedNode, Quad, Term as RdfTerm};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::MatchError;
use crate::triple::Triple;

use super::bgp::Bindings;

/// IRI namespace for plain batch terms.
const BATCH_NS: &str = "urn:wayfarer:term:";

/// Map a batch term to an IRI: absolute IRIs pass through, anything else is
/// percent-encoded under the batch namespace.
fn term_to_iri(term: &str) -> NamedNode {
    if let Ok(node) = NamedNode::new(term) {
        return node;
    }
    NamedNode::new(format!("{BATCH_NS}{}", encode(term))).expect("encoded term is a valid IRI")
}

/// Recover the original term from an IRI produced by [`term_to_iri`].
fn iri_to_term(iri: &str) -> String {
    match iri.strip_prefix(BATCH_NS) {
        Some(encoded) => decode(encoded),
        None => iri.to_string(),
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn encode(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for b in term.bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn decode(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(hex) = encoded.get(i + 1..i + 3) {
                if let Ok(b) = u8::from_str_radix(hex, 16) {
                    out.push(b);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Extract a plain string value from a solution term.
fn term_value(term: &RdfTerm) -> String {
    match term {
        RdfTerm::NamedNode(n) => iri_to_term(n.as_str()),
        RdfTerm::Literal(l) => l.value().to_string(),
        other => other.to_string(),
    }
}

/// Build a just-in-time graph from the batch and evaluate a SPARQL SELECT
/// query, returning one binding map per solution row.
pub fn query_batch(
    pattern_id: &str,
    sparql: &str,
    triples: &[Triple],
) -> Result<Vec<Bindings>, MatchError> {
    let store = Store::new().map_err(|e| MatchError::BatchGraph {
        message: format!("failed to create batch store: {e}"),
    })?;

    for t in triples {
        let quad = Quad::new(
            term_to_iri(&t.subject),
            term_to_iri(&t.predicate),
            term_to_iri(&t.object),
            GraphNameRef::DefaultGraph,
        );
        store.insert(&quad).map_err(|e| MatchError::BatchGraph {
            message: format!("insert failed: {e}"),
        })?;
    }

    let results = store.query(sparql).map_err(|e| MatchError::SlowQuery {
        pattern_id: pattern_id.to_string(),
        message: e.to_string(),
    })?;

    let QueryResults::Solutions(solutions) = results else {
        return Err(MatchError::SlowQuery {
            pattern_id: pattern_id.to_string(),
            message: "expected a SELECT query producing solutions".into(),
        });
    };

    let mut rows = Vec::new();
    for solution in solutions {
        let solution = solution.map_err(|e| MatchError::SlowQuery {
            pattern_id: pattern_id.to_string(),
            message: format!("solution error: {e}"),
        })?;
        let mut bindings = Bindings::new();
        for (var, term) in solution.iter() {
            bindings.insert(var.as_str().to_string(), term_value(term));
        }
        rows.push(bindings);
    }
    Ok(rows)
}

//! Declarative vocabulary loading from TOML documents.
//!
//! A vocabulary file holds `[[simple]]` and `[[structural]]` tables:
//!
//! ```toml
//! [[simple]]
//! id = "p1"
//! type = "marker"
//! priority = 0.5
//! position = "predicate"
//! value = "hasMarker"
//!
//! [[structural]]
//! id = "hub"
//! type = "hub"
//! priority = 0.8
//! target = "?x"
//! relevance = "?n"
//! bgp = ["?x linksTo ?y", "?y linkCount ?n"]
//! ```
//!
//! A structural table provides exactly one of `bgp` (fast path) or `sparql`
//! (slow path escape hatch for filters/unions/optionals).

use std::path::Path;

use serde::Deserialize;

use crate::error::VocabularyError;

use super::{
    CompiledBgp, MatchPath, SimplePattern, StructuralPattern, Term, TriplePattern,
    TriplePosition, Vocabulary,
};

#[derive(Debug, Deserialize)]
struct VocabularyDoc {
    #[serde(default)]
    simple: Vec<SimpleDoc>,
    #[serde(default)]
    structural: Vec<StructuralDoc>,
}

#[derive(Debug, Deserialize)]
struct SimpleDoc {
    id: String,
    #[serde(rename = "type")]
    pattern_type: String,
    priority: f64,
    position: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct StructuralDoc {
    id: String,
    #[serde(rename = "type")]
    pattern_type: String,
    priority: f64,
    target: String,
    relevance: Option<String>,
    bgp: Option<Vec<String>>,
    sparql: Option<String>,
}

impl Vocabulary {
    /// Parse and compile a vocabulary from a TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self, VocabularyError> {
        let doc: VocabularyDoc =
            toml::from_str(source).map_err(|e| VocabularyError::Parse {
                message: e.to_string(),
            })?;

        let mut builder = Vocabulary::builder();

        for s in doc.simple {
            let position =
                TriplePosition::parse(&s.position).ok_or_else(|| {
                    VocabularyError::InvalidPosition {
                        pattern_id: s.id.clone(),
                        position: s.position.clone(),
                    }
                })?;
            builder = builder.simple(SimplePattern {
                id: s.id,
                pattern_type: s.pattern_type,
                priority: s.priority,
                position,
                value: s.value,
            });
        }

        for s in doc.structural {
            let path = match (s.bgp, s.sparql) {
                (Some(lines), None) => MatchPath::Fast(parse_bgp(&s.id, &lines)?),
                (None, Some(query)) => MatchPath::Slow(query),
                _ => {
                    return Err(VocabularyError::AmbiguousMatchPath {
                        pattern_id: s.id,
                    });
                }
            };
            builder = builder.structural(StructuralPattern {
                id: s.id,
                pattern_type: s.pattern_type,
                priority: s.priority,
                target_variable: strip_var(&s.target),
                relevance_variable: s.relevance.as_deref().map(strip_var),
                path,
            });
        }

        builder.build()
    }

    /// Load and compile a vocabulary from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, VocabularyError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| VocabularyError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let vocab = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            patterns = vocab.len(),
            "loaded vocabulary"
        );
        Ok(vocab)
    }
}

/// Variable names may be written with or without the leading `?`.
fn strip_var(name: &str) -> String {
    name.strip_prefix('?').unwrap_or(name).to_string()
}

fn parse_bgp(pattern_id: &str, lines: &[String]) -> Result<CompiledBgp, VocabularyError> {
    let mut constraints = Vec::with_capacity(lines.len());
    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [s, p, o] = tokens[..] else {
            return Err(VocabularyError::MalformedBgpLine {
                pattern_id: pattern_id.to_string(),
                line: line.clone(),
            });
        };
        constraints.push(TriplePattern::new(
            Term::parse(s),
            Term::parse(p),
            Term::parse(o),
        ));
    }
    Ok(CompiledBgp::new(constraints))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DOC: &str = r#"
[[simple]]
id = "p1"
type = "marker"
priority = 0.5
position = "predicate"
value = "hasMarker"

[[structural]]
id = "hub"
type = "hub"
priority = 0.8
target = "?x"
relevance = "?n"
bgp = ["?x linksTo ?y", "?x linkCount ?n"]

[[structural]]
id = "orphan"
type = "orphan"
priority = -0.4
target = "?x"
sparql = "SELECT ?x WHERE { ?x <urn:t> ?y . FILTER NOT EXISTS { ?z <urn:t> ?x } }"
"#;

    #[test]
    fn parse_full_document() {
        let vocab = Vocabulary::from_toml_str(DOC).unwrap();
        assert_eq!(vocab.simple_patterns().len(), 1);
        assert_eq!(vocab.structural_patterns().len(), 2);

        let hub = &vocab.structural_patterns()[0];
        assert_eq!(hub.target_variable, "x");
        assert_eq!(hub.relevance_variable.as_deref(), Some("n"));
        assert!(matches!(&hub.path, MatchPath::Fast(bgp) if bgp.constraints.len() == 2));

        let orphan = &vocab.structural_patterns()[1];
        assert!(matches!(&orphan.path, MatchPath::Slow(_)));
    }

    #[test]
    fn bgp_terms_parse_variables_and_bounds() {
        let bgp = parse_bgp("t", &["?x linksTo target".to_string()]).unwrap();
        let c = &bgp.constraints[0];
        assert_eq!(c.subject, Term::Var("x".into()));
        assert_eq!(c.predicate, Term::Bound("linksTo".into()));
        assert_eq!(c.object, Term::Bound("target".into()));
    }

    #[test]
    fn malformed_bgp_line_rejected() {
        let err = parse_bgp("t", &["?x linksTo".to_string()]).unwrap_err();
        assert!(matches!(err, VocabularyError::MalformedBgpLine { .. }));
    }

    #[test]
    fn both_bgp_and_sparql_rejected() {
        let doc = r#"
[[structural]]
id = "bad"
type = "x"
priority = 0.1
target = "?x"
bgp = ["?x a ?y"]
sparql = "SELECT ?x WHERE { ?x ?p ?o }"
"#;
        let err = Vocabulary::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, VocabularyError::AmbiguousMatchPath { .. }));
    }

    #[test]
    fn out_of_range_priority_rejects_file() {
        let doc = r#"
[[simple]]
id = "p1"
type = "marker"
priority = 2.0
position = "object"
value = "x"
"#;
        let err = Vocabulary::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, VocabularyError::PriorityOutOfRange { .. }));
    }

    #[test]
    fn invalid_position_rejected() {
        let doc = r#"
[[simple]]
id = "p1"
type = "marker"
priority = 0.2
position = "verb"
value = "x"
"#;
        let err = Vocabulary::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, VocabularyError::InvalidPosition { .. }));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();
        let vocab = Vocabulary::from_toml_file(file.path()).unwrap();
        assert_eq!(vocab.len(), 3);
    }
}

//! Compiled pattern vocabulary.
//!
//! A vocabulary is built once from a declarative source and is immutable
//! afterwards. It holds two pattern families:
//!
//! - **Simple patterns**: a single value matched at one triple position,
//!   O(1) indexable by (value, position).
//! - **Structural patterns**: a basic graph pattern (BGP) across several
//!   triples, routed at compile time onto the fast in-memory matcher or the
//!   slow SPARQL escape hatch. The routing is a functional decision, not a
//!   heuristic: the fast path cannot express FILTER/OPTIONAL/UNION semantics.
//!
//! Priority validation is fail-fast: any priority outside [-1.0, 1.0]
//! rejects the whole vocabulary.

pub mod loader;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::VocabularyError;

/// Which position of a triple a simple pattern matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriplePosition {
    Subject,
    Predicate,
    Object,
}

impl TriplePosition {
    /// Parse from the lowercase names used in vocabulary files.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "subject" => Some(Self::Subject),
            "predicate" => Some(Self::Predicate),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

/// A single-triple pattern: match `value` at `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplePattern {
    /// Stable pattern id.
    pub id: String,
    /// Semantic type tag carried into the emitted result.
    pub pattern_type: String,
    /// Static priority in [-1.0, 1.0].
    pub priority: f64,
    /// Which triple position the value must appear at.
    pub position: TriplePosition,
    /// The value to match.
    pub value: String,
}

/// One term of a BGP constraint: a bound value or a named variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// A concrete value the triple term must equal.
    Bound(String),
    /// A variable name (without the leading `?`).
    Var(String),
}

impl Term {
    /// Parse a BGP line token: `?name` is a variable, anything else is bound.
    pub fn parse(token: &str) -> Self {
        match token.strip_prefix('?') {
            Some(name) => Self::Var(name.to_string()),
            None => Self::Bound(token.to_string()),
        }
    }

    /// The variable name, if this term is a variable.
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Self::Var(name) => Some(name),
            Self::Bound(_) => None,
        }
    }
}

/// A single triple template inside a BGP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl TriplePattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// An ordered list of triple constraints sharing a variable namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledBgp {
    pub constraints: Vec<TriplePattern>,
}

impl CompiledBgp {
    pub fn new(constraints: Vec<TriplePattern>) -> Self {
        Self { constraints }
    }

    /// All variable names referenced by any constraint.
    pub fn variables(&self) -> HashSet<&str> {
        self.constraints
            .iter()
            .flat_map(|c| {
                [&c.subject, &c.predicate, &c.object]
                    .into_iter()
                    .filter_map(Term::var_name)
            })
            .collect()
    }
}

/// How a structural pattern is evaluated. Decided once at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchPath {
    /// Plain bound-or-variable BGP: in-memory backtracking matcher, no query
    /// engine state.
    Fast(CompiledBgp),
    /// Richer query form (filters, unions, optionals): evaluated by the
    /// embedded SPARQL engine over a just-in-time batch graph.
    Slow(String),
}

/// A cross-triple pattern with a declared target variable and an optional
/// relevance variable feeding the scoring layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralPattern {
    /// Stable pattern id.
    pub id: String,
    /// Semantic type tag carried into the emitted result.
    pub pattern_type: String,
    /// Static priority in [-1.0, 1.0].
    pub priority: f64,
    /// Variable whose binding becomes the result target.
    pub target_variable: String,
    /// Variable whose binding becomes the raw relevance signal, if declared.
    pub relevance_variable: Option<String>,
    /// Fast or slow evaluation path.
    pub path: MatchPath,
}

/// Immutable compiled vocabulary with indexed simple-pattern lookup.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    simple: Vec<SimplePattern>,
    structural: Vec<StructuralPattern>,
    /// (value, position) → index into `simple`. Unique by construction; the
    /// builder rejects colliding keys.
    simple_index: HashMap<(String, TriplePosition), usize>,
}

impl Vocabulary {
    /// Start building a vocabulary.
    pub fn builder() -> VocabularyBuilder {
        VocabularyBuilder::default()
    }

    /// O(1) lookup of the simple pattern matching `value` at `position`.
    pub fn simple_for(&self, value: &str, position: TriplePosition) -> Option<&SimplePattern> {
        self.simple_index
            .get(&(value.to_string(), position))
            .map(|&i| &self.simple[i])
    }

    /// All structural patterns, in declaration order.
    pub fn structural_patterns(&self) -> &[StructuralPattern] {
        &self.structural
    }

    /// All simple patterns, in declaration order.
    pub fn simple_patterns(&self) -> &[SimplePattern] {
        &self.simple
    }

    /// Total pattern count.
    pub fn len(&self) -> usize {
        self.simple.len() + self.structural.len()
    }

    /// Whether the vocabulary holds no patterns.
    pub fn is_empty(&self) -> bool {
        self.simple.is_empty() && self.structural.is_empty()
    }
}

/// Builder validating priorities, ids, and fast-path target variables.
#[derive(Debug, Default)]
pub struct VocabularyBuilder {
    simple: Vec<SimplePattern>,
    structural: Vec<StructuralPattern>,
}

impl VocabularyBuilder {
    /// Add a simple pattern.
    pub fn simple(mut self, pattern: SimplePattern) -> Self {
        self.simple.push(pattern);
        self
    }

    /// Add a structural pattern.
    pub fn structural(mut self, pattern: StructuralPattern) -> Self {
        self.structural.push(pattern);
        self
    }

    /// Validate and freeze the vocabulary.
    pub fn build(self) -> Result<Vocabulary, VocabularyError> {
        let mut ids: HashSet<&str> = HashSet::new();

        for p in &self.simple {
            validate_priority(&p.id, p.priority)?;
            if !ids.insert(&p.id) {
                return Err(VocabularyError::DuplicateId {
                    pattern_id: p.id.clone(),
                });
            }
        }

        for p in &self.structural {
            validate_priority(&p.id, p.priority)?;
            if !ids.insert(&p.id) {
                return Err(VocabularyError::DuplicateId {
                    pattern_id: p.id.clone(),
                });
            }
            if let MatchPath::Fast(bgp) = &p.path {
                if !bgp.variables().contains(p.target_variable.as_str()) {
                    return Err(VocabularyError::UnknownTargetVariable {
                        pattern_id: p.id.clone(),
                        variable: p.target_variable.clone(),
                    });
                }
                for (index, c) in bgp.constraints.iter().enumerate() {
                    if let (Term::Bound(s), Term::Bound(o)) = (&c.subject, &c.object) {
                        if s == o {
                            return Err(VocabularyError::SelfLoopConstraint {
                                pattern_id: p.id.clone(),
                                index,
                                term: s.clone(),
                            });
                        }
                    }
                }
            }
        }

        let mut simple_index: HashMap<(String, TriplePosition), usize> = HashMap::new();
        for (i, p) in self.simple.iter().enumerate() {
            // Two patterns on the same (value, position) key can never both
            // fire; silent shadowing would hide the second one.
            if let Some(&prev) = simple_index.get(&(p.value.clone(), p.position)) {
                return Err(VocabularyError::ShadowedPattern {
                    pattern_id: p.id.clone(),
                    existing_id: self.simple[prev].id.clone(),
                    value: p.value.clone(),
                });
            }
            simple_index.insert((p.value.clone(), p.position), i);
        }

        tracing::debug!(
            simple = self.simple.len(),
            structural = self.structural.len(),
            "compiled vocabulary"
        );

        Ok(Vocabulary {
            simple: self.simple,
            structural: self.structural,
            simple_index,
        })
    }
}

fn validate_priority(pattern_id: &str, priority: f64) -> Result<(), VocabularyError> {
    if !(-1.0..=1.0).contains(&priority) || priority.is_nan() {
        return Err(VocabularyError::PriorityOutOfRange {
            pattern_id: pattern_id.to_string(),
            priority,
        });
    }
    Ok(())
}

//! Pluggable utility scoring.
//!
//! Separates what produces the relevance signal (the pattern author's intent,
//! declared in the vocabulary) from how the signal saturates into a score
//! (an engineering concern, swappable without touching vocabulary files).

/// The runtime relevance signal accompanying a match.
#[derive(Debug, Clone, PartialEq)]
pub enum RelevanceContext {
    /// A simple-pattern match: the match is itself the signal.
    Simple,
    /// A structural match whose pattern declares no relevance variable.
    StructuralNoVariable,
    /// A structural match with the declared relevance variable bound to a raw value.
    StructuralPresent(String),
    /// A structural match whose declared relevance variable failed to bind.
    ///
    /// The intended signal did not materialize: this counts as evidence
    /// against engagement, not as a neutral match.
    StructuralAbsent,
}

/// Combines a pattern's static priority with a runtime relevance signal.
pub trait ScoringStrategy: Send + Sync {
    /// Compute a utility in [-1.0, 1.0] for `priority` ∈ [-1.0, 1.0].
    fn calculate_utility(&self, priority: f64, context: &RelevanceContext) -> f64;
}

/// Default scoring: utility = priority × relevance, where a raw numeric
/// relevance value saturates through `x / (x + k)`.
#[derive(Debug, Clone)]
pub struct SaturatingScoring {
    /// Half-saturation constant: `normalize(k) = 0.5`.
    pub k: f64,
}

impl SaturatingScoring {
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    /// Normalize a raw relevance value into [0.0, 1.0].
    ///
    /// Non-numeric values that still represent presence (a resource
    /// identifier rather than a literal) normalize to 1.0.
    pub fn normalize(&self, raw: &str) -> f64 {
        match raw.trim().parse::<f64>() {
            // "inf" and overflowing literals like "1e400" parse to infinity;
            // x/(x+k) would be NaN there, but the curve's limit is 1.0.
            Ok(x) if x == f64::INFINITY => 1.0,
            Ok(x) if x > 0.0 => x / (x + self.k),
            // Zero, negatives, -inf, and NaN all carry no positive signal.
            Ok(_) => 0.0,
            Err(_) => 1.0,
        }
    }
}

impl Default for SaturatingScoring {
    fn default() -> Self {
        Self { k: 1.0 }
    }
}

impl ScoringStrategy for SaturatingScoring {
    fn calculate_utility(&self, priority: f64, context: &RelevanceContext) -> f64 {
        let relevance = match context {
            RelevanceContext::Simple | RelevanceContext::StructuralNoVariable => 1.0,
            RelevanceContext::StructuralAbsent => 0.0,
            RelevanceContext::StructuralPresent(raw) => self.normalize(raw),
        };
        priority * relevance
    }
}

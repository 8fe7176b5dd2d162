//! The triple: an immutable (subject, predicate, object) graph fact.
//!
//! Terms are plain strings. A triple has no identity beyond structural
//! equality; matchers consume them read-only.

use serde::{Deserialize, Serialize};

/// A (subject, predicate, object) fact perceived from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// The subject of the triple.
    pub subject: String,
    /// The predicate (relation) of the triple.
    pub predicate: String,
    /// The object of the triple.
    pub object: String,
}

impl Triple {
    /// Create a new triple.
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Whether the triple links a resource to itself.
    ///
    /// Self-loops are excluded from structural matching and from backtrack
    /// checkpoint collection.
    pub fn is_self_loop(&self) -> bool {
        self.subject == self.object
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality() {
        let a = Triple::new("s", "p", "o");
        let b = Triple::new("s", "p", "o");
        assert_eq!(a, b);
        assert_ne!(a, Triple::new("s", "p", "x"));
    }

    #[test]
    fn self_loop_detection() {
        assert!(Triple::new("a", "linksTo", "a").is_self_loop());
        assert!(!Triple::new("a", "linksTo", "b").is_self_loop());
    }

    #[test]
    fn display_format() {
        let t = Triple::new("r1", "hasMarker", "m1");
        assert_eq!(format!("{t}"), "(r1, hasMarker, m1)");
    }
}

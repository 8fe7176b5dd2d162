//! Rich diagnostic error types for the wayfarer core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly what went wrong
//! and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the wayfarer core.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source chains) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum WayfarerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Vocabulary(#[from] VocabularyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Contingency(#[from] ContingencyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Vocabulary errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum VocabularyError {
    #[error("pattern \"{pattern_id}\" has priority {priority} outside [-1.0, 1.0]")]
    #[diagnostic(
        code(wayfarer::vocab::priority_range),
        help(
            "Pattern priorities must lie in [-1.0, 1.0]. Fix the priority in the \
             vocabulary source; the whole vocabulary is rejected until it does."
        )
    )]
    PriorityOutOfRange { pattern_id: String, priority: f64 },

    #[error("duplicate pattern id: \"{pattern_id}\"")]
    #[diagnostic(
        code(wayfarer::vocab::duplicate_id),
        help("Every pattern in a vocabulary needs a unique id. Rename one of the duplicates.")
    )]
    DuplicateId { pattern_id: String },

    #[error(
        "pattern \"{pattern_id}\" shadows \"{existing_id}\": both match \"{value}\" at the same position"
    )]
    #[diagnostic(
        code(wayfarer::vocab::shadowed_pattern),
        help(
            "Simple-pattern lookup is keyed by (value, position), so only the first \
             of two colliding patterns could ever fire. Remove one of them or move \
             it to a different position."
        )
    )]
    ShadowedPattern {
        pattern_id: String,
        existing_id: String,
        value: String,
    },

    #[error(
        "pattern \"{pattern_id}\" declares target variable \"{variable}\" that no constraint binds"
    )]
    #[diagnostic(
        code(wayfarer::vocab::unknown_target),
        help(
            "The target variable of a fast-path structural pattern must appear in at \
             least one BGP constraint, otherwise no match could ever name a target."
        )
    )]
    UnknownTargetVariable {
        pattern_id: String,
        variable: String,
    },

    #[error("pattern \"{pattern_id}\" constraint {index} is a self-loop: ({term}, _, {term})")]
    #[diagnostic(
        code(wayfarer::vocab::self_loop),
        help(
            "Constraints whose bound subject and object are the same term can never \
             match: the matcher excludes self-loop triples by design."
        )
    )]
    SelfLoopConstraint {
        pattern_id: String,
        index: usize,
        term: String,
    },

    #[error("pattern \"{pattern_id}\" must define exactly one of `bgp` or `sparql`")]
    #[diagnostic(
        code(wayfarer::vocab::ambiguous_path),
        help(
            "A structural pattern is either fast-path (a `bgp` list of triple lines) \
             or slow-path (a `sparql` query), never both and never neither."
        )
    )]
    AmbiguousMatchPath { pattern_id: String },

    #[error("malformed BGP line in pattern \"{pattern_id}\": \"{line}\"")]
    #[diagnostic(
        code(wayfarer::vocab::bad_bgp_line),
        help(
            "Each BGP line must be three whitespace-separated terms, e.g. \
             \"?x linksTo ?y\". Variables start with '?', anything else is a bound value."
        )
    )]
    MalformedBgpLine { pattern_id: String, line: String },

    #[error("invalid triple position \"{position}\" in pattern \"{pattern_id}\"")]
    #[diagnostic(
        code(wayfarer::vocab::bad_position),
        help("Valid positions are: subject, predicate, object.")
    )]
    InvalidPosition {
        pattern_id: String,
        position: String,
    },

    #[error("failed to parse vocabulary document: {message}")]
    #[diagnostic(
        code(wayfarer::vocab::parse),
        help("The vocabulary file is not valid TOML or is missing required fields.")
    )]
    Parse { message: String },

    #[error("failed to read vocabulary file {path}: {source}")]
    #[diagnostic(
        code(wayfarer::vocab::io),
        help("Check that the vocabulary file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Pattern-matching errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MatchError {
    #[error("slow-path query failed for pattern \"{pattern_id}\": {message}")]
    #[diagnostic(
        code(wayfarer::matching::slow_query),
        help(
            "The SPARQL escape hatch for this pattern failed against the batch graph. \
             Check the query syntax; the rest of the batch is unaffected."
        )
    )]
    SlowQuery {
        pattern_id: String,
        message: String,
    },

    #[error("batch graph construction failed: {message}")]
    #[diagnostic(
        code(wayfarer::matching::batch_graph),
        help("Building the just-in-time query graph from the triple batch failed.")
    )]
    BatchGraph { message: String },
}

// ---------------------------------------------------------------------------
// Interaction history errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum HistoryError {
    #[error("interaction log capacity must be > 0")]
    #[diagnostic(
        code(wayfarer::history::zero_capacity),
        help("Construct the InteractionLog with a positive per-agent ring capacity.")
    )]
    ZeroCapacity,
}

// ---------------------------------------------------------------------------
// Text-generation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("text generation is not available at {url}")]
    #[diagnostic(
        code(wayfarer::llm::unavailable),
        help("Start the model server (e.g. `ollama serve`) or leave text generation unconfigured.")
    )]
    Unavailable { url: String },

    #[error("text generation request failed: {message}")]
    #[diagnostic(
        code(wayfarer::llm::request_failed),
        help("Check that the model server is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse model response: {message}")]
    #[diagnostic(
        code(wayfarer::llm::parse_error),
        help("The model returned text the response parser could not extract an action from.")
    )]
    ParseError { message: String },

    #[error("text generation timed out after {timeout_secs}s")]
    #[diagnostic(
        code(wayfarer::llm::timeout),
        help("Increase the timeout or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

// ---------------------------------------------------------------------------
// Contingency errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ContingencyError {
    #[error("duplicate strategy id: \"{strategy_id}\"")]
    #[diagnostic(
        code(wayfarer::contingency::duplicate_strategy),
        help(
            "A strategy with this id is already registered. Silent overwrite would \
             hide a configuration bug, so registration fails fast instead."
        )
    )]
    DuplicateStrategy { strategy_id: String },

    #[error("strategy \"{strategy_id}\" evaluation failed: {message}")]
    #[diagnostic(
        code(wayfarer::contingency::evaluation),
        help(
            "The strategy raised an internal error. The orchestrator converts this \
             into a NoHelp(EvaluationFailed) verdict and continues with the next strategy."
        )
    )]
    Evaluation {
        strategy_id: String,
        message: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(wayfarer::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },
}

/// Convenience alias for functions returning wayfarer results.
pub type WayfarerResult<T> = std::result::Result<T, WayfarerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_error_converts_to_wayfarer_error() {
        let err = VocabularyError::PriorityOutOfRange {
            pattern_id: "p1".into(),
            priority: 1.5,
        };
        let top: WayfarerError = err.into();
        assert!(matches!(
            top,
            WayfarerError::Vocabulary(VocabularyError::PriorityOutOfRange { .. })
        ));
    }

    #[test]
    fn llm_error_wraps_into_contingency_error() {
        let err = LlmError::RequestFailed {
            message: "connection refused".into(),
        };
        let cont: ContingencyError = err.into();
        assert!(matches!(cont, ContingencyError::Llm(_)));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = VocabularyError::PriorityOutOfRange {
            pattern_id: "hub".into(),
            priority: -3.0,
        };
        let msg = format!("{err}");
        assert!(msg.contains("hub"));
        assert!(msg.contains("-3"));
    }
}

//! # wayfarer
//!
//! An agent brain for navigating linked resources: an opportunistic
//! pattern-matching engine over RDF-style triples plus a contingency
//! recovery engine for when navigation goes wrong.
//!
//! ## Architecture
//!
//! - **Opportunistic matcher** (`matcher`): scans perception batches against
//!   a compiled vocabulary; fast in-process BGP matching with a SPARQL slow
//!   path via `oxigraph`
//! - **Vocabulary** (`vocabulary`): declarative simple + structural patterns,
//!   loadable from TOML, validated at build time
//! - **Contingency engine** (`contingency`): pluggable recovery strategies
//!   evaluated in escalation order with full tracing
//! - **Fact store** (`store`): dual-indexed in-memory graph (petgraph +
//!   `DashMap` node index)
//! - **Interaction log** (`history`): per-agent bounded ring buffer, safe for
//!   concurrent appends
//! - **Text generation** (`llm`): Ollama-backed client behind a narrow trait,
//!   used by the prediction and consultation strategies
//!
//! ## Library usage
//!
//! ```no_run
//! use std::collections::HashMap;
//! use wayfarer::engine::{Engine, EngineConfig};
//! use wayfarer::triple::Triple;
//! use wayfarer::vocabulary::Vocabulary;
//!
//! let vocabulary = Vocabulary::from_toml_file("vocabulary.toml").unwrap();
//! let engine = Engine::new(vocabulary, EngineConfig::default()).unwrap();
//! let results = engine.perceive(
//!     &[Triple::new("page", "linksTo", "next")],
//!     &HashMap::new(),
//! );
//! for result in results {
//!     println!("{} -> {} ({:.2})", result.result_type, result.target, result.utility);
//! }
//! ```

pub mod contingency;
pub mod engine;
pub mod error;
pub mod history;
pub mod llm;
pub mod matcher;
pub mod store;
pub mod triple;
pub mod vocabulary;

pub use error::{WayfarerError, WayfarerResult};

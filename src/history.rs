//! Interaction history log.
//!
//! A bounded, time-ordered record of past request/response interactions,
//! partitioned per agent. This is the one component with a legitimate
//! multi-writer shape: multiple agents may log concurrently, so partitions
//! live in a `DashMap` and each partition is an `RwLock`ed ring buffer.

use std::collections::VecDeque;
use std::sync::RwLock;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::HistoryError;
use crate::triple::Triple;

/// Coarse outcome classification of an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionOutcome {
    Success,
    ClientFailure,
    ServerFailure,
    Unknown,
}

impl std::fmt::Display for InteractionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "SUCCESS",
            Self::ClientFailure => "CLIENT_FAILURE",
            Self::ServerFailure => "SERVER_FAILURE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One past request/response interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Request method (e.g. "GET").
    pub method: String,
    /// The resource the request targeted.
    pub request_uri: String,
    /// How the interaction ended.
    pub outcome: InteractionOutcome,
    /// Triples perceived in the response.
    pub perceived_state: Vec<Triple>,
    /// Milliseconds since UNIX epoch when the request was issued.
    pub request_timestamp_ms: u64,
    /// Milliseconds since UNIX epoch when the response arrived.
    pub response_timestamp_ms: u64,
    /// Logical source tag (e.g. which workspace or artifact produced it).
    pub logical_source: String,
}

impl Interaction {
    /// Create an interaction stamped with the current time.
    pub fn new(
        method: impl Into<String>,
        request_uri: impl Into<String>,
        outcome: InteractionOutcome,
    ) -> Self {
        let now = now_ms();
        Self {
            method: method.into(),
            request_uri: request_uri.into(),
            outcome,
            perceived_state: Vec::new(),
            request_timestamp_ms: now,
            response_timestamp_ms: now,
            logical_source: String::new(),
        }
    }

    /// Attach the triples perceived in the response.
    pub fn with_perceived_state(mut self, triples: Vec<Triple>) -> Self {
        self.perceived_state = triples;
        self
    }

    /// Tag the logical source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.logical_source = source.into();
        self
    }

    /// Override the timestamps (useful when replaying recorded traffic).
    pub fn with_timestamps(mut self, request_ms: u64, response_ms: u64) -> Self {
        self.request_timestamp_ms = request_ms;
        self.response_timestamp_ms = response_ms;
        self
    }

    /// Whether the interaction completed successfully.
    pub fn succeeded(&self) -> bool {
        self.outcome == InteractionOutcome::Success
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Concurrent per-agent interaction log with bounded ring-buffer partitions.
pub struct InteractionLog {
    partitions: DashMap<String, RwLock<VecDeque<Interaction>>>,
    capacity: usize,
}

impl InteractionLog {
    /// Create a log with the given per-agent ring capacity.
    pub fn new(capacity: usize) -> Result<Self, HistoryError> {
        if capacity == 0 {
            return Err(HistoryError::ZeroCapacity);
        }
        Ok(Self {
            partitions: DashMap::new(),
            capacity,
        })
    }

    /// Append an interaction to an agent's partition, evicting the oldest
    /// entry once the ring is full.
    pub fn record(&self, agent_id: &str, interaction: Interaction) {
        let partition = self
            .partitions
            .entry(agent_id.to_string())
            .or_insert_with(|| RwLock::new(VecDeque::with_capacity(self.capacity)));
        let mut ring = partition.write().expect("history lock poisoned");
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(interaction);
    }

    /// The most recent `max_count` interactions for an agent, newest first.
    pub fn recent(&self, agent_id: &str, max_count: usize) -> Vec<Interaction> {
        let Some(partition) = self.partitions.get(agent_id) else {
            return vec![];
        };
        let ring = partition.read().expect("history lock poisoned");
        ring.iter().rev().take(max_count).cloned().collect()
    }

    /// The single most recent interaction for an agent.
    pub fn last(&self, agent_id: &str) -> Option<Interaction> {
        self.recent(agent_id, 1).into_iter().next()
    }

    /// All retained interactions for an agent with the given logical source,
    /// newest first.
    pub fn for_source(&self, agent_id: &str, source: &str) -> Vec<Interaction> {
        self.recent(agent_id, self.capacity)
            .into_iter()
            .filter(|i| i.logical_source == source)
            .collect()
    }

    /// Number of retained interactions for an agent.
    pub fn len(&self, agent_id: &str) -> usize {
        self.partitions
            .get(agent_id)
            .map(|p| p.read().expect("history lock poisoned").len())
            .unwrap_or(0)
    }

    /// Whether the agent has no retained interactions.
    pub fn is_empty(&self, agent_id: &str) -> bool {
        self.len(agent_id) == 0
    }

    /// Per-agent ring capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl std::fmt::Debug for InteractionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionLog")
            .field("agents", &self.partitions.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

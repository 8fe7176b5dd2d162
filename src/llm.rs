//! Text-generation boundary.
//!
//! The LLM is the only non-deterministic strategy input, so it sits behind
//! the narrowest possible interface: a blocking `complete(prompt) -> String`
//! plus an availability probe. No streaming and no structured output; all
//! structure is imposed afterwards by a [`ResponseParser`].

use std::collections::HashMap;

use crate::error::LlmError;

/// Narrow interface over a text-generation service.
pub trait TextGeneration: Send + Sync {
    /// Produce a free-text completion for the prompt. Synchronous and
    /// potentially slow; deadline handling belongs to the caller.
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Whether the service can currently accept requests.
    fn is_available(&self) -> bool;
}

/// Configuration for the Ollama-backed client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 120,
        }
    }
}

/// [`TextGeneration`] implementation over the Ollama REST API.
pub struct OllamaClient {
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self { config }
    }
}

impl TextGeneration for OllamaClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build();

        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });
        let body_str = serde_json::to_string(&body).map_err(|e| LlmError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let resp = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e: ureq::Error| LlmError::RequestFailed {
                message: e.to_string(),
            })?;

        let resp_str = resp.into_string().map_err(|e| LlmError::ParseError {
            message: format!("failed to read response body: {e}"),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| LlmError::ParseError {
                message: format!("response is not JSON: {e}"),
            })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "response field missing from completion".into(),
            })
    }

    /// Lightweight probe against `/api/tags`.
    fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(5))
            .build();
        matches!(agent.get(&url).call(), Ok(resp) if resp.status() == 200)
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// A structured action extracted from free-text model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAction {
    /// The action to take (e.g. "navigate", "retry").
    pub action: String,
    /// Target resource, if the model named one.
    pub target: Option<String>,
    /// The model's explanation, if present.
    pub explanation: Option<String>,
    /// Confidence in [0.0, 1.0], if the model reported one.
    pub confidence: Option<f64>,
    /// Any further tagged lines.
    pub metadata: HashMap<String, String>,
}

/// Imposes structure onto raw model output.
pub trait ResponseParser: Send + Sync {
    /// Extract an action from raw text, or fail with a parse error.
    fn parse(&self, raw: &str) -> Result<ParsedAction, LlmError>;
}

/// Default parser: extracts `ACTION:` / `TARGET:` / `EXPLANATION:` /
/// `CONFIDENCE:` lines (case-insensitive). A response without an `ACTION`
/// line is invalid.
pub struct LineTaggedParser {
    line: regex::Regex,
}

impl LineTaggedParser {
    pub fn new() -> Self {
        Self {
            // key: value, one per line
            line: regex::Regex::new(r"(?mi)^\s*([A-Za-z_]+)\s*:\s*(.+?)\s*$")
                .expect("valid tagged-line regex"),
        }
    }
}

impl Default for LineTaggedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser for LineTaggedParser {
    fn parse(&self, raw: &str) -> Result<ParsedAction, LlmError> {
        let mut action = None;
        let mut target = None;
        let mut explanation = None;
        let mut confidence = None;
        let mut metadata = HashMap::new();

        for caps in self.line.captures_iter(raw) {
            let key = caps[1].to_ascii_lowercase();
            let value = caps[2].trim().to_string();
            match key.as_str() {
                "action" => action = Some(value),
                "target" => target = Some(value),
                "explanation" => explanation = Some(value),
                "confidence" => confidence = value.parse::<f64>().ok().map(|c| c.clamp(0.0, 1.0)),
                _ => {
                    metadata.insert(key, value);
                }
            }
        }

        let Some(action) = action else {
            return Err(LlmError::ParseError {
                message: format!(
                    "no ACTION line in model output ({} chars)",
                    raw.len()
                ),
            });
        };

        Ok(ParsedAction {
            action,
            target,
            explanation,
            confidence,
            metadata,
        })
    }
}

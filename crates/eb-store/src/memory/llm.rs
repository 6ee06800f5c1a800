use std::collections::VecDeque;

use serde_json::Value;

use crate::error::LlmError;
use crate::ports::LlmPort;

/// LLM fake that replays canned responses in order, then reports empty.
#[derive(Debug, Default)]
pub struct CannedLlm {
    structured: VecDeque<Value>,
    narratives: VecDeque<String>,
}

impl CannedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_structured(&mut self, value: Value) {
        self.structured.push_back(value);
    }

    pub fn push_narrative(&mut self, text: impl Into<String>) {
        self.narratives.push_back(text.into());
    }
}

impl LlmPort for CannedLlm {
    fn generate_structured(&mut self, _prompt: &str, _schema: &str) -> Result<Value, LlmError> {
        self.structured.pop_front().ok_or(LlmError::Empty)
    }

    fn generate_narrative(&mut self, _prompt: &str) -> Result<String, LlmError> {
        self.narratives.pop_front().ok_or(LlmError::Empty)
    }
}

/// LLM fake that always times out, driving callers onto their template
/// fallbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLlm;

impl LlmPort for OfflineLlm {
    fn generate_structured(&mut self, _prompt: &str, _schema: &str) -> Result<Value, LlmError> {
        Err(LlmError::Timeout)
    }

    fn generate_narrative(&mut self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Timeout)
    }
}

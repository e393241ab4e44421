//! Request and response types shared by every oracle client.

use serde::{Deserialize, Serialize};

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One oracle call: a system role plus the conversation so far
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Overrides the client's configured model when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_user_message(self, content: impl Into<String>) -> Self {
        self.with_message(Message::user(content))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Content of the most recent user message, if any
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Text returned by the oracle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Reason why the oracle stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    MaxTokens,
    StopSequence,
}

impl StopReason {
    /// Parse the API's stop reason; unknown values count as a normal end of turn.
    pub fn from_api(value: Option<&str>) -> Self {
        match value {
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        }
    }

    /// True when the response was cut off and may hold an unclosed code fence
    pub fn is_truncated(&self) -> bool {
        matches!(self, StopReason::MaxTokens)
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Rough cost in USD, keyed on the model family name
    pub fn cost_usd(&self, model: &str) -> f64 {
        let (input_rate, output_rate) = match model {
            m if m.contains("opus") => (0.015, 0.075),
            m if m.contains("haiku") => (0.00025, 0.00125),
            _ => (0.003, 0.015),
        };

        (self.input_tokens as f64 / 1000.0 * input_rate) + (self.output_tokens as f64 / 1000.0 * output_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_request_builder() {
        let req = CompletionRequest::new("You write Python.")
            .with_user_message("count to ten")
            .with_max_tokens(512)
            .with_model("claude-haiku");

        assert_eq!(req.system, "You write Python.");
        assert_eq!(req.messages, vec![Message::user("count to ten")]);
        assert_eq!(req.max_tokens, Some(512));
        assert_eq!(req.model.as_deref(), Some("claude-haiku"));
    }

    #[test]
    fn test_request_skips_unset_fields() {
        let json = serde_json::to_value(CompletionRequest::new("sys")).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("model").is_none());
    }

    #[test]
    fn test_last_user_message() {
        let req = CompletionRequest::new("sys")
            .with_user_message("first")
            .with_message(Message::assistant("reply"))
            .with_user_message("second");
        assert_eq!(req.last_user_message(), Some("second"));
        assert_eq!(CompletionRequest::new("sys").last_user_message(), None);
    }

    #[test]
    fn test_stop_reason_from_api() {
        assert_eq!(StopReason::from_api(Some("end_turn")), StopReason::EndTurn);
        assert_eq!(StopReason::from_api(Some("max_tokens")), StopReason::MaxTokens);
        assert_eq!(StopReason::from_api(Some("stop_sequence")), StopReason::StopSequence);
        assert_eq!(StopReason::from_api(Some("tool_use")), StopReason::EndTurn);
        assert_eq!(StopReason::from_api(None), StopReason::EndTurn);
        assert!(StopReason::MaxTokens.is_truncated());
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total.add(&Usage::new(100, 50));
        total.add(&Usage::new(10, 5));
        assert_eq!(total, Usage::new(110, 55));
        assert_eq!(total.total(), 165);
    }

    #[test]
    fn test_usage_cost() {
        let usage = Usage::new(1000, 1000);
        assert!((usage.cost_usd("claude-sonnet-4") - 0.018).abs() < 1e-9);
        assert!((usage.cost_usd("claude-opus-4") - 0.09).abs() < 1e-9);
    }
}

//! Chat request shapes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of `POST /api/v1/chat/completions`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Scheduling hint; an empty string means no preference.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

impl ChatRequest {
    /// Reject requests the scheduler should never see.
    pub fn validate(&self) -> Result<(), String> {
        if self.messages.is_empty() {
            return Err("messages must not be empty".to_string());
        }
        Ok(())
    }

    /// Requested model with empty strings folded to `None`.
    pub fn requested_model(&self) -> Option<&str> {
        self.model.as_deref().filter(|m| !m.is_empty())
    }

    /// Payload for the node's inference endpoint.
    pub fn upstream<'a>(&'a self, node_model: Option<&'a str>) -> UpstreamRequest<'a> {
        UpstreamRequest {
            messages: &self.messages,
            stream: self.stream,
            model: node_model,
        }
    }
}

/// What the gateway POSTs to a node's inference endpoint. `model` is the
/// id the chosen node reported, not the caller's hint.
#[derive(Debug, Serialize)]
pub struct UpstreamRequest<'a> {
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_defaults_to_true() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"messages": [{"role": "user", "content": "hi"}]}"#).unwrap();
        assert!(req.stream);
        assert_eq!(req.requested_model(), None);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_messages_are_invalid() {
        let req: ChatRequest = serde_json::from_str(r#"{"messages": []}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_model_is_no_preference() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"messages": [{"role": "user", "content": "hi"}], "model": ""}"#)
                .unwrap();
        assert_eq!(req.requested_model(), None);
    }

    #[test]
    fn upstream_payload_uses_node_model() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"messages": [{"role": "user", "content": "hi"}], "model": "hint", "stream": false}"#,
        )
        .unwrap();

        let body = serde_json::to_value(req.upstream(Some("llama3:8b"))).unwrap();
        assert_eq!(body["model"], "llama3:8b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"], "hi");

        let body = serde_json::to_value(req.upstream(None)).unwrap();
        assert!(body.get("model").is_none());
    }
}

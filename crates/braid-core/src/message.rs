use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::SessionId;

/// A message in a conversation session.
///
/// Messages are immutable once written; their position in the session log is
/// their conversation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: SessionId,
    pub role: Role,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Human,
    Ai,
    Tool,
}

/// The payload of a message: plain text, or the structured record of a tool
/// exchange produced by the reasoning layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    ToolExchange {
        tool_name: String,
        arguments: serde_json::Value,
        output: String,
    },
}

impl Message {
    /// Create a simple text message.
    pub fn text(session_id: SessionId, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            role,
            content: MessageContent::Text { text: text.into() },
            timestamp: Utc::now(),
        }
    }

    /// The textual rendering of this message's payload.
    pub fn text_content(&self) -> &str {
        match &self.content {
            MessageContent::Text { text } => text,
            MessageContent::ToolExchange { output, .. } => output,
        }
    }
}

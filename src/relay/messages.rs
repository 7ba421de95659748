//! Outbound wire messages
//!
//! The JSON shapes are consumed by existing clients and must not change.

use crate::domain::{ConversationId, Cost, EngineId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    AiStart {
        timestamp: DateTime<Utc>,
    },
    AiChunk {
        chunk: String,
        chunk_index: u32,
    },
    ChatEnd {
        total_chunks: u32,
        engine: EngineId,
        #[serde(
            rename = "conversationId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        conversation_id: Option<ConversationId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cost: Option<Cost>,
    },
    Error {
        message: String,
    },
}

impl OutboundMessage {
    pub fn ai_start() -> Self {
        Self::AiStart {
            timestamp: Utc::now(),
        }
    }

    pub fn ai_chunk(chunk: impl Into<String>, chunk_index: u32) -> Self {
        Self::AiChunk {
            chunk: chunk.into(),
            chunk_index,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AiStart { .. } => "ai_start",
            Self::AiChunk { .. } => "ai_chunk",
            Self::ChatEnd { .. } => "chat_end",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    fn to_value(message: &OutboundMessage) -> Value {
        serde_json::from_str(&message.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_ai_chunk_wire_shape() {
        assert_eq!(
            to_value(&OutboundMessage::ai_chunk("Hello", 0)),
            json!({"type": "ai_chunk", "chunk": "Hello", "chunk_index": 0})
        );
    }

    #[test]
    fn test_chat_end_omits_absent_optionals() {
        let message = OutboundMessage::ChatEnd {
            total_chunks: 3,
            engine: EngineId::try_new("T5".to_string()).unwrap(),
            conversation_id: None,
            cost: None,
        };

        assert_eq!(
            to_value(&message),
            json!({"type": "chat_end", "total_chunks": 3, "engine": "T5"})
        );
    }

    #[test]
    fn test_chat_end_with_conversation_and_cost() {
        let message = OutboundMessage::ChatEnd {
            total_chunks: 1,
            engine: EngineId::try_new("T6".to_string()).unwrap(),
            conversation_id: Some(ConversationId::try_new("conv-1".to_string()).unwrap()),
            cost: Some(Cost::try_new(Decimal::new(4455, 6)).unwrap()),
        };

        let value = to_value(&message);
        assert_eq!(value["conversationId"], "conv-1");
        assert_eq!(value["cost"], "0.004455");
    }

    #[test]
    fn test_ai_start_and_error_shapes() {
        let start = to_value(&OutboundMessage::ai_start());
        assert_eq!(start["type"], "ai_start");
        assert!(start["timestamp"].is_string());

        assert_eq!(
            to_value(&OutboundMessage::error("boom")),
            json!({"type": "error", "message": "boom"})
        );
    }

    #[test]
    fn test_messages_parse_back() {
        let text = r#"{"type":"ai_chunk","chunk":"x","chunk_index":7}"#;
        let message: OutboundMessage = serde_json::from_str(text).unwrap();
        assert_eq!(message, OutboundMessage::ai_chunk("x", 7));
        assert_eq!(message.kind(), "ai_chunk");
    }
}

//! Chat turn inputs and engine configuration records

use crate::domain::types::{ConnectionId, ConversationId, EngineId, MessageText, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a prior turn in the conversation history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior-turn message supplied with a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

impl HistoryMessage {
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

/// Raw inbound chat frame as sent by existing clients
///
/// Field names follow the client wire format; values are validated when
/// converted into a [`ChatRequest`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundChatFrame {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "engine")]
    pub engine_type: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub enable_search: bool,
}

impl InboundChatFrame {
    /// Parse one text frame; anything that is not a JSON object of this shape is rejected
    pub fn from_json(text: &str) -> Result<Self, RequestValidationError> {
        serde_json::from_str(text).map_err(|e| RequestValidationError::new("frame", e))
    }
}

/// Reason a request was rejected before a turn could start
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field `{field}`: {reason}")]
pub struct RequestValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl RequestValidationError {
    pub fn new(field: &'static str, reason: impl ToString) -> Self {
        Self {
            field,
            reason: reason.to_string(),
        }
    }
}

/// A validated chat request bound to one connection
///
/// Immutable once built; the relay only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub connection_id: ConnectionId,
    pub message: MessageText,
    pub engine_id: EngineId,
    pub conversation_id: Option<ConversationId>,
    pub history: Vec<HistoryMessage>,
    pub user_id: Option<UserId>,
    pub enable_search: bool,
}

impl ChatRequest {
    pub fn new(connection_id: ConnectionId, message: MessageText, engine_id: EngineId) -> Self {
        Self {
            connection_id,
            message,
            engine_id,
            conversation_id: None,
            history: Vec::new(),
            user_id: None,
            enable_search: false,
        }
    }

    pub fn with_conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_search(mut self, enable_search: bool) -> Self {
        self.enable_search = enable_search;
        self
    }

    /// Validate an inbound frame received on `connection_id`
    pub fn from_frame(
        connection_id: ConnectionId,
        frame: InboundChatFrame,
    ) -> Result<Self, RequestValidationError> {
        let message = frame
            .message
            .ok_or_else(|| RequestValidationError::new("message", "missing"))
            .and_then(|m| {
                MessageText::try_new(m).map_err(|e| RequestValidationError::new("message", e))
            })?;

        let engine_id = frame
            .engine_type
            .ok_or_else(|| RequestValidationError::new("engineType", "missing"))
            .and_then(|e| {
                EngineId::try_new(e).map_err(|e| RequestValidationError::new("engineType", e))
            })?;

        let conversation_id = frame
            .conversation_id
            .filter(|c| !c.trim().is_empty())
            .map(ConversationId::try_new)
            .transpose()
            .map_err(|e| RequestValidationError::new("conversationId", e))?;

        let user_id = frame
            .user_id
            .filter(|u| !u.trim().is_empty())
            .map(UserId::try_new)
            .transpose()
            .map_err(|e| RequestValidationError::new("userId", e))?;

        Ok(Self {
            connection_id,
            message,
            engine_id,
            conversation_id,
            history: frame.history,
            user_id,
            enable_search: frame.enable_search,
        })
    }
}

/// Descriptor of a reference file attached to an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub name: String,
    pub content_ref: String,
}

/// Per-engine configuration resolved through the prompt cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub engine_id: EngineId,
    pub instructions: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<ReferenceFile>,
}

impl EngineConfig {
    pub fn new(engine_id: EngineId, instructions: impl Into<String>) -> Self {
        Self {
            engine_id,
            instructions: instructions.into(),
            description: String::new(),
            files: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, content_ref: impl Into<String>) -> Self {
        self.files.push(ReferenceFile {
            name: name.into(),
            content_ref: content_ref.into(),
        });
        self
    }
}

//! Completion provider abstraction
//!
//! A provider turns one [`CompletionRequest`] into a [`CompletionStream`]:
//! a single-pass sequence of text fragments that ends with the usage
//! summary. Provider-specific wire shapes are normalized into
//! [`ProviderEvent`]s before they reach the stream.

pub mod bedrock;
pub mod constants;
pub mod stream;

pub use stream::{CompletionStream, StreamEvent, StreamFragment};

use crate::domain::usage::UsageError;
use crate::domain::{ChatRequest, EngineConfig, HistoryMessage, Role, UsageSummary};
use async_trait::async_trait;
use constants::prompts;
use nutype::nutype;

/// Provider identifier newtype for type safety
#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, regex = r"^[a-z][a-z0-9-]*$"),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)
)]
pub struct ProviderId(String);

impl ProviderId {
    pub const BEDROCK: &'static str = "bedrock";
    pub const SCRIPTED: &'static str = "scripted";

    pub fn bedrock() -> Self {
        Self::try_new(Self::BEDROCK.to_string()).expect("constant provider id is valid")
    }

    pub fn scripted() -> Self {
        Self::try_new(Self::SCRIPTED.to_string()).expect("constant provider id is valid")
    }
}

/// Normalized provider output before ordinals are assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Incremental text
    Delta(String),
    /// Terminal event carrying the token usage
    Completed(UsageSummary),
}

/// Everything the adapter needs for one streaming call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub message: String,
    pub history: Vec<HistoryMessage>,
    pub enable_search: bool,
}

impl CompletionRequest {
    /// Build the provider call for one turn from the request and its engine
    pub fn for_turn(request: &ChatRequest, engine: &EngineConfig) -> Self {
        Self {
            system_prompt: compose_system_prompt(engine),
            message: request.message.as_ref().to_string(),
            history: request.history.clone(),
            enable_search: request.enable_search,
        }
    }

    /// System prompt as sent upstream, with the search directive when enabled
    pub fn effective_system_prompt(&self) -> String {
        if self.enable_search {
            format!("{}\n\n{}", self.system_prompt, prompts::SEARCH_DIRECTIVE)
                .trim_start()
                .to_string()
        } else {
            self.system_prompt.clone()
        }
    }

    /// History plus the new user message, shaped for providers that require
    /// strictly alternating roles starting with the user
    pub fn conversation(&self) -> Vec<HistoryMessage> {
        let mut turns: Vec<HistoryMessage> = Vec::with_capacity(self.history.len() + 1);

        let incoming = self
            .history
            .iter()
            .cloned()
            .chain(std::iter::once(HistoryMessage::user(self.message.clone())));

        for message in incoming {
            if message.content.trim().is_empty() {
                continue;
            }
            if turns.is_empty() && message.role == Role::Assistant {
                continue;
            }
            match turns.last_mut() {
                Some(last) if last.role == message.role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&message.content);
                }
                _ => turns.push(message),
            }
        }

        turns
    }
}

/// Engine instructions followed by the attached reference material
pub fn compose_system_prompt(engine: &EngineConfig) -> String {
    if engine.files.is_empty() {
        return engine.instructions.clone();
    }

    let listing = engine
        .files
        .iter()
        .map(|file| format!("- {} ({})", file.name, file.content_ref))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n{}\n{}",
        engine.instructions,
        prompts::REFERENCE_FILES_HEADING,
        listing
    )
}

/// Streaming completion provider
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider identifier used in logs
    fn id(&self) -> ProviderId;

    /// Start a streaming completion; the returned stream is single-pass
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, ProviderError>;
}

/// Provider-specific error type
///
/// Every variant keeps the raw provider message so it can be reported to
/// the client unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider rate limited: {0}")]
    RateLimited(String),

    #[error("Provider authentication error: {0}")]
    Authentication(String),

    #[error("Provider rejected request: {0}")]
    InvalidRequest(String),

    #[error("Provider error: {0}")]
    Upstream(String),

    #[error("Malformed provider event: {0}")]
    MalformedEvent(String),

    #[error("Provider stream ended before reporting usage")]
    StreamEndedEarly,

    #[error("Invalid usage reported by provider: {0}")]
    InvalidUsage(#[from] UsageError),
}

impl ProviderError {
    /// The provider's own message, without our prefix
    pub fn raw_message(&self) -> String {
        match self {
            ProviderError::RateLimited(msg)
            | ProviderError::Authentication(msg)
            | ProviderError::InvalidRequest(msg)
            | ProviderError::Upstream(msg)
            | ProviderError::MalformedEvent(msg) => msg.clone(),
            ProviderError::StreamEndedEarly => self.to_string(),
            ProviderError::InvalidUsage(err) => err.to_string(),
        }
    }
}

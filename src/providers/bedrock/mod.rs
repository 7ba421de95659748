//! AWS Bedrock completion provider
//!
//! Two streaming shapes are supported and selected by configuration:
//!
//! - Converse stream: message-based API, usage arrives on the metadata event
//! - InvokeModelWithResponseStream: Anthropic chunk events, usage folded
//!   from `message_start`, `message_delta` and the invocation metrics
//!
//! Both are normalized into the same [`CompletionStream`].

mod converse;
pub mod events;
mod invoke;
pub mod types;

pub use types::{AwsRegion, BedrockSettings, ModelId};

use crate::domain::config_types::ProviderApi;
use crate::providers::{
    CompletionProvider, CompletionRequest, CompletionStream, ProviderError, ProviderId,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::config::Region;
use aws_sdk_bedrockruntime::Client;
use tracing::instrument;

/// Completion provider backed by the Bedrock runtime SDK
#[derive(Debug, Clone)]
pub struct BedrockCompletionProvider {
    client: Client,
    settings: BedrockSettings,
}

impl BedrockCompletionProvider {
    pub fn new(client: Client, settings: BedrockSettings) -> Self {
        Self { client, settings }
    }

    /// Build a client from the default AWS credential chain for the configured region
    pub async fn from_env(settings: BedrockSettings) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.as_ref().to_string()))
            .load()
            .await;
        Self::new(Client::new(&sdk_config), settings)
    }

    pub fn settings(&self) -> &BedrockSettings {
        &self.settings
    }
}

#[async_trait]
impl CompletionProvider for BedrockCompletionProvider {
    fn id(&self) -> ProviderId {
        ProviderId::bedrock()
    }

    #[instrument(skip_all, fields(model_id = %self.settings.model_id, api = ?self.settings.api))]
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream, ProviderError> {
        match self.settings.api {
            ProviderApi::Converse => converse::stream(&self.client, &self.settings, request).await,
            ProviderApi::InvokeStream => {
                invoke::stream(&self.client, &self.settings, request).await
            }
        }
    }
}

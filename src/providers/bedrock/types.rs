//! Type definitions for the AWS Bedrock provider

use crate::domain::config_types::{MaxTokens, ProviderApi};
use crate::providers::constants::{anthropic, bedrock};
use nutype::nutype;
use serde::{Deserialize, Serialize};

/// AWS region for Bedrock
#[nutype(
    sanitize(trim, lowercase),
    validate(not_empty, regex = r"^[a-z]{2}(-[a-z]+)+-\d{1}$"),
    derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct AwsRegion(String);

impl Default for AwsRegion {
    fn default() -> Self {
        Self::try_new(bedrock::DEFAULT_REGION.to_string()).expect("Default region is valid")
    }
}

/// Model ID or inference profile ARN as used by Bedrock
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 2048),
    derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct ModelId(String);

impl Default for ModelId {
    fn default() -> Self {
        Self::try_new(bedrock::DEFAULT_MODEL_ID.to_string()).expect("Default model id is valid")
    }
}

/// Everything the Bedrock adapter needs besides the SDK client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedrockSettings {
    pub region: AwsRegion,
    pub model_id: ModelId,
    pub max_tokens: MaxTokens,
    pub api: ProviderApi,
    pub anthropic_version: String,
}

impl Default for BedrockSettings {
    fn default() -> Self {
        Self {
            region: AwsRegion::default(),
            model_id: ModelId::default(),
            max_tokens: MaxTokens::default(),
            api: ProviderApi::default(),
            anthropic_version: anthropic::DEFAULT_VERSION.to_string(),
        }
    }
}

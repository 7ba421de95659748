//! Converse stream API

use crate::domain::{HistoryMessage, Role};
use crate::providers::bedrock::events::{classify_service_error, converse_usage};
use crate::providers::bedrock::types::BedrockSettings;
use crate::providers::{CompletionRequest, CompletionStream, ProviderError, ProviderEvent};
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ContentBlockDelta, ConversationRole, ConverseStreamOutput,
    InferenceConfiguration, Message, SystemContentBlock,
};
use aws_sdk_bedrockruntime::Client;
use futures_util::stream;
use tracing::debug;

fn to_sdk_message(message: HistoryMessage) -> Result<Message, ProviderError> {
    let role = match message.role {
        Role::User => ConversationRole::User,
        Role::Assistant => ConversationRole::Assistant,
    };

    Message::builder()
        .role(role)
        .content(ContentBlock::Text(message.content))
        .build()
        .map_err(|e| ProviderError::InvalidRequest(e.to_string()))
}

/// Normalize one Converse stream event; `Ok(None)` for events without text or usage
fn decode_event(event: &ConverseStreamOutput) -> Result<Option<ProviderEvent>, ProviderError> {
    match event {
        ConverseStreamOutput::ContentBlockDelta(block) => match block.delta() {
            Some(ContentBlockDelta::Text(text)) => Ok(Some(ProviderEvent::Delta(text.clone()))),
            _ => Ok(None),
        },
        ConverseStreamOutput::Metadata(metadata) => {
            let usage = metadata.usage().ok_or_else(|| {
                ProviderError::MalformedEvent("metadata event without usage".to_string())
            })?;
            let summary = converse_usage(
                usage.input_tokens(),
                usage.output_tokens(),
                usage.cache_read_input_tokens(),
                usage.cache_write_input_tokens(),
            )?;
            Ok(Some(ProviderEvent::Completed(summary)))
        }
        _ => Ok(None),
    }
}

/// Start a Converse stream and adapt its event receiver
pub(crate) async fn stream(
    client: &Client,
    settings: &BedrockSettings,
    request: CompletionRequest,
) -> Result<CompletionStream, ProviderError> {
    let messages = request
        .conversation()
        .into_iter()
        .map(to_sdk_message)
        .collect::<Result<Vec<_>, _>>()?;

    let mut call = client
        .converse_stream()
        .model_id(settings.model_id.as_ref())
        .set_messages(Some(messages))
        .inference_config(
            InferenceConfiguration::builder()
                .max_tokens(settings.max_tokens.into_inner())
                .build(),
        );

    let system_prompt = request.effective_system_prompt();
    if !system_prompt.is_empty() {
        call = call.system(SystemContentBlock::Text(system_prompt));
    }

    let output = call.send().await.map_err(|e| {
        let code = e.as_service_error().and_then(|se| se.code()).map(str::to_string);
        classify_service_error(code.as_deref(), DisplayErrorContext(&e).to_string())
    })?;
    debug!(model_id = %settings.model_id, "converse stream opened");

    let events = stream::unfold(Some(output.stream), |receiver| async move {
        let mut receiver = receiver?;
        loop {
            match receiver.recv().await {
                Ok(Some(event)) => match decode_event(&event) {
                    Ok(Some(decoded)) => return Some((Ok(decoded), Some(receiver))),
                    Ok(None) => continue,
                    Err(error) => return Some((Err(error), None)),
                },
                Ok(None) => return None,
                Err(e) => {
                    let code = e.as_service_error().and_then(|se| se.code()).map(str::to_string);
                    let message = DisplayErrorContext(&e).to_string();
                    let error = classify_service_error(code.as_deref(), message);
                    return Some((Err(error), None));
                }
            }
        }
    });

    Ok(CompletionStream::new(events))
}

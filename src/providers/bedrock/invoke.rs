//! InvokeModelWithResponseStream carrying Anthropic messages

use crate::providers::bedrock::events::{classify_service_error, AnthropicChunkDecoder};
use crate::providers::bedrock::types::BedrockSettings;
use crate::providers::constants::http::content_types;
use crate::providers::{CompletionRequest, CompletionStream, ProviderError};
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::ResponseStream;
use aws_sdk_bedrockruntime::Client;
use futures_util::stream;
use serde_json::{json, Value};
use tracing::debug;

/// Anthropic messages body for Bedrock
pub(crate) fn request_body(settings: &BedrockSettings, request: &CompletionRequest) -> Value {
    let messages: Vec<Value> = request
        .conversation()
        .into_iter()
        .map(|message| json!({ "role": message.role, "content": message.content }))
        .collect();

    let mut body = json!({
        "anthropic_version": settings.anthropic_version,
        "max_tokens": settings.max_tokens.into_inner(),
        "messages": messages,
    });

    let system_prompt = request.effective_system_prompt();
    if !system_prompt.is_empty() {
        body["system"] = Value::String(system_prompt);
    }

    body
}

pub(crate) async fn stream(
    client: &Client,
    settings: &BedrockSettings,
    request: CompletionRequest,
) -> Result<CompletionStream, ProviderError> {
    let body = serde_json::to_vec(&request_body(settings, &request))
        .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;

    let output = client
        .invoke_model_with_response_stream()
        .model_id(settings.model_id.as_ref())
        .content_type(content_types::APPLICATION_JSON)
        .accept(content_types::APPLICATION_JSON)
        .body(Blob::new(body))
        .send()
        .await
        .map_err(|e| {
            let code = e.as_service_error().and_then(|se| se.code()).map(str::to_string);
            classify_service_error(code.as_deref(), DisplayErrorContext(&e).to_string())
        })?;
    debug!(model_id = %settings.model_id, "invoke stream opened");

    let state = Some((output.body, AnthropicChunkDecoder::new()));
    let events = stream::unfold(state, |state| async move {
        let (mut receiver, mut decoder) = state?;
        loop {
            match receiver.recv().await {
                Ok(Some(ResponseStream::Chunk(part))) => {
                    let Some(bytes) = part.bytes() else {
                        continue;
                    };
                    match decoder.decode(bytes.as_ref()) {
                        Ok(Some(event)) => return Some((Ok(event), Some((receiver, decoder)))),
                        Ok(None) => continue,
                        Err(error) => return Some((Err(error), None)),
                    }
                }
                Ok(Some(_)) => continue,
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

//! Decoding of Bedrock stream payloads into provider events
//!
//! Kept free of network I/O so the wire handling can be tested with
//! captured payloads.

use crate::domain::UsageSummary;
use crate::providers::constants::{anthropic::error_types, bedrock::error_codes};
use crate::providers::{ProviderError, ProviderEvent};
use serde::Deserialize;

/// Map a Bedrock service error code onto our error variants
pub fn classify_service_error(code: Option<&str>, message: String) -> ProviderError {
    match code {
        Some(error_codes::THROTTLING) | Some(error_codes::SERVICE_UNAVAILABLE) => {
            ProviderError::RateLimited(message)
        }
        Some(error_codes::ACCESS_DENIED) | Some(error_codes::UNRECOGNIZED_CLIENT) => {
            ProviderError::Authentication(message)
        }
        Some(error_codes::VALIDATION) => ProviderError::InvalidRequest(message),
        _ => ProviderError::Upstream(message),
    }
}

/// Usage from the Converse metadata event; Bedrock reports counts as `i32`
pub fn converse_usage(
    input_tokens: i32,
    output_tokens: i32,
    cache_read_tokens: Option<i32>,
    cache_write_tokens: Option<i32>,
) -> Result<UsageSummary, ProviderError> {
    Ok(UsageSummary::from_signed(
        i64::from(input_tokens),
        i64::from(output_tokens),
        i64::from(cache_write_tokens.unwrap_or(0)),
        i64::from(cache_read_tokens.unwrap_or(0)),
    )?)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicEvent {
    MessageStart {
        message: MessageStartBody,
    },
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    MessageStop {
        #[serde(rename = "amazon-bedrock-invocationMetrics", default)]
        invocation_metrics: Option<InvocationMetrics>,
    },
    Error {
        error: AnthropicErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageStartBody {
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnthropicUsage {
    input_tokens: Option<i64>,
    output_tokens: Option<i64>,
    cache_creation_input_tokens: Option<i64>,
    cache_read_input_tokens: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InvocationMetrics {
    input_token_count: Option<i64>,
    output_token_count: Option<i64>,
    cache_read_input_token_count: Option<i64>,
    cache_write_input_token_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Running usage totals; later reports override earlier ones per field
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct UsageAccumulator {
    input: Option<i64>,
    output: Option<i64>,
    cache_write: Option<i64>,
    cache_read: Option<i64>,
}

impl UsageAccumulator {
    fn merge(&mut self, usage: &AnthropicUsage) {
        self.input = usage.input_tokens.or(self.input);
        self.output = usage.output_tokens.or(self.output);
        self.cache_write = usage.cache_creation_input_tokens.or(self.cache_write);
        self.cache_read = usage.cache_read_input_tokens.or(self.cache_read);
    }

    fn merge_metrics(&mut self, metrics: &InvocationMetrics) {
        self.input = metrics.input_token_count.or(self.input);
        self.output = metrics.output_token_count.or(self.output);
        self.cache_write = metrics.cache_write_input_token_count.or(self.cache_write);
        self.cache_read = metrics.cache_read_input_token_count.or(self.cache_read);
    }

    fn summary(&self) -> Result<UsageSummary, ProviderError> {
        Ok(UsageSummary::from_signed(
            self.input.unwrap_or(0),
            self.output.unwrap_or(0),
            self.cache_write.unwrap_or(0),
            self.cache_read.unwrap_or(0),
        )?)
    }
}

/// Stateful decoder for the Anthropic chunk events carried by
/// InvokeModelWithResponseStream
///
/// Usage is spread over `message_start`, `message_delta` and the Bedrock
/// invocation metrics on `message_stop`; the decoder folds them together
/// and emits [`ProviderEvent::Completed`] on `message_stop`.
#[derive(Debug, Default)]
pub struct AnthropicChunkDecoder {
    usage: UsageAccumulator,
}

impl AnthropicChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk payload; `Ok(None)` for events that carry nothing for us
    pub fn decode(&mut self, payload: &[u8]) -> Result<Option<ProviderEvent>, ProviderError> {
        let event: AnthropicEvent = serde_json::from_slice(payload)
            .map_err(|e| ProviderError::MalformedEvent(e.to_string()))?;

        match event {
            AnthropicEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.usage.merge(&usage);
                }
                Ok(None)
            }
            AnthropicEvent::ContentBlockDelta {
                delta: BlockDelta::TextDelta { text },
            } => Ok(Some(ProviderEvent::Delta(text))),
            AnthropicEvent::ContentBlockDelta { .. } => Ok(None),
            AnthropicEvent::MessageDelta { usage } => {
                if let Some(usage) = usage {
                    self.usage.merge(&usage);
                }
                Ok(None)
            }
            AnthropicEvent::MessageStop { invocation_metrics } => {
                if let Some(metrics) = invocation_metrics {
                    self.usage.merge_metrics(&metrics);
                }
                Ok(Some(ProviderEvent::Completed(self.usage.summary()?)))
            }
            AnthropicEvent::Error { error } => Err(classify_anthropic_error(error)),
            AnthropicEvent::Other => Ok(None),
        }
    }
}

fn classify_anthropic_error(error: AnthropicErrorBody) -> ProviderError {
    match error.kind.as_str() {
        error_types::OVERLOADED | error_types::RATE_LIMIT => {
            ProviderError::RateLimited(error.message)
        }
        error_types::AUTHENTICATION | error_types::PERMISSION => {
            ProviderError::Authentication(error.message)
        }
        error_types::INVALID_REQUEST => ProviderError::InvalidRequest(error.message),
        _ => ProviderError::Upstream(error.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::usage::{TokenCategory, UsageError};
    use rstest::rstest;

    fn decode_all(decoder: &mut AnthropicChunkDecoder, chunks: &[&str]) -> Vec<ProviderEvent> {
        chunks
            .iter()
            .filter_map(|chunk| decoder.decode(chunk.as_bytes()).unwrap())
            .collect()
    }

    #[test]
    fn test_full_anthropic_stream_yields_text_then_usage() {
        let mut decoder = AnthropicChunkDecoder::new();
        let events = decode_all(
            &mut decoder,
            &[
                r#"{"type":"message_start","message":{"id":"msg_1","role":"assistant","usage":{"input_tokens":10,"output_tokens":1,"cache_creation_input_tokens":1000,"cache_read_input_tokens":2000}}}"#,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hel"}}"#,
                r#"{"type":"ping"}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"lo"}}"#,
                r#"{"type":"content_block_stop","index":0}"#,
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":5}}"#,
                r#"{"type":"message_stop"}"#,
            ],
        );

        assert_eq!(
            events,
            vec![
                ProviderEvent::Delta("Hel".to_string()),
                ProviderEvent::Delta("lo".to_string()),
                ProviderEvent::Completed(UsageSummary::new(10, 5, 1000, 2000)),
            ]
        );
    }

    #[test]
    fn test_invocation_metrics_override_streamed_usage() {
        let mut decoder = AnthropicChunkDecoder::new();
        let events = decode_all(
            &mut decoder,
            &[
                r#"{"type":"message_start","message":{"usage":{"input_tokens":7,"output_tokens":1}}}"#,
                r#"{"type":"message_stop","amazon-bedrock-invocationMetrics":{"inputTokenCount":12,"outputTokenCount":30,"invocationLatency":812,"firstByteLatency":301}}"#,
            ],
        );

        assert_eq!(
            events,
            vec![ProviderEvent::Completed(UsageSummary::new(12, 30, 0, 0))]
        );
    }

    #[test]
    fn test_non_text_deltas_are_ignored() {
        let mut decoder = AnthropicChunkDecoder::new();
        let chunk = br#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"q\":"}}"#;
        let event = decoder.decode(chunk).unwrap();
        assert_eq!(event, None);
    }

    #[rstest]
    #[case("overloaded_error", ProviderError::RateLimited("Overloaded".to_string()))]
    #[case("rate_limit_error", ProviderError::RateLimited("Overloaded".to_string()))]
    #[case("permission_error", ProviderError::Authentication("Overloaded".to_string()))]
    #[case("invalid_request_error", ProviderError::InvalidRequest("Overloaded".to_string()))]
    #[case("api_error", ProviderError::Upstream("Overloaded".to_string()))]
    fn test_error_events_keep_the_raw_message(#[case] kind: &str, #[case] expected: ProviderError) {
        let mut decoder = AnthropicChunkDecoder::new();
        let payload =
            format!(r#"{{"type":"error","error":{{"type":"{kind}","message":"Overloaded"}}}}"#);

        assert_eq!(decoder.decode(payload.as_bytes()).unwrap_err(), expected);
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let mut decoder = AnthropicChunkDecoder::new();
        assert!(matches!(
            decoder.decode(b"{not json"),
            Err(ProviderError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_negative_usage_is_rejected() {
        let mut decoder = AnthropicChunkDecoder::new();
        decoder
            .decode(br#"{"type":"message_start","message":{"usage":{"input_tokens":-3}}}"#)
            .unwrap();

        let error = decoder.decode(br#"{"type":"message_stop"}"#).unwrap_err();
        assert_eq!(
            error,
            ProviderError::InvalidUsage(UsageError::NegativeTokens {
                category: TokenCategory::Input,
                value: -3
            })
        );
    }

    #[rstest]
    #[case(Some("ThrottlingException"), ProviderError::RateLimited("m".to_string()))]
    #[case(Some("AccessDeniedException"), ProviderError::Authentication("m".to_string()))]
    #[case(Some("ValidationException"), ProviderError::InvalidRequest("m".to_string()))]
    #[case(Some("ModelStreamErrorException"), ProviderError::Upstream("m".to_string()))]
    #[case(None, ProviderError::Upstream("m".to_string()))]
    fn test_service_error_classification(
        #[case] code: Option<&str>,
        #[case] expected: ProviderError,
    ) {
        assert_eq!(classify_service_error(code, "m".to_string()), expected);
    }

    #[test]
    fn test_converse_usage_defaults_missing_cache_counts_to_zero() {
        assert_eq!(
            converse_usage(10, 5, None, Some(1000)).unwrap(),
            UsageSummary::new(10, 5, 1000, 0)
        );
        assert!(converse_usage(-1, 5, None, None).is_err());
    }
}

//! Relay session: one chat turn from request to `chat_end`
//!
//! ```text
//! Idle -> Starting -> Streaming -> Finalizing -> Done
//!            |            |            |
//!            +------------+------------+--> Failed
//! ```
//!
//! `ai_start` goes out before any provider work. Fragments are forwarded in
//! ordinal order as they arrive; any failed send aborts the turn and no
//! further fragments are sent. The accumulated text is citation-formatted
//! for the usage record only and is never resent.

use crate::cache::PromptCache;
use crate::domain::citations::format_citations;
use crate::domain::{ChatRequest, ConnectionId, Cost, InboundChatFrame, PriceTable, UsageSummary};
use crate::infrastructure::log_messages::{relay as log_msg, usage as usage_log};
use crate::providers::{CompletionProvider, CompletionRequest, ProviderError, StreamEvent};
use crate::relay::connection::{ConnectionSink, DeliveryError};
use crate::relay::error::{RelayError, TurnStage};
use crate::relay::messages::OutboundMessage;
use crate::relay::usage_tracker::{UsageRecord, UsageTracker};
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TurnState {
    Idle,
    Starting,
    Streaming,
    Finalizing,
    Done,
    Failed,
}

impl TurnState {
    /// Whether `next` is a legal successor of `self`
    pub fn allows(self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Idle, Failed)
                | (Starting, Streaming)
                | (Starting, Failed)
                | (Streaming, Finalizing)
                | (Streaming, Failed)
                | (Finalizing, Done)
                | (Finalizing, Failed)
        )
    }
}

/// Bounded waits and payload options for a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    pub cache_fetch_timeout: Duration,
    /// Covers opening the provider stream and waiting for its first event
    pub first_fragment_timeout: Duration,
    pub fragment_timeout: Duration,
    pub send_timeout: Duration,
    pub include_cost_in_chat_end: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            cache_fetch_timeout: Duration::from_millis(5_000),
            first_fragment_timeout: Duration::from_millis(60_000),
            fragment_timeout: Duration::from_millis(30_000),
            send_timeout: Duration::from_millis(5_000),
            include_cost_in_chat_end: false,
        }
    }
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    pub total_chunks: u32,
    pub usage: UsageSummary,
    pub cost: Cost,
    pub formatted_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed(TurnSummary),
    Failed {
        /// State the turn was in when it failed
        state: TurnState,
        error: RelayError,
        fragments_sent: u32,
    },
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed(_))
    }

    pub fn final_state(&self) -> TurnState {
        match self {
            TurnOutcome::Completed(_) => TurnState::Done,
            TurnOutcome::Failed { .. } => TurnState::Failed,
        }
    }

    pub fn error(&self) -> Option<&RelayError> {
        match self {
            TurnOutcome::Completed(_) => None,
            TurnOutcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn summary(&self) -> Option<&TurnSummary> {
        match self {
            TurnOutcome::Completed(summary) => Some(summary),
            TurnOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug)]
struct TurnProgress {
    state: TurnState,
    fragments_sent: u32,
}

impl TurnProgress {
    fn new() -> Self {
        Self {
            state: TurnState::Idle,
            fragments_sent: 0,
        }
    }

    fn advance(&mut self, next: TurnState) {
        debug_assert!(self.state.allows(next), "{} -> {}", self.state, next);
        debug!(from = %self.state, to = %next, "{}", log_msg::STATE_CHANGED);
        self.state = next;
    }
}

/// Runs chat turns against the shared cache, the provider and the connection sink
///
/// One instance serves every connection; each turn runs in its caller's task.
pub struct RelayService {
    cache: Arc<PromptCache>,
    provider: Arc<dyn CompletionProvider>,
    sink: Arc<dyn ConnectionSink>,
    usage_tracker: Arc<dyn UsageTracker>,
    prices: PriceTable,
    settings: RelaySettings,
}

impl RelayService {
    pub fn new(
        cache: Arc<PromptCache>,
        provider: Arc<dyn CompletionProvider>,
        sink: Arc<dyn ConnectionSink>,
        usage_tracker: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            cache,
            provider,
            sink,
            usage_tracker,
            prices: PriceTable::standard(),
            settings: RelaySettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RelaySettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn cache(&self) -> &Arc<PromptCache> {
        &self.cache
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Validate a raw inbound frame and run it as a turn
    ///
    /// A frame that fails validation never reaches `Starting`: the client
    /// gets one `error` message and the provider is not called.
    pub async fn handle_frame(&self, connection_id: ConnectionId, frame: &str) -> TurnOutcome {
        let request = InboundChatFrame::from_json(frame)
            .and_then(|frame| ChatRequest::from_frame(connection_id.clone(), frame));

        match request {
            Ok(request) => self.handle_turn(request).await,
            Err(validation) => {
                let error = RelayError::from(validation);
                warn!(
                    connection_id = %connection_id,
                    error = %error,
                    "{}",
                    log_msg::MALFORMED_FRAME
                );
                self.notify_failure(&connection_id, &error).await;
                TurnOutcome::Failed {
                    state: TurnState::Idle,
                    error,
                    fragments_sent: 0,
                }
            }
        }
    }

    /// Run one turn to `Done` or `Failed`
    #[instrument(
        skip_all,
        fields(
            connection_id = %request.connection_id,
            engine_id = %request.engine_id,
            provider = %self.provider.id()
        )
    )]
    pub async fn handle_turn(&self, request: ChatRequest) -> TurnOutcome {
        debug!("{}", log_msg::TURN_STARTED);
        let mut progress = TurnProgress::new();

        match self.run_turn(&request, &mut progress).await {
            Ok(summary) => {
                info!(
                    total_chunks = summary.total_chunks,
                    cost = %summary.cost,
                    "{}",
                    log_msg::TURN_COMPLETED
                );
                TurnOutcome::Completed(summary)
            }
            Err(failure) => {
                match &failure {
                    RelayError::Provider(_) | RelayError::ConfigStore(_) => error!(
                        state = %progress.state,
                        kind = failure.kind(),
                        fragments_sent = progress.fragments_sent,
                        error = %failure,
                        "{}",
                        log_msg::TURN_FAILED
                    ),
                    _ => warn!(
                        state = %progress.state,
                        kind = failure.kind(),
                        fragments_sent = progress.fragments_sent,
                        error = %failure,
                        "{}",
                        log_msg::TURN_FAILED
                    ),
                }

                if failure.can_notify() {
                    self.notify_failure(&request.connection_id, &failure).await;
                }

                let state = progress.state;
                progress.advance(TurnState::Failed);
                TurnOutcome::Failed {
                    state,
                    error: failure,
                    fragments_sent: progress.fragments_sent,
                }
            }
        }
    }

    async fn run_turn(
        &self,
        request: &ChatRequest,
        progress: &mut TurnProgress,
    ) -> Result<TurnSummary, RelayError> {
        let connection_id = &request.connection_id;

        progress.advance(TurnState::Starting);
        self.deliver(connection_id, &OutboundMessage::ai_start())
            .await?;

        let engine = timeout(
            self.settings.cache_fetch_timeout,
            self.cache.get(&request.engine_id),
        )
        .await
        .map_err(|_| RelayError::Timeout {
            stage: TurnStage::CacheFetch,
        })??;

        let completion = CompletionRequest::for_turn(request, &engine);
        let first_event_deadline = Instant::now() + self.settings.first_fragment_timeout;
        let mut stream = timeout_at(first_event_deadline, self.provider.stream(completion))
            .await
        .map_err(|_| RelayError::Timeout {
            stage: TurnStage::ProviderStream,
        })??;

        progress.advance(TurnState::Streaming);
        let mut text = String::new();

        let usage = loop {
            let deadline = if stream.fragments_emitted() == 0 {
                first_event_deadline
            } else {
                Instant::now() + self.settings.fragment_timeout
            };

            let event = timeout_at(deadline, stream.next())
                .await
                .map_err(|_| RelayError::Timeout {
                    stage: TurnStage::ProviderStream,
                })?;

            match event {
                Some(Ok(StreamEvent::Fragment(fragment))) => {
                    self.deliver(
                        connection_id,
                        &OutboundMessage::ai_chunk(fragment.text.as_str(), fragment.index),
                    )
                    .await?;
                    text.push_str(&fragment.text);
                    progress.fragments_sent += 1;
                }
                Some(Ok(StreamEvent::Finished(usage))) => break usage,
                Some(Err(provider_error)) => return Err(provider_error.into()),
                None => return Err(ProviderError::StreamEndedEarly.into()),
            }
        };

        progress.advance(TurnState::Finalizing);
        let formatted_text = format_citations(&text);
        let cost = self.prices.cost(&usage);

        let record = UsageRecord {
            user_id: request.user_id.clone(),
            engine_id: request.engine_id.clone(),
            conversation_id: request.conversation_id.clone(),
            input_text_len: request.message.as_ref().chars().count(),
            output_text_len: formatted_text.chars().count(),
            usage,
            cost,
            recorded_at: Utc::now(),
        };
        if let Err(tracker_error) = self.usage_tracker.record(&record).await {
            error!(error = %tracker_error, "{}", usage_log::TRACKER_FAILED);
        }

        let chat_end = OutboundMessage::ChatEnd {
            total_chunks: progress.fragments_sent,
            engine: request.engine_id.clone(),
            conversation_id: request.conversation_id.clone(),
            cost: self.settings.include_cost_in_chat_end.then_some(cost),
        };
        self.deliver(connection_id, &chat_end).await?;
        progress.advance(TurnState::Done);

        Ok(TurnSummary {
            total_chunks: progress.fragments_sent,
            usage,
            cost,
            formatted_text,
        })
    }

    async fn deliver(
        &self,
        connection_id: &ConnectionId,
        message: &OutboundMessage,
    ) -> Result<(), RelayError> {
        match timeout(self.settings.send_timeout, self.sink.send(connection_id, message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(DeliveryError::Gone)) => Err(RelayError::ConnectionGone(connection_id.clone())),
            Ok(Err(DeliveryError::Transient(reason))) => Err(RelayError::DeliveryFailed {
                connection_id: connection_id.clone(),
                reason,
            }),
            Err(_) => Err(RelayError::Timeout {
                stage: TurnStage::ConnectionSend,
            }),
        }
    }

    /// Single best-effort `error` message; its own failure is only logged
    async fn notify_failure(&self, connection_id: &ConnectionId, failure: &RelayError) {
        let message = OutboundMessage::error(failure.client_message());
        let delivered = timeout(
            self.settings.send_timeout,
            self.sink.send(connection_id, &message),
        )
        .await;

        match delivered {
            Ok(Ok(())) => {}
            Ok(Err(delivery_error)) => {
                debug!(error = %delivery_error, "{}", log_msg::ERROR_NOTIFICATION_DROPPED)
            }
            Err(_) => debug!("{}", log_msg::ERROR_NOTIFICATION_DROPPED),
        }
    }
}

//! Per-turn usage records

use crate::domain::{ConversationId, Cost, EngineId, UsageSummary, UserId};
use crate::infrastructure::log_messages::usage as log_msg;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// One record per completed turn
///
/// `cost` is stored next to the token counts it was computed from so it can
/// always be recomputed and checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub user_id: Option<UserId>,
    pub engine_id: EngineId,
    pub conversation_id: Option<ConversationId>,
    pub input_text_len: usize,
    pub output_text_len: usize,
    pub usage: UsageSummary,
    pub cost: Cost,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageTrackerError {
    #[error("Usage store error: {0}")]
    Store(String),
}

/// Sink for usage records; failures never fail the turn
#[async_trait]
pub trait UsageTracker: Send + Sync {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageTrackerError>;
}

/// Writes each record as a structured log event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUsageTracker;

#[async_trait]
impl UsageTracker for TracingUsageTracker {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageTrackerError> {
        info!(
            user_id = record.user_id.as_ref().map(|u| u.as_ref()),
            engine_id = %record.engine_id,
            conversation_id = record.conversation_id.as_ref().map(|c| c.as_ref()),
            input_text_len = record.input_text_len,
            output_text_len = record.output_text_len,
            input_tokens = record.usage.input_tokens,
            output_tokens = record.usage.output_tokens,
            cache_write_tokens = record.usage.cache_write_tokens,
            cache_read_tokens = record.usage.cache_read_tokens,
            cost = %record.cost,
            "{}",
            log_msg::RECORDED
        );
        Ok(())
    }
}

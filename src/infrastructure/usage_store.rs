//! Usage records persisted to Postgres

use crate::relay::{UsageRecord, UsageTracker, UsageTrackerError};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const INSERT_USAGE: &str = "INSERT INTO usage_records \
    (id, user_id, engine_id, conversation_id, input_text_len, output_text_len, \
     input_tokens, output_tokens, cache_write_tokens, cache_read_tokens, cost_usd, recorded_at) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)";

fn as_bigint<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

#[derive(Debug, Clone)]
pub struct PostgresUsageTracker {
    pool: PgPool,
}

impl PostgresUsageTracker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageTracker for PostgresUsageTracker {
    async fn record(&self, record: &UsageRecord) -> Result<(), UsageTrackerError> {
        sqlx::query(INSERT_USAGE)
            .bind(Uuid::now_v7())
            .bind(record.user_id.as_ref().map(|u| u.as_ref().to_string()))
            .bind(record.engine_id.as_ref())
            .bind(record.conversation_id.as_ref().map(|c| c.as_ref().to_string()))
            .bind(as_bigint(record.input_text_len))
            .bind(as_bigint(record.output_text_len))
            .bind(as_bigint(record.usage.input_tokens))
            .bind(as_bigint(record.usage.output_tokens))
            .bind(as_bigint(record.usage.cache_write_tokens))
            .bind(as_bigint(record.usage.cache_read_tokens))
            .bind(*record.cost.as_ref())
            .bind(record.recorded_at)
            .execute(&self.pool)
            .await
            .map_err(|e| UsageTrackerError::Store(e.to_string()))?;
        Ok(())
    }
}

//! Turn failure taxonomy

use crate::cache::ConfigStoreError;
use crate::domain::{ConnectionId, EngineId, RequestValidationError};
use crate::providers::ProviderError;
use thiserror::Error;

/// Suspension point that can time out during a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TurnStage {
    #[display("configuration fetch")]
    CacheFetch,
    #[display("provider stream")]
    ProviderStream,
    #[display("connection send")]
    ConnectionSend,
}

/// Why a turn ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Engine configuration not found: {0}")]
    ConfigNotFound(EngineId),

    #[error("Configuration store error: {0}")]
    ConfigStore(ConfigStoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Connection {0} is gone")]
    ConnectionGone(ConnectionId),

    #[error("Delivery to connection {connection_id} failed: {reason}")]
    DeliveryFailed {
        connection_id: ConnectionId,
        reason: String,
    },

    #[error("Malformed request: {0}")]
    MalformedRequest(#[from] RequestValidationError),

    #[error("Timed out waiting for {stage}")]
    Timeout { stage: TurnStage },
}

impl From<ConfigStoreError> for RelayError {
    fn from(error: ConfigStoreError) -> Self {
        match error {
            ConfigStoreError::NotFound(engine_id) => RelayError::ConfigNotFound(engine_id),
            other => RelayError::ConfigStore(other),
        }
    }
}

impl RelayError {
    /// Text for the client-facing `error` message
    ///
    /// Provider failures pass the provider's own message through.
    pub fn client_message(&self) -> String {
        match self {
            RelayError::Provider(error) => error.raw_message(),
            other => other.to_string(),
        }
    }

    /// Whether an `error` notification may still be attempted
    pub fn can_notify(&self) -> bool {
        !matches!(self, RelayError::ConnectionGone(_))
    }

    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::ConfigNotFound(_) => "config_not_found",
            RelayError::ConfigStore(_) => "config_store",
            RelayError::Provider(_) => "provider",
            RelayError::ConnectionGone(_) => "connection_gone",
            RelayError::DeliveryFailed { .. } => "delivery_failed",
            RelayError::MalformedRequest(_) => "malformed_request",
            RelayError::Timeout { .. } => "timeout",
        }
    }
}

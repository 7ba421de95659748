//! Relay of one chat turn from provider stream to client connection
//!
//! [`RelayService`] owns the turn state machine. The connection sink, usage
//! tracker and completion provider are injected, so the same service runs
//! behind the WebSocket gateway and inside tests.

pub mod connection;
pub mod error;
pub mod messages;
pub mod session;
pub mod test_support;
pub mod usage_tracker;

pub use connection::{ConnectionRegistry, ConnectionSink, DeliveryError};
pub use error::{RelayError, TurnStage};
pub use messages::OutboundMessage;
pub use session::{RelayService, RelaySettings, TurnOutcome, TurnState, TurnSummary};
pub use usage_tracker::{TracingUsageTracker, UsageRecord, UsageTracker, UsageTrackerError};

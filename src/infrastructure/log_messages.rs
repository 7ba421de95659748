//! Log message constants
//!
//! Centralizes the message text of recurring log events so operators can
//! grep for them and tests can match on them.

/// Application startup and lifecycle messages
pub mod application {
    pub const STARTING: &str = "Starting engine relay";
    pub const STARTED_SUCCESSFULLY: &str = "Engine relay started successfully";
    pub const STARTING_SERVER: &str = "Starting gateway server";
    pub const SHUTTING_DOWN: &str = "Shutdown signal received, draining connections";
    pub const DATABASE_DISABLED: &str = "Database disabled, using configured engines and log-only usage tracking";
}

/// Database-related log messages
pub mod database {
    pub const HEALTH_CHECK_FAILED: &str = "Database health check failed";
    pub const CONNECTION_ESTABLISHED: &str = "Database connection established";
    pub const MIGRATION_STARTED: &str = "Running database migrations";
    pub const MIGRATION_COMPLETED: &str = "Database migrations completed successfully";
}

/// Configuration loading messages
pub mod configuration {
    pub const CONFIG_LOADED: &str = "Configuration loaded successfully";
    pub const ENGINES_LOADED: &str = "Static engine table loaded";
}

/// Relay session messages
pub mod relay {
    pub const TURN_STARTED: &str = "Turn started";
    pub const TURN_COMPLETED: &str = "Turn completed";
    pub const TURN_FAILED: &str = "Turn failed";
    pub const STATE_CHANGED: &str = "Turn state changed";
    pub const ERROR_NOTIFICATION_DROPPED: &str = "Best-effort error notification was not delivered";
    pub const MALFORMED_FRAME: &str = "Rejected malformed chat frame";
}

/// Usage tracking messages
pub mod usage {
    pub const RECORDED: &str = "Usage recorded";
    pub const TRACKER_FAILED: &str = "Usage tracker failed; turn continues";
}

/// WebSocket gateway messages
pub mod gateway {
    pub const CONNECTION_OPENED: &str = "WebSocket connection opened";
    pub const CONNECTION_CLOSED: &str = "WebSocket connection closed";
    pub const SOCKET_WRITE_FAILED: &str = "Failed to write to WebSocket";
    pub const CACHE_CLEARED: &str = "Prompt cache cleared by administrator";
}

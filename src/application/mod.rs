//! Application wiring
//!
//! Builds the configuration store, usage tracker, provider adapter, prompt
//! cache and relay from settings, then serves the gateway.

pub mod app;

pub use app::Application;

//! Engine Relay - streams LLM completions to chat clients
//!
//! A chat turn resolves the engine's cached prompt configuration, opens a
//! streaming completion against the provider and relays each text fragment
//! to the client connection as it arrives, closing with citation-formatted
//! text, token usage and cost.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod infrastructure;
pub mod providers;
pub mod relay;

pub use application::Application;
pub use error::{Error, Result};

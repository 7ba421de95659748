//! Identifier and text newtypes for the relay domain
//!
//! Every value that crosses the wire boundary is wrapped in a validated
//! newtype so malformed input is rejected before a turn starts.

use nutype::nutype;
#[allow(unused_imports)] // These are used by nutype derive macros
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a long-lived client connection
///
/// Limited to 256 characters; gateway-issued ids are UUIDv7 strings but
/// externally addressed connections may use their own scheme.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 256),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Issue a fresh, time-ordered connection id
    pub fn generate() -> Self {
        Self::try_new(Uuid::now_v7().to_string()).expect("UUID strings are never empty")
    }
}

/// Engine identifier selecting a configuration profile (e.g. `T5`)
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 128,
        regex = r"^[A-Za-z0-9][A-Za-z0-9_.:-]*$"
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct EngineId(String);

/// Conversation identifier owned by the external history store
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 256),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct ConversationId(String);

/// User identifier resolved by the external authorization layer
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 256),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct UserId(String);

/// User-supplied message text for one turn
///
/// Limited to 100,000 characters, in line with typical LLM context limits.
/// Whitespace-only messages are rejected.
#[nutype(
    validate(predicate = |s: &str| !s.trim().is_empty() && s.chars().count() <= 100_000),
    derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct MessageText(String);

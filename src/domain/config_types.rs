//! Type-safe configuration types
//!
//! This module provides domain-specific types for configuration values,
//! ensuring validation at boundaries and preventing primitive obsession.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Host address for network services
#[nutype(
    validate(not_empty, len_char_max = 255),
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
pub struct Host(String);

impl Default for Host {
    fn default() -> Self {
        Self::try_new("0.0.0.0".to_string()).expect("Default host is valid")
    }
}

/// Port number for network services
#[nutype(
    validate(predicate = |port| (1..=65535).contains(port)),
    derive(
        Debug,
        Clone,
        Copy,
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
pub struct Port(u16);

impl Default for Port {
    fn default() -> Self {
        Self::try_new(8080).expect("Default port is valid")
    }
}

/// Database password (secured)
#[nutype(validate(not_empty), derive(Clone, Serialize, Deserialize, AsRef))]
pub struct DatabasePassword(String);

impl fmt::Debug for DatabasePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabasePassword(***)")
    }
}

impl fmt::Display for DatabasePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// Maximum number of database connections
#[nutype(
    validate(predicate = |count| *count > 0 && *count <= 1000),
    derive(
        Debug,
        Clone,
        Copy,
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
pub struct MaxConnections(u32);

impl Default for MaxConnections {
    fn default() -> Self {
        Self::try_new(10).expect("Default max connections is valid")
    }
}

/// Prompt cache time-to-live in seconds (at most one day)
#[nutype(
    validate(predicate = |secs| *secs > 0 && *secs <= 86_400),
    derive(
        Debug,
        Clone,
        Copy,
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
pub struct CacheTtlSecs(u64);

impl CacheTtlSecs {
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.into_inner())
    }
}

impl Default for CacheTtlSecs {
    fn default() -> Self {
        Self::try_new(3600).expect("Default cache TTL is valid")
    }
}

/// Bounded wait for one suspension point, in milliseconds (max 10 minutes)
#[nutype(
    validate(predicate = |ms| *ms > 0 && *ms <= 600_000),
    derive(
        Debug,
        Clone,
        Copy,
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
pub struct TimeoutMs(u64);

impl TimeoutMs {
    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.into_inner())
    }
}

/// Completion token cap passed to the provider
#[nutype(
    validate(predicate = |tokens| *tokens > 0 && *tokens <= 200_000),
    derive(
        Debug,
        Clone,
        Copy,
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
pub struct MaxTokens(i32);

impl Default for MaxTokens {
    fn default() -> Self {
        Self::try_new(4096).expect("Default max tokens is valid")
    }
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Invalid log format: {s}")),
        }
    }
}

/// Which Bedrock streaming API the completion adapter drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderApi {
    /// Message-based Converse stream
    #[default]
    Converse,
    /// InvokeModelWithResponseStream carrying Anthropic chunk events
    InvokeStream,
}

impl std::str::FromStr for ProviderApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "converse" => Ok(ProviderApi::Converse),
            "invoke_stream" => Ok(ProviderApi::InvokeStream),
            _ => Err(format!("Invalid provider api: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[test]
    fn test_host_validation() {
        assert!(Host::try_new("localhost".to_string()).is_ok());
        assert!(Host::try_new("0.0.0.0".to_string()).is_ok());
        assert!(Host::try_new("".to_string()).is_err());
        assert!(Host::try_new("a".repeat(256)).is_err());
    }

    #[test]
    fn test_port_validation() {
        assert!(Port::try_new(80).is_ok());
        assert!(Port::try_new(65535).is_ok());
        assert!(Port::try_new(0).is_err());
    }

    #[test]
    fn test_database_password_security() {
        let password = DatabasePassword::try_new("secret123".to_string()).unwrap();
        assert_eq!(format!("{password:?}"), "DatabasePassword(***)");
        assert_eq!(format!("{password}"), "***");
        assert_eq!(password.as_ref(), "secret123");
    }

    #[test]
    fn test_cache_ttl_validation() {
        assert!(CacheTtlSecs::try_new(1).is_ok());
        assert!(CacheTtlSecs::try_new(86_400).is_ok());
        assert!(CacheTtlSecs::try_new(0).is_err());
        assert!(CacheTtlSecs::try_new(86_401).is_err());
        assert_eq!(
            CacheTtlSecs::default().as_duration(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_timeout_validation() {
        assert!(TimeoutMs::try_new(5_000).is_ok());
        assert!(TimeoutMs::try_new(0).is_err());
        assert!(TimeoutMs::try_new(600_001).is_err());
        assert_eq!(
            TimeoutMs::try_new(250).unwrap().as_duration(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_max_tokens_validation() {
        assert!(MaxTokens::try_new(1).is_ok());
        assert!(MaxTokens::try_new(0).is_err());
        assert!(MaxTokens::try_new(-5).is_err());
    }

    #[rstest]
    #[case("info", LogLevel::Info)]
    #[case("INFO", LogLevel::Info)]
    #[case("warning", LogLevel::Warn)]
    #[case("trace", LogLevel::Trace)]
    fn test_log_level_parsing(#[case] raw: &str, #[case] expected: LogLevel) {
        assert_eq!(LogLevel::from_str(raw).unwrap(), expected);
    }

    #[test]
    fn test_invalid_log_settings_are_rejected() {
        assert!(LogLevel::from_str("invalid").is_err());
        assert!(LogFormat::from_str("xml").is_err());
    }

    #[rstest]
    #[case("converse", ProviderApi::Converse)]
    #[case("invoke_stream", ProviderApi::InvokeStream)]
    #[case("invoke-stream", ProviderApi::InvokeStream)]
    fn test_provider_api_parsing(#[case] raw: &str, #[case] expected: ProviderApi) {
        assert_eq!(ProviderApi::from_str(raw).unwrap(), expected);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Host::default().as_ref(), "0.0.0.0");
        assert_eq!(*Port::default().as_ref(), 8080);
        assert_eq!(*MaxConnections::default().as_ref(), 10);
        assert_eq!(*MaxTokens::default().as_ref(), 4096);
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogFormat::default(), LogFormat::Json);
        assert_eq!(ProviderApi::default(), ProviderApi::Converse);
    }
}

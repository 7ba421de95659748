//! Constants for provider interactions
//!
//! Keeps the wire vocabulary of the upstream APIs and the prompt fragments
//! we add in one place.

/// Anthropic-on-Bedrock protocol values
pub mod anthropic {
    pub const DEFAULT_VERSION: &str = "bedrock-2023-05-31";

    /// Error `type` values reported inside `error` events
    pub mod error_types {
        pub const OVERLOADED: &str = "overloaded_error";
        pub const RATE_LIMIT: &str = "rate_limit_error";
        pub const AUTHENTICATION: &str = "authentication_error";
        pub const PERMISSION: &str = "permission_error";
        pub const INVALID_REQUEST: &str = "invalid_request_error";
    }
}

/// Bedrock service error codes
pub mod bedrock {
    pub const DEFAULT_REGION: &str = "us-east-1";
    pub const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-5-sonnet-20240620-v1:0";

    pub mod error_codes {
        pub const THROTTLING: &str = "ThrottlingException";
        pub const SERVICE_UNAVAILABLE: &str = "ServiceUnavailableException";
        pub const ACCESS_DENIED: &str = "AccessDeniedException";
        pub const UNRECOGNIZED_CLIENT: &str = "UnrecognizedClientException";
        pub const VALIDATION: &str = "ValidationException";
    }
}

/// HTTP-related constants
pub mod http {
    pub mod content_types {
        pub const APPLICATION_JSON: &str = "application/json";
    }
}

/// Prompt fragments appended to engine instructions
pub mod prompts {
    pub const REFERENCE_FILES_HEADING: &str = "Reference files:";
    pub const SEARCH_DIRECTIVE: &str = "When you use information from the web, cite every source with its full URL (including https://) inline in your answer.";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_anthropic_version() {
        assert_eq!(anthropic::DEFAULT_VERSION, "bedrock-2023-05-31");
    }

    #[test]
    fn test_search_directive_asks_for_full_urls() {
        assert!(prompts::SEARCH_DIRECTIVE.contains("https://"));
    }
}

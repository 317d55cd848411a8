//! Provider failure taxonomy.
//!
//! Every branch the engine takes on a provider round-trip is enumerated
//! here; recoverable variants reprompt in place while everything else is
//! terminal for the attempt.

use thiserror::Error;

#[derive(Debug, Error)]
/// Normalized authentication-provider errors.
pub enum ProviderError {
    #[error("verification code rejected by provider")]
    InvalidCode,
    #[error("two-factor password rejected by provider")]
    InvalidPassword,
    #[error("authentication flow expired at the provider")]
    FlowExpired,
    #[error("network error: {0}")]
    Network(String),
    #[error("provider fault {code}: {message}")]
    Api { code: String, message: String },
}

impl ProviderError {
    /// Recoverable errors reprompt without leaving the current state;
    /// everything else closes the handle and abandons the attempt.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidCode | Self::InvalidPassword)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

/// Maps a provider fault code onto the taxonomy. Unknown codes stay
/// terminal `Api` faults so new provider failures never reprompt forever.
pub fn classify_provider_fault(code: &str, message: &str) -> ProviderError {
    match code {
        "PHONE_CODE_INVALID" => ProviderError::InvalidCode,
        "PASSWORD_HASH_INVALID" => ProviderError::InvalidPassword,
        "PHONE_CODE_EXPIRED" | "FLOW_TOKEN_EXPIRED" => ProviderError::FlowExpired,
        _ => ProviderError::Api {
            code: code.to_string(),
            message: message.to_string(),
        },
    }
}

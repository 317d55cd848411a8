//! Session and connector seams for the account-authentication provider.

use async_trait::async_trait;

use crate::provider_errors::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of confirming a one-time code: either the account is fully
/// authorized, or the provider requires the two-factor password step.
pub enum CodeOutcome {
    Authorized,
    PasswordRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Durable artifact extracted from an authorized session.
pub struct ProviderArtifact {
    pub payload: String,
    pub account_label: Option<String>,
    pub phone_number: String,
}

/// One in-flight authentication conversation against the provider.
///
/// Call order is `request_code`, then `submit_code` (repeating on
/// `InvalidCode`), then optionally `submit_password` (repeating on
/// `InvalidPassword`), then `finalize` once authorized. `close` must run
/// exactly once per session on every exit path and is safe to call again.
#[async_trait]
pub trait ProviderAuthSession: Send + Sync {
    async fn request_code(&mut self, phone_number: &str) -> Result<(), ProviderError>;

    async fn submit_code(&mut self, code: &str) -> Result<CodeOutcome, ProviderError>;

    async fn submit_password(&mut self, password: &str) -> Result<(), ProviderError>;

    async fn finalize(&mut self) -> Result<ProviderArtifact, ProviderError>;

    async fn close(&mut self);
}

/// Factory opening fresh, unauthenticated provider sessions. No network
/// identity persists across the sessions it produces.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ProviderAuthSession>, ProviderError>;
}

//! Adapter over the external account-authentication provider.
//!
//! One `ProviderAuthSession` instance backs one in-flight conversation:
//! request a one-time code for a phone number, confirm the code, optionally
//! confirm a two-factor password, then export the durable session artifact.
//! The session must be closed exactly once on every exit path; `close` is
//! idempotent so error handling never has to track whether it already ran.
//!
//! Input validation lives here too: malformed phone numbers and codes are
//! rejected locally and never reach the provider.

pub mod provider_errors;
pub mod provider_http;
pub mod provider_input;
pub mod provider_session;

pub use provider_errors::{classify_provider_fault, ProviderError};
pub use provider_http::{HttpProviderConfig, HttpProviderConnector, HttpProviderSession};
pub use provider_input::{normalize_login_code, normalize_phone_number};
pub use provider_session::{CodeOutcome, ProviderArtifact, ProviderAuthSession, ProviderConnector};

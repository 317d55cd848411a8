//! Inbound/outbound event contract between the transport and the engine.
//!
//! The transport is a thin collaborator: it translates whatever the wire
//! carries into [`InboundEvent`] values and delivers [`OutboundMessage`]
//! values through the [`OutboundSink`] seam. The engine never sees
//! transport-specific payloads.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `InboundEventKind` values.
pub enum InboundEventKind {
    Command,
    ButtonPress,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Identity metadata attached when the inbound message forwards another
/// principal's message.
pub struct ForwardedIdentity {
    pub principal_id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// One inbound transport event for one principal.
pub struct InboundEvent {
    pub principal_id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    pub kind: InboundEventKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub forwarded_from: Option<ForwardedIdentity>,
    pub timestamp_ms: u64,
}

impl InboundEvent {
    pub fn command(principal_id: i64, name: &str, timestamp_ms: u64) -> Self {
        Self {
            principal_id,
            display_name: None,
            kind: InboundEventKind::Command,
            text: name.to_string(),
            forwarded_from: None,
            timestamp_ms,
        }
    }

    pub fn button(principal_id: i64, data: &str, timestamp_ms: u64) -> Self {
        Self {
            principal_id,
            display_name: None,
            kind: InboundEventKind::ButtonPress,
            text: data.to_string(),
            forwarded_from: None,
            timestamp_ms,
        }
    }

    pub fn text(principal_id: i64, text: &str, timestamp_ms: u64) -> Self {
        Self {
            principal_id,
            display_name: None,
            kind: InboundEventKind::Text,
            text: text.to_string(),
            forwarded_from: None,
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// One action button offered alongside an outbound reply.
pub struct OutboundAction {
    pub label: String,
    pub data: String,
}

impl OutboundAction {
    pub fn new(label: &str, data: &str) -> Self {
        Self {
            label: label.to_string(),
            data: data.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// One outbound reply addressed to a principal.
pub struct OutboundMessage {
    pub recipient: i64,
    pub text: String,
    #[serde(default)]
    pub actions: Vec<OutboundAction>,
}

/// Delivery seam implemented by the transport. Implementations report
/// failures through the `Result`; the engine logs and never retries.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<()>;
}

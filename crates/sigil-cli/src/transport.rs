//! Thin Bot-API transport: long-poll ingress and the outbound sink.
//!
//! Translates wire updates into engine [`InboundEvent`] values and shapes
//! engine [`OutboundMessage`] values into `sendMessage` payloads with an
//! inline keyboard. Deliberately thin: no retry tuning, no rendering
//! concerns beyond the button list.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use serde_json::{json, Value};

use sigil_core::current_unix_timestamp_ms;
use sigil_engine::{
    ConversationEngine, ForwardedIdentity, InboundEvent, OutboundMessage, OutboundSink,
};

const LONG_POLL_TIMEOUT_S: u64 = 25;

#[derive(Debug, Clone)]
/// Bot transport settings, supplied at startup.
pub struct BotTransportConfig {
    pub api_base: String,
    pub bot_token: String,
    pub poll_interval_ms: u64,
    pub http_timeout_ms: u64,
}

impl BotTransportConfig {
    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }
}

/// Outbound sender over the bot API.
pub struct BotApiSink {
    config: BotTransportConfig,
    client: reqwest::Client,
}

impl BotApiSink {
    pub fn new(config: BotTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .redirect(Policy::none())
            .build()
            .context("failed to build bot transport http client")?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl OutboundSink for BotApiSink {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let mut body = json!({
            "chat_id": message.recipient,
            "text": message.text,
            "disable_web_page_preview": true,
        });
        if !message.actions.is_empty() {
            let keyboard = message
                .actions
                .iter()
                .map(|action| json!([{"text": action.label, "callback_data": action.data}]))
                .collect::<Vec<_>>();
            body["reply_markup"] = json!({"inline_keyboard": keyboard});
        }

        let response = self
            .client
            .post(self.config.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .context("failed to post sendMessage")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!(
                "sendMessage returned status {}: {}",
                status.as_u16(),
                detail.chars().take(200).collect::<String>()
            );
        }
        Ok(())
    }
}

/// Long-poll ingress loop. Each update is translated and dispatched on its
/// own task so one principal's provider round-trips never block another's
/// events; per-principal ordering is enforced inside the engine.
pub async fn run_long_poll_loop(
    config: BotTransportConfig,
    engine: Arc<ConversationEngine>,
) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(
            config
                .http_timeout_ms
                .saturating_add(LONG_POLL_TIMEOUT_S.saturating_mul(1_000)),
        ))
        .redirect(Policy::none())
        .build()
        .context("failed to build ingress http client")?;

    let mut next_offset: u64 = 0;
    loop {
        match fetch_updates(&config, &client, next_offset).await {
            Ok(updates) => {
                for update in updates {
                    let update_id = update["update_id"].as_u64().unwrap_or(0);
                    if update_id > 0 {
                        next_offset = next_offset.max(update_id.saturating_add(1));
                    }
                    if let Some(callback_id) = update["callback_query"]["id"].as_str() {
                        acknowledge_callback(&config, &client, callback_id).await;
                    }
                    let Some(event) = translate_update(&update) else {
                        continue;
                    };
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        engine.handle_event(event).await;
                    });
                }
            }
            Err(error) => {
                tracing::warn!("transport poll failed: {error:#}");
                tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
            }
        }
    }
}

async fn fetch_updates(
    config: &BotTransportConfig,
    client: &reqwest::Client,
    offset: u64,
) -> Result<Vec<Value>> {
    let response = client
        .get(config.method_url("getUpdates"))
        .query(&[
            ("timeout", LONG_POLL_TIMEOUT_S.to_string()),
            ("offset", offset.to_string()),
        ])
        .send()
        .await
        .context("failed to poll getUpdates")?;
    let status = response.status();
    if !status.is_success() {
        bail!("getUpdates returned status {}", status.as_u16());
    }
    let payload = response
        .json::<Value>()
        .await
        .context("failed to parse getUpdates response")?;
    payload
        .get("result")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| anyhow!("getUpdates response missing result[]"))
}

async fn acknowledge_callback(
    config: &BotTransportConfig,
    client: &reqwest::Client,
    callback_id: &str,
) {
    let result = client
        .post(config.method_url("answerCallbackQuery"))
        .json(&json!({"callback_query_id": callback_id}))
        .send()
        .await;
    if let Err(error) = result {
        tracing::debug!("failed to acknowledge callback {callback_id}: {error}");
    }
}

/// Maps one wire update onto the engine contract. Updates without an
/// actionable payload (joins, edits, media) are skipped.
pub(crate) fn translate_update(update: &Value) -> Option<InboundEvent> {
    if let Some(callback) = update.get("callback_query") {
        let principal_id = callback["from"]["id"].as_i64()?;
        let data = callback["data"].as_str()?;
        let mut event = InboundEvent::button(principal_id, data, current_unix_timestamp_ms());
        event.display_name = callback["from"]["first_name"].as_str().map(str::to_string);
        return Some(event);
    }

    let message = update.get("message")?;
    let principal_id = message["from"]["id"].as_i64()?;
    let text = message["text"].as_str()?;
    let timestamp_ms = message["date"].as_u64().unwrap_or(0).saturating_mul(1_000);

    let mut event = match text.strip_prefix('/') {
        Some(command) => InboundEvent::command(
            principal_id,
            command.split_whitespace().next().unwrap_or(""),
            timestamp_ms,
        ),
        None => InboundEvent::text(principal_id, text, timestamp_ms),
    };
    event.display_name = message["from"]["first_name"].as_str().map(str::to_string);
    event.forwarded_from = extract_forwarded_identity(message);
    Some(event)
}

// Forwarded messages arrive in either the legacy forward_from shape or the
// newer forward_origin.sender_user shape.
fn extract_forwarded_identity(message: &Value) -> Option<ForwardedIdentity> {
    let sender = message
        .get("forward_from")
        .filter(|value| !value.is_null())
        .or_else(|| message.pointer("/forward_origin/sender_user"))?;
    let principal_id = sender["id"].as_i64()?;
    Some(ForwardedIdentity {
        principal_id,
        display_name: sender["first_name"].as_str().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use super::{translate_update, BotApiSink, BotTransportConfig};
    use sigil_engine::{InboundEventKind, OutboundAction, OutboundMessage, OutboundSink};

    fn transport_config(api_base: &str) -> BotTransportConfig {
        BotTransportConfig {
            api_base: api_base.to_string(),
            bot_token: "test-token".to_string(),
            poll_interval_ms: 10,
            http_timeout_ms: 2_000,
        }
    }

    #[test]
    fn unit_translate_update_maps_commands_and_text() {
        let command = translate_update(&json!({
            "update_id": 1,
            "message": {
                "date": 1_700_000_000,
                "text": "/start extra",
                "from": {"id": 42, "first_name": "Operator"}
            }
        }))
        .expect("command event");
        assert_eq!(command.kind, InboundEventKind::Command);
        assert_eq!(command.text, "start");
        assert_eq!(command.principal_id, 42);
        assert_eq!(command.timestamp_ms, 1_700_000_000_000);

        let text = translate_update(&json!({
            "update_id": 2,
            "message": {
                "date": 1_700_000_001,
                "text": "+15551234567",
                "from": {"id": 42, "first_name": "Operator"}
            }
        }))
        .expect("text event");
        assert_eq!(text.kind, InboundEventKind::Text);
        assert_eq!(text.text, "+15551234567");
        assert_eq!(text.display_name.as_deref(), Some("Operator"));
    }

    #[test]
    fn unit_translate_update_maps_callback_presses() {
        let event = translate_update(&json!({
            "update_id": 3,
            "callback_query": {
                "id": "cb-1",
                "data": "generate_artifact",
                "from": {"id": 42, "first_name": "Operator"}
            }
        }))
        .expect("button event");
        assert_eq!(event.kind, InboundEventKind::ButtonPress);
        assert_eq!(event.text, "generate_artifact");
    }

    #[test]
    fn unit_translate_update_extracts_both_forward_shapes() {
        let legacy = translate_update(&json!({
            "update_id": 4,
            "message": {
                "date": 1_700_000_002,
                "text": "candidate",
                "from": {"id": 1, "first_name": "Root"},
                "forward_from": {"id": 555, "first_name": "New Operator"}
            }
        }))
        .expect("legacy forward");
        let forwarded = legacy.forwarded_from.expect("forward identity");
        assert_eq!(forwarded.principal_id, 555);
        assert_eq!(forwarded.display_name.as_deref(), Some("New Operator"));

        let modern = translate_update(&json!({
            "update_id": 5,
            "message": {
                "date": 1_700_000_003,
                "text": "candidate",
                "from": {"id": 1, "first_name": "Root"},
                "forward_origin": {"type": "user", "sender_user": {"id": 556}}
            }
        }))
        .expect("modern forward");
        assert_eq!(modern.forwarded_from.expect("forward identity").principal_id, 556);
    }

    #[test]
    fn unit_translate_update_skips_unactionable_payloads() {
        assert!(translate_update(&json!({"update_id": 6})).is_none());
        assert!(translate_update(&json!({
            "update_id": 7,
            "message": {"date": 1, "from": {"id": 42}}
        }))
        .is_none());
    }

    #[tokio::test]
    async fn integration_sink_posts_send_message_with_inline_keyboard() {
        let server = MockServer::start();
        let sent = server.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .json_body_partial(
                    r#"{"chat_id": 42, "reply_markup": {"inline_keyboard": [[{"callback_data": "main_menu", "text": "Cancel"}]]}}"#,
                );
            then.status(200)
                .json_body(json!({"ok": true, "result": {"message_id": 7}}));
        });

        let sink = BotApiSink::new(transport_config(&server.base_url())).expect("sink");
        sink.send(OutboundMessage {
            recipient: 42,
            text: "Send the phone number".to_string(),
            actions: vec![OutboundAction::new("Cancel", "main_menu")],
        })
        .await
        .expect("send should succeed");

        sent.assert_calls(1);
    }

    #[tokio::test]
    async fn regression_sink_surfaces_non_success_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/bottest-token/sendMessage");
            then.status(403).json_body(json!({"ok": false, "description": "bot blocked"}));
        });

        let sink = BotApiSink::new(transport_config(&server.base_url())).expect("sink");
        let error = sink
            .send(OutboundMessage {
                recipient: 42,
                text: "hello".to_string(),
                actions: Vec::new(),
            })
            .await
            .expect_err("send should fail");
        assert!(error.to_string().contains("403"));
    }
}

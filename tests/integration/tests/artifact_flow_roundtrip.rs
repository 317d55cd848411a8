//! End-to-end conversation flows wiring the engine, the SQLite stores,
//! and the HTTP provider session against a mocked provider gate.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use sigil_engine::{
    ConversationEngine, ConversationPhase, InboundEvent, OutboundMessage, OutboundSink,
    ACTION_GENERATE, ACTION_MAIN_MENU,
};
use sigil_provider::{HttpProviderConfig, HttpProviderConnector};
use sigil_store::{AdminDirectory, ArtifactLog};

const ROOT: i64 = 1_000;
const OPERATOR: i64 = 42;
const NOW_MS: u64 = 1_700_000_000_000;

#[derive(Default)]
struct RecordingSink {
    sent: AsyncMutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl OutboundSink for RecordingSink {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        self.sent.lock().await.push(message);
        Ok(())
    }
}

struct FlowFixture {
    engine: ConversationEngine,
    sink: Arc<RecordingSink>,
    artifacts: ArtifactLog,
    _tempdir: tempfile::TempDir,
}

fn fixture_against(server: &MockServer) -> FlowFixture {
    let tempdir = tempfile::tempdir().expect("tempdir");
    let db_path = tempdir.path().join("sigil.db");
    let admins = AdminDirectory::open(&db_path, ROOT).expect("open admins");
    assert!(admins.add_admin(OPERATOR, Some("Operator"), ROOT));
    let artifacts = ArtifactLog::open(&db_path).expect("open artifacts");
    let connector = HttpProviderConnector::new(HttpProviderConfig {
        api_base: server.base_url(),
        api_id: 12_345,
        api_hash: "test-hash".to_string(),
        http_timeout_ms: 2_000,
    })
    .expect("connector");
    let sink = Arc::new(RecordingSink::default());
    let engine = ConversationEngine::new(
        admins,
        artifacts.clone(),
        Arc::new(connector),
        sink.clone(),
    );
    FlowFixture {
        engine,
        sink,
        artifacts,
        _tempdir: tempdir,
    }
}

#[tokio::test]
async fn integration_full_flow_persists_and_relays_artifact() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/auth/send-code");
        then.status(200).json_body(json!({"flow_token": "ft-1"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/auth/sign-in");
        then.status(200).json_body(json!({"status": "authorized"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/auth/export-session");
        then.status(200).json_body(
            json!({"session_payload": "artifact-payload-1", "account_label": "Ada L"}),
        );
    });
    let abort = server.mock(|when, then| {
        when.method(POST).path("/auth/abort");
        then.status(200).json_body(json!({"status": "aborted"}));
    });

    let fixture = fixture_against(&server);
    fixture
        .engine
        .handle_event(InboundEvent::button(OPERATOR, ACTION_GENERATE, NOW_MS))
        .await;
    fixture
        .engine
        .handle_event(InboundEvent::text(OPERATOR, "+1 555 123-4567", NOW_MS))
        .await;
    assert_eq!(
        fixture.engine.conversation_phase(OPERATOR).await,
        ConversationPhase::AwaitingCode
    );

    fixture
        .engine
        .handle_event(InboundEvent::text(OPERATOR, "4 6 9 4 9", NOW_MS))
        .await;
    assert_eq!(
        fixture.engine.conversation_phase(OPERATOR).await,
        ConversationPhase::Idle
    );

    let records = fixture
        .artifacts
        .records_by_creator(OPERATOR)
        .expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].artifact_payload, "artifact-payload-1");
    assert_eq!(records[0].phone_number, "+15551234567");

    let sent = fixture.sink.sent.lock().await;
    assert!(sent.iter().any(|message| {
        message.recipient == OPERATOR && message.text.contains("artifact-payload-1")
    }));
    assert!(sent.iter().any(|message| {
        message.recipient == ROOT && message.text.contains("Session artifact backup")
    }));
    abort.assert_calls(1);
}

#[tokio::test]
async fn integration_two_factor_path_recovers_from_wrong_password() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/auth/send-code");
        then.status(200).json_body(json!({"flow_token": "ft-2"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/auth/sign-in");
        then.status(401).json_body(
            json!({"error": {"code": "SESSION_PASSWORD_NEEDED", "message": "2fa enabled"}}),
        );
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/auth/check-password")
            .json_body_partial(r#"{"password": "wrong password"}"#);
        then.status(400).json_body(
            json!({"error": {"code": "PASSWORD_HASH_INVALID", "message": "bad password"}}),
        );
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/auth/check-password")
            .json_body_partial(r#"{"password": "correct horse"}"#);
        then.status(200).json_body(json!({"status": "authorized"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/auth/export-session");
        then.status(200).json_body(
            json!({"session_payload": "artifact-payload-2", "account_label": "Ada L"}),
        );
    });
    server.mock(|when, then| {
        when.method(POST).path("/auth/abort");
        then.status(200).json_body(json!({"status": "aborted"}));
    });

    let fixture = fixture_against(&server);
    fixture
        .engine
        .handle_event(InboundEvent::button(OPERATOR, ACTION_GENERATE, NOW_MS))
        .await;
    fixture
        .engine
        .handle_event(InboundEvent::text(OPERATOR, "+15551234567", NOW_MS))
        .await;
    fixture
        .engine
        .handle_event(InboundEvent::text(OPERATOR, "46949", NOW_MS))
        .await;
    assert_eq!(
        fixture.engine.conversation_phase(OPERATOR).await,
        ConversationPhase::AwaitingTwoFactor
    );

    fixture
        .engine
        .handle_event(InboundEvent::text(OPERATOR, "wrong password", NOW_MS))
        .await;
    assert_eq!(
        fixture.engine.conversation_phase(OPERATOR).await,
        ConversationPhase::AwaitingTwoFactor
    );

    fixture
        .engine
        .handle_event(InboundEvent::text(OPERATOR, "correct horse", NOW_MS))
        .await;
    assert_eq!(
        fixture.engine.conversation_phase(OPERATOR).await,
        ConversationPhase::Idle
    );
    assert_eq!(
        fixture
            .artifacts
            .records_by_creator(OPERATOR)
            .expect("records")
            .len(),
        1
    );
}

#[tokio::test]
async fn integration_cancel_mid_flow_aborts_provider_session() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/auth/send-code");
        then.status(200).json_body(json!({"flow_token": "ft-3"}));
    });
    let abort = server.mock(|when, then| {
        when.method(POST).path("/auth/abort");
        then.status(200).json_body(json!({"status": "aborted"}));
    });

    let fixture = fixture_against(&server);
    fixture
        .engine
        .handle_event(InboundEvent::button(OPERATOR, ACTION_GENERATE, NOW_MS))
        .await;
    fixture
        .engine
        .handle_event(InboundEvent::text(OPERATOR, "+15551234567", NOW_MS))
        .await;
    fixture
        .engine
        .handle_event(InboundEvent::button(OPERATOR, ACTION_MAIN_MENU, NOW_MS))
        .await;

    assert_eq!(
        fixture.engine.conversation_phase(OPERATOR).await,
        ConversationPhase::Idle
    );
    abort.assert_calls(1);
}

#[tokio::test]
async fn integration_non_admin_flow_attempt_never_reaches_the_gate() {
    let server = MockServer::start();
    let send_code = server.mock(|when, then| {
        when.method(POST).path("/auth/send-code");
        then.status(200).json_body(json!({"flow_token": "ft-4"}));
    });

    let fixture = fixture_against(&server);
    let stranger = 777;
    fixture
        .engine
        .handle_event(InboundEvent::button(stranger, ACTION_GENERATE, NOW_MS))
        .await;
    fixture
        .engine
        .handle_event(InboundEvent::text(stranger, "+15551234567", NOW_MS))
        .await;

    assert!(fixture.sink.sent.lock().await.is_empty());
    send_code.assert_calls(0);
}

//! The conversation state machine.
//!
//! One engine instance serves every principal. Authorization is rechecked
//! against the admin directory on every inbound event; events from unknown
//! principals produce no observable output. Per-principal state lives in an
//! engine-owned map of async mutexes, so events for the same principal are
//! processed strictly one at a time while other principals proceed
//! concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use sigil_provider::{
    normalize_login_code, normalize_phone_number, CodeOutcome, ProviderAuthSession,
    ProviderConnector, ProviderError,
};
use sigil_store::{AdminDirectory, ArtifactLog};

use crate::engine_contract::{InboundEvent, InboundEventKind, OutboundMessage, OutboundSink};
use crate::engine_relay::BackupRelay;
use crate::engine_replies as replies;
use crate::engine_state::{ConversationPhase, ConversationState, ProviderFlow};

/// Per-principal conversation engine over the provider, the stores, and
/// the outbound sink.
pub struct ConversationEngine {
    admins: AdminDirectory,
    artifacts: ArtifactLog,
    connector: Arc<dyn ProviderConnector>,
    sink: Arc<dyn OutboundSink>,
    relay: BackupRelay,
    states: Mutex<HashMap<i64, Arc<Mutex<ConversationState>>>>,
    accepting: AtomicBool,
}

impl ConversationEngine {
    pub fn new(
        admins: AdminDirectory,
        artifacts: ArtifactLog,
        connector: Arc<dyn ProviderConnector>,
        sink: Arc<dyn OutboundSink>,
    ) -> Self {
        let relay = BackupRelay::new(sink.clone(), admins.root_principal());
        Self {
            admins,
            artifacts,
            connector,
            sink,
            relay,
            states: Mutex::new(HashMap::new()),
            accepting: AtomicBool::new(true),
        }
    }

    /// Handles one inbound event end to end, including every provider
    /// round-trip it triggers. Callers may invoke this concurrently for
    /// different principals; events for one principal serialize on that
    /// principal's state lock.
    pub async fn handle_event(&self, event: InboundEvent) {
        if !self.accepting.load(Ordering::SeqCst) {
            tracing::debug!(
                "dropping inbound event from principal {} during shutdown",
                event.principal_id
            );
            return;
        }
        if !self.admins.is_admin(event.principal_id) {
            tracing::info!(
                "ignoring inbound event from non-admin principal {}",
                event.principal_id
            );
            return;
        }

        let cell = self.state_cell(event.principal_id).await;
        let mut state = cell.lock().await;
        match event.kind {
            InboundEventKind::Command => self.handle_command(&mut state, &event).await,
            InboundEventKind::ButtonPress => self.handle_button(&mut state, &event).await,
            InboundEventKind::Text => self.handle_text(&mut state, &event).await,
        }
    }

    /// Current phase for one principal; `Idle` when the principal has no
    /// conversation state yet.
    pub async fn conversation_phase(&self, principal_id: i64) -> ConversationPhase {
        let states = self.states.lock().await;
        match states.get(&principal_id) {
            Some(cell) => cell.lock().await.phase(),
            None => ConversationPhase::Idle,
        }
    }

    /// Supervised shutdown: stop accepting inbound events, then drain the
    /// state map and close every open provider handle.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let cells = {
            let mut states = self.states.lock().await;
            states.drain().collect::<Vec<_>>()
        };
        for (principal_id, cell) in cells {
            let mut state = cell.lock().await;
            if state.has_open_session() {
                tracing::info!("closing open provider session for principal {principal_id}");
            }
            Self::abort_flow(&mut state).await;
        }
    }

    async fn state_cell(&self, principal_id: i64) -> Arc<Mutex<ConversationState>> {
        let mut states = self.states.lock().await;
        states
            .entry(principal_id)
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::Idle)))
            .clone()
    }

    async fn handle_command(&self, _state: &mut ConversationState, event: &InboundEvent) {
        if event.text.trim() == replies::COMMAND_START {
            let is_root = event.principal_id == self.admins.root_principal();
            self.send_reply(replies::main_menu(event.principal_id, is_root))
                .await;
        } else {
            tracing::debug!(
                "ignoring unknown command '{}' from principal {}",
                event.text,
                event.principal_id
            );
        }
    }

    async fn handle_button(&self, state: &mut ConversationState, event: &InboundEvent) {
        let principal_id = event.principal_id;
        let is_root = principal_id == self.admins.root_principal();
        match event.text.as_str() {
            replies::ACTION_MAIN_MENU => {
                Self::abort_flow(state).await;
                self.send_reply(replies::main_menu(principal_id, is_root))
                    .await;
            }
            replies::ACTION_GENERATE => {
                Self::abort_flow(state).await;
                *state = ConversationState::AwaitingPhone;
                self.send_reply(replies::phone_prompt(principal_id)).await;
            }
            replies::ACTION_LIST => {
                let listings = self.artifacts.list_by_creator(principal_id);
                self.send_reply(replies::artifact_listing(principal_id, &listings))
                    .await;
            }
            replies::ACTION_ADD_ADMIN if is_root => {
                Self::abort_flow(state).await;
                *state = ConversationState::AwaitingAdminId;
                self.send_reply(replies::admin_id_prompt(principal_id)).await;
            }
            replies::ACTION_REMOVE_ADMIN if is_root => {
                let removable = self.admins.removable_admins();
                self.send_reply(replies::removal_menu(principal_id, &removable))
                    .await;
            }
            other => {
                if let Some(raw_id) = other.strip_prefix(replies::ACTION_REMOVE_ADMIN_PREFIX) {
                    if is_root {
                        self.handle_admin_removal(principal_id, raw_id).await;
                        return;
                    }
                }
                tracing::debug!("ignoring button '{other}' from principal {principal_id}");
            }
        }
    }

    async fn handle_admin_removal(&self, principal_id: i64, raw_id: &str) {
        let Ok(target) = raw_id.parse::<i64>() else {
            self.send_reply(replies::admin_remove_failed(principal_id))
                .await;
            return;
        };
        if self.admins.remove_admin(target) {
            tracing::info!("admin {target} removed by principal {principal_id}");
            self.send_reply(replies::admin_removed(principal_id, target))
                .await;
        } else {
            self.send_reply(replies::admin_remove_failed(principal_id))
                .await;
        }
    }

    async fn handle_text(&self, state: &mut ConversationState, event: &InboundEvent) {
        match std::mem::replace(state, ConversationState::Idle) {
            ConversationState::Idle => {
                tracing::debug!(
                    "ignoring stray text from principal {} outside any flow",
                    event.principal_id
                );
            }
            ConversationState::AwaitingPhone => self.process_phone_input(state, event).await,
            ConversationState::AwaitingCode(flow) => {
                self.process_code_input(state, flow, event).await;
            }
            ConversationState::AwaitingTwoFactor(flow) => {
                self.process_password_input(state, flow, event).await;
            }
            ConversationState::AwaitingAdminId => self.process_admin_id_input(event).await,
        }
    }

    async fn process_phone_input(&self, state: &mut ConversationState, event: &InboundEvent) {
        let principal_id = event.principal_id;
        let Some(phone_number) = normalize_phone_number(&event.text) else {
            *state = ConversationState::AwaitingPhone;
            self.send_reply(replies::invalid_phone(principal_id)).await;
            return;
        };

        self.send_reply(replies::connecting(principal_id)).await;
        let mut session = match self.connector.connect().await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!("provider connect failed for principal {principal_id}: {error}");
                self.send_reply(replies::code_request_failed(principal_id))
                    .await;
                return;
            }
        };

        match session.request_code(&phone_number).await {
            Ok(()) => {
                *state = ConversationState::AwaitingCode(ProviderFlow {
                    session,
                    phone_number,
                });
                self.send_reply(replies::code_prompt(principal_id)).await;
            }
            Err(error) => {
                session.close().await;
                tracing::warn!(
                    "code request failed for principal {principal_id} ({phone_number}): {error}"
                );
                self.send_reply(replies::code_request_failed(principal_id))
                    .await;
            }
        }
    }

    async fn process_code_input(
        &self,
        state: &mut ConversationState,
        mut flow: ProviderFlow,
        event: &InboundEvent,
    ) {
        let principal_id = event.principal_id;
        let Some(code) = normalize_login_code(&event.text) else {
            *state = ConversationState::AwaitingCode(flow);
            self.send_reply(replies::invalid_code(principal_id)).await;
            return;
        };

        self.send_reply(replies::authenticating(principal_id)).await;
        match flow.session.submit_code(&code).await {
            Ok(CodeOutcome::Authorized) => self.finalize_flow(flow, event).await,
            Ok(CodeOutcome::PasswordRequired) => {
                *state = ConversationState::AwaitingTwoFactor(flow);
                self.send_reply(replies::two_factor_prompt(principal_id))
                    .await;
            }
            Err(ProviderError::InvalidCode) => {
                *state = ConversationState::AwaitingCode(flow);
                self.send_reply(replies::code_rejected(principal_id)).await;
            }
            Err(error) => {
                flow.session.close().await;
                tracing::warn!("code confirmation failed for principal {principal_id}: {error}");
                self.send_reply(replies::provider_failure(principal_id))
                    .await;
            }
        }
    }

    async fn process_password_input(
        &self,
        state: &mut ConversationState,
        mut flow: ProviderFlow,
        event: &InboundEvent,
    ) {
        let principal_id = event.principal_id;
        self.send_reply(replies::authenticating(principal_id)).await;
        match flow.session.submit_password(&event.text).await {
            Ok(()) => self.finalize_flow(flow, event).await,
            Err(ProviderError::InvalidPassword) => {
                *state = ConversationState::AwaitingTwoFactor(flow);
                self.send_reply(replies::password_rejected(principal_id))
                    .await;
            }
            Err(error) => {
                flow.session.close().await;
                tracing::warn!(
                    "password confirmation failed for principal {principal_id}: {error}"
                );
                self.send_reply(replies::provider_failure(principal_id))
                    .await;
            }
        }
    }

    async fn finalize_flow(&self, mut flow: ProviderFlow, event: &InboundEvent) {
        let principal_id = event.principal_id;
        match flow.session.finalize().await {
            Ok(artifact) => {
                flow.session.close().await;
                let phone_number = if artifact.phone_number.is_empty() {
                    flow.phone_number.as_str()
                } else {
                    artifact.phone_number.as_str()
                };
                let saved = self.artifacts.save(
                    &artifact.payload,
                    phone_number,
                    artifact.account_label.as_deref(),
                    principal_id,
                );
                if !saved {
                    tracing::warn!(
                        "artifact for {phone_number} generated by {principal_id} was not persisted"
                    );
                }
                self.send_reply(replies::artifact_ready(
                    principal_id,
                    &artifact,
                    phone_number,
                    saved,
                ))
                .await;
                self.relay
                    .relay(
                        &artifact,
                        phone_number,
                        principal_id,
                        event.display_name.as_deref(),
                    )
                    .await;
                tracing::info!("artifact generated for {phone_number} by principal {principal_id}");
            }
            Err(error) => {
                flow.session.close().await;
                tracing::warn!("artifact finalize failed for principal {principal_id}: {error}");
                self.send_reply(replies::provider_failure(principal_id))
                    .await;
            }
        }
    }

    async fn process_admin_id_input(&self, event: &InboundEvent) {
        let principal_id = event.principal_id;
        let (candidate_id, display_name) = match &event.forwarded_from {
            Some(forward) => (forward.principal_id, forward.display_name.clone()),
            None => match event.text.trim().parse::<i64>() {
                Ok(id) => (id, None),
                Err(_) => {
                    self.send_reply(replies::admin_invalid_id(principal_id))
                        .await;
                    return;
                }
            },
        };

        if self.admins.is_admin(candidate_id) {
            self.send_reply(replies::admin_already_present(principal_id))
                .await;
            return;
        }

        if self
            .admins
            .add_admin(candidate_id, display_name.as_deref(), principal_id)
        {
            tracing::info!("admin {candidate_id} added by principal {principal_id}");
            self.send_reply(replies::admin_added(
                principal_id,
                candidate_id,
                display_name.as_deref(),
            ))
            .await;
        } else {
            self.send_reply(replies::admin_add_failed(principal_id))
                .await;
        }
    }

    async fn abort_flow(state: &mut ConversationState) {
        match std::mem::replace(state, ConversationState::Idle) {
            ConversationState::AwaitingCode(mut flow)
            | ConversationState::AwaitingTwoFactor(mut flow) => {
                flow.session.close().await;
            }
            _ => {}
        }
    }

    async fn send_reply(&self, message: OutboundMessage) {
        if let Err(error) = self.sink.send(message).await {
            tracing::warn!("failed to deliver outbound reply: {error:#}");
        }
    }
}

//! Per-principal conversation engine for minting session artifacts.
//!
//! The engine consumes inbound transport events, rechecks authorization on
//! every one of them, and drives the provider through phone → code →
//! optional two-factor password, persisting the minted artifact and
//! relaying a backup copy to the fixed privileged recipient. Conversation
//! state is an explicit tagged enum per principal, serialized per key, so
//! no two events for the same principal ever observe it concurrently.

pub mod engine;
pub mod engine_contract;
pub mod engine_relay;
pub mod engine_replies;
pub mod engine_state;

pub use engine::ConversationEngine;
pub use engine_contract::{
    ForwardedIdentity, InboundEvent, InboundEventKind, OutboundAction, OutboundMessage,
    OutboundSink,
};
pub use engine_relay::BackupRelay;
pub use engine_replies::{
    ACTION_ADD_ADMIN, ACTION_GENERATE, ACTION_LIST, ACTION_MAIN_MENU, ACTION_REMOVE_ADMIN,
    ACTION_REMOVE_ADMIN_PREFIX, COMMAND_START,
};
pub use engine_state::ConversationPhase;

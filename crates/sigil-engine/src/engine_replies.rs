//! Reply text and action buttons for every engine response.
//!
//! Pure builders: no I/O, no state. Button callback data values double as
//! the inbound `ButtonPress` payloads the engine dispatches on.

use sigil_core::format_unix_timestamp;
use sigil_provider::ProviderArtifact;
use sigil_store::{AdminRecord, ArtifactListing};

use crate::engine_contract::{OutboundAction, OutboundMessage};

pub const COMMAND_START: &str = "start";

pub const ACTION_GENERATE: &str = "generate_artifact";
pub const ACTION_LIST: &str = "list_artifacts";
pub const ACTION_ADD_ADMIN: &str = "add_admin";
pub const ACTION_REMOVE_ADMIN: &str = "remove_admin";
pub const ACTION_REMOVE_ADMIN_PREFIX: &str = "remove_admin:";
pub const ACTION_MAIN_MENU: &str = "main_menu";

fn cancel_actions() -> Vec<OutboundAction> {
    vec![OutboundAction::new("Cancel", ACTION_MAIN_MENU)]
}

fn back_actions() -> Vec<OutboundAction> {
    vec![OutboundAction::new("Back to main", ACTION_MAIN_MENU)]
}

pub(crate) fn main_menu(recipient: i64, is_root: bool) -> OutboundMessage {
    let panel = if is_root {
        "Root admin panel."
    } else {
        "Admin panel."
    };
    let mut actions = vec![
        OutboundAction::new("Generate artifact", ACTION_GENERATE),
        OutboundAction::new("List my artifacts", ACTION_LIST),
    ];
    if is_root {
        actions.push(OutboundAction::new("Add admin", ACTION_ADD_ADMIN));
        actions.push(OutboundAction::new("Remove admin", ACTION_REMOVE_ADMIN));
    }
    OutboundMessage {
        recipient,
        text: format!("Session artifact generator\n\n{panel}\nChoose an option:"),
        actions,
    }
}

pub(crate) fn phone_prompt(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Artifact generation\n\nSend the account phone number with country code.\nExample: +1234567890".to_string(),
        actions: cancel_actions(),
    }
}

pub(crate) fn invalid_phone(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Invalid phone number format.\nUse the country-code form, for example: +1234567890"
            .to_string(),
        actions: cancel_actions(),
    }
}

pub(crate) fn connecting(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Connecting to the provider...".to_string(),
        actions: Vec::new(),
    }
}

pub(crate) fn code_prompt(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Verification code sent.\n\nEnter the code with spaces between digits.\nExample: if the code is 46949, send: 4 6 9 4 9".to_string(),
        actions: cancel_actions(),
    }
}

pub(crate) fn invalid_code(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Invalid code format.\nEnter digits only, spaces allowed.\nExample: 4 6 9 4 9"
            .to_string(),
        actions: cancel_actions(),
    }
}

pub(crate) fn code_rejected(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "The provider rejected that verification code.\nEnter the correct code.\nExample: 4 6 9 4 9".to_string(),
        actions: cancel_actions(),
    }
}

pub(crate) fn authenticating(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Authenticating...".to_string(),
        actions: Vec::new(),
    }
}

pub(crate) fn two_factor_prompt(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Two-factor password required.\n\nEnter the account's two-factor password:"
            .to_string(),
        actions: cancel_actions(),
    }
}

pub(crate) fn password_rejected(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "The provider rejected that two-factor password.\nEnter the correct password:"
            .to_string(),
        actions: cancel_actions(),
    }
}

pub(crate) fn code_request_failed(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Could not request a verification code for that number.\nStart again from the main menu.".to_string(),
        actions: back_actions(),
    }
}

pub(crate) fn provider_failure(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Authentication failed.\nStart again from the main menu.".to_string(),
        actions: back_actions(),
    }
}

pub(crate) fn artifact_ready(
    recipient: i64,
    artifact: &ProviderArtifact,
    phone_number: &str,
    saved: bool,
) -> OutboundMessage {
    let account = artifact.account_label.as_deref().unwrap_or("Unknown");
    let mut text = format!(
        "Session artifact generated.\n\nAccount: {account}\nPhone: {phone_number}\n\nArtifact:\n{}\n\nCopy the artifact now.",
        artifact.payload
    );
    if !saved {
        text.push_str("\n\nWarning: the artifact could not be saved to storage.");
    }
    OutboundMessage {
        recipient,
        text,
        actions: back_actions(),
    }
}

pub(crate) fn artifact_listing(recipient: i64, listings: &[ArtifactListing]) -> OutboundMessage {
    if listings.is_empty() {
        return OutboundMessage {
            recipient,
            text: "Your artifacts\n\nNo artifacts generated yet.".to_string(),
            actions: back_actions(),
        };
    }
    let mut text = "Your generated artifacts:\n\n".to_string();
    for (index, listing) in listings.iter().enumerate() {
        let label = listing.account_label.as_deref().unwrap_or("Unnamed");
        text.push_str(&format!(
            "{}. {label} ({})\n   {}\n",
            index + 1,
            listing.phone_number,
            format_unix_timestamp(listing.created_at)
        ));
    }
    OutboundMessage {
        recipient,
        text,
        actions: back_actions(),
    }
}

pub(crate) fn admin_id_prompt(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Add admin\n\nForward a message from the principal you want to add, or send their numeric id.\nExample: 123456789".to_string(),
        actions: cancel_actions(),
    }
}

pub(crate) fn admin_invalid_id(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Invalid principal id.\nSend a numeric id or forward a message from the principal."
            .to_string(),
        actions: back_actions(),
    }
}

pub(crate) fn admin_already_present(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "That principal is already an admin.".to_string(),
        actions: back_actions(),
    }
}

pub(crate) fn admin_added(
    recipient: i64,
    principal_id: i64,
    display_name: Option<&str>,
) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: format!(
            "Admin added.\nPrincipal id: {principal_id}\nName: {}",
            display_name.unwrap_or("Unknown")
        ),
        actions: back_actions(),
    }
}

pub(crate) fn admin_add_failed(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Failed to add admin.".to_string(),
        actions: back_actions(),
    }
}

pub(crate) fn removal_menu(recipient: i64, removable: &[AdminRecord]) -> OutboundMessage {
    if removable.is_empty() {
        return OutboundMessage {
            recipient,
            text: "Remove admin\n\nNo removable admins found.".to_string(),
            actions: back_actions(),
        };
    }
    let mut actions = removable
        .iter()
        .map(|record| {
            let label = record
                .display_name
                .clone()
                .unwrap_or_else(|| format!("id {}", record.principal_id));
            OutboundAction::new(
                &format!("Remove {label}"),
                &format!("{ACTION_REMOVE_ADMIN_PREFIX}{}", record.principal_id),
            )
        })
        .collect::<Vec<_>>();
    actions.push(OutboundAction::new("Back to main", ACTION_MAIN_MENU));
    OutboundMessage {
        recipient,
        text: "Select the admin to remove:".to_string(),
        actions,
    }
}

pub(crate) fn admin_removed(recipient: i64, principal_id: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: format!("Admin removed.\nPrincipal id: {principal_id}"),
        actions: back_actions(),
    }
}

pub(crate) fn admin_remove_failed(recipient: i64) -> OutboundMessage {
    OutboundMessage {
        recipient,
        text: "Failed to remove admin.".to_string(),
        actions: back_actions(),
    }
}
